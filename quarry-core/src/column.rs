use crate::{AsValue, Result, Table, Tables};
use std::{
    fmt::{self, Debug, Display, Formatter},
    marker::PhantomData,
    ops::Deref,
    sync::Arc,
};

/// Untyped reference to a column of a table.
#[derive(Clone, PartialEq)]
pub struct ColumnRef {
    table: Table,
    name: Arc<str>,
}

impl ColumnRef {
    pub fn new(table: Table, name: impl Into<Arc<str>>) -> Self {
        Self {
            table,
            name: name.into(),
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name qualified with the explicit alias of the table, the name used outside of
    /// a query. Inside a query the aliases come from [`crate::Tables::qualified`].
    pub fn full_name(&self) -> String {
        match self.table.alias() {
            Some(alias) => format!("{}.{}", alias, self.name),
            None => self.name.to_string(),
        }
    }
}

impl Display for ColumnRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

impl Debug for ColumnRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table.name(), self.name)
    }
}

/// Typed column handle, it reads `T` from the row of the executing query.
pub struct Column<T> {
    column: ColumnRef,
    _type: PhantomData<fn() -> T>,
}

impl<T> Column<T> {
    pub fn new(column: ColumnRef) -> Self {
        Self {
            column,
            _type: PhantomData,
        }
    }

    pub fn column_ref(&self) -> ColumnRef {
        self.column.clone()
    }
}

impl<T: AsValue> Column<T> {
    /// Value of the column in the row the executing query is reading on this thread.
    ///
    /// Available inside the row mapper of a query, an error anywhere else.
    pub fn get(&self) -> Result<T> {
        Tables::read_exposed(&self.column, |row, label| row.get::<T>(label))
    }
}

impl<T: AsValue> Column<Option<T>> {
    pub fn is_null(&self) -> Result<bool> {
        Ok(self.get()?.is_none())
    }
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        Self::new(self.column.clone())
    }
}

impl<T> Deref for Column<T> {
    type Target = ColumnRef;
    fn deref(&self) -> &Self::Target {
        &self.column
    }
}

impl<T> Display for Column<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.column, f)
    }
}

impl<T> Debug for Column<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.column, f)
    }
}

/// Anything that can be listed in a `SELECT`.
pub trait IntoColumns {
    fn into_columns(self) -> Vec<ColumnRef>;
}

impl IntoColumns for &Table {
    fn into_columns(self) -> Vec<ColumnRef> {
        self.columns()
    }
}

impl<T> IntoColumns for &Column<T> {
    fn into_columns(self) -> Vec<ColumnRef> {
        vec![self.column_ref()]
    }
}

impl IntoColumns for &ColumnRef {
    fn into_columns(self) -> Vec<ColumnRef> {
        vec![self.clone()]
    }
}

impl IntoColumns for ColumnRef {
    fn into_columns(self) -> Vec<ColumnRef> {
        vec![self]
    }
}

impl IntoColumns for Vec<ColumnRef> {
    fn into_columns(self) -> Vec<ColumnRef> {
        self
    }
}

impl<const N: usize> IntoColumns for [ColumnRef; N] {
    fn into_columns(self) -> Vec<ColumnRef> {
        self.into()
    }
}

macro_rules! impl_into_columns_tuple {
    ($($name:ident),+) => {
        impl<$($name: IntoColumns),+> IntoColumns for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_columns(self) -> Vec<ColumnRef> {
                let ($($name,)+) = self;
                let mut result = Vec::new();
                $(result.extend($name.into_columns());)+
                result
            }
        }
    };
}
impl_into_columns_tuple!(A);
impl_into_columns_tuple!(A, B);
impl_into_columns_tuple!(A, B, C);
impl_into_columns_tuple!(A, B, C, D);
impl_into_columns_tuple!(A, B, C, D, E);
impl_into_columns_tuple!(A, B, C, D, E, F);
impl_into_columns_tuple!(A, B, C, D, E, F, G);
impl_into_columns_tuple!(A, B, C, D, E, F, G, H);
