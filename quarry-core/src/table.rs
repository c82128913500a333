use crate::{Column, ColumnRef, Error, Result, RowLabeled};
use std::{
    cell::RefCell,
    fmt::{self, Debug, Display, Formatter},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

struct TableState {
    name: String,
    alias: Option<String>,
    columns: RwLock<Vec<String>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A database table taking part in queries.
///
/// Columns are declared with [`Table::column`]. The table itself only knows its name,
/// the declared columns and an optional explicit alias: the aliases given because of
/// joins and the row being read belong to the query, see [`Tables`]. Clones are the same
/// table, use two distinct `Table` values to reference the same database table twice
/// in one query.
///
/// ```rust
/// use quarry_core::Table;
/// let customer = Table::new("customer");
/// let id = customer.column::<i32>("id");
/// assert_eq!(id.full_name(), "id");
/// ```
#[derive(Clone)]
pub struct Table(Arc<TableState>);

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::new(TableState {
            name: name.into(),
            alias: None,
            columns: Default::default(),
        }))
    }

    /// Same table with an explicit alias, aliases given by the queries never override it.
    ///
    /// The result is a distinct table, declare the columns on it.
    pub fn with_alias(self, alias: impl Into<String>) -> Self {
        Self(Arc::new(TableState {
            name: self.0.name.clone(),
            alias: Some(alias.into()),
            columns: RwLock::new(read(&self.0.columns).clone()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Explicit alias.
    pub fn alias(&self) -> Option<&str> {
        self.0.alias.as_deref()
    }

    /// Declare a column of this table.
    pub fn column<T>(&self, name: impl Into<String>) -> Column<T> {
        let name = name.into();
        write(&self.0.columns).push(name.clone());
        Column::new(ColumnRef::new(self.clone(), name))
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> Vec<ColumnRef> {
        read(&self.0.columns)
            .iter()
            .map(|name| ColumnRef::new(self.clone(), name.clone()))
            .collect()
    }

    /// Whether the two values are the same table instance.
    pub fn same(&self, other: &Table) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&with_alias(self.name(), self.alias()))
    }
}

impl Debug for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name())
            .field("alias", &self.alias())
            .finish()
    }
}

fn with_alias(name: &str, alias: Option<&str>) -> String {
    match alias {
        Some(alias) if !alias.is_empty() && alias != name => format!("{} {}", name, alias),
        _ => name.to_string(),
    }
}

#[derive(Clone, Debug)]
struct Registered {
    table: Table,
    alias: Option<String>,
}

/// Tables participating in a query, in registration order, with the aliases the query
/// gave them and the row it is currently reading.
#[derive(Default, Clone, Debug)]
pub struct Tables {
    tables: Vec<Registered>,
    row: Option<Arc<RowLabeled>>,
}

thread_local! {
    static EXPOSED: RefCell<Vec<Tables>> = const { RefCell::new(Vec::new()) };
}

struct Exposed;

impl Drop for Exposed {
    fn drop(&mut self) {
        EXPOSED.with_borrow_mut(|stack| stack.pop());
    }
}

impl Tables {
    pub fn new() -> Self {
        Default::default()
    }

    /// Add a table to the query, assigning aliases once more than one table takes part.
    ///
    /// The second table makes the first one aliased too. An alias is the table name
    /// unless another table already uses it, then it is the name followed by the
    /// 1-based position of the table. Explicit aliases are kept.
    pub fn register(&mut self, table: &Table) {
        if self.contains(table) {
            return;
        }
        self.tables.push(Registered {
            table: table.clone(),
            alias: table.alias().map(ToString::to_string),
        });
        if self.tables.len() > 1 {
            self.configure_alias(self.tables.len() - 1);
        }
        if self.tables.len() == 2 {
            self.configure_alias(0);
        }
    }

    fn configure_alias(&mut self, index: usize) {
        if self.tables[index].alias.is_some() {
            return;
        }
        let name = self.tables[index].table.name().to_string();
        let taken = self
            .tables
            .iter()
            .any(|v| v.alias.as_deref() == Some(name.as_str()));
        let alias = if taken {
            format!("{}{}", name, index + 1)
        } else {
            name
        };
        self.tables[index].alias = Some(alias);
    }

    pub fn contains(&self, table: &Table) -> bool {
        self.tables.iter().any(|v| v.table.same(table))
    }

    /// Alias of `table` in this query, its explicit alias when it is not registered.
    pub fn alias<'a>(&'a self, table: &'a Table) -> Option<&'a str> {
        match self.tables.iter().find(|v| v.table.same(table)) {
            Some(registered) => registered.alias.as_deref(),
            None => table.alias(),
        }
    }

    /// Table as written in `FROM` and `JOIN`.
    pub fn display(&self, table: &Table) -> String {
        with_alias(table.name(), self.alias(table))
    }

    /// Column name qualified with the alias of its table, when it has one.
    pub fn qualified(&self, column: &ColumnRef) -> String {
        match self.alias(column.table()) {
            Some(alias) => format!("{}.{}", alias, column.name()),
            None => column.name().to_string(),
        }
    }

    /// Label of the column in the result set.
    pub fn label(&self, column: &ColumnRef) -> String {
        self.qualified(column).replace('.', "_")
    }

    /// How the column appears in a select list.
    pub fn selection(&self, column: &ColumnRef) -> String {
        if self.alias(column.table()).is_some() {
            format!("{} {}", self.qualified(column), self.label(column))
        } else {
            self.label(column)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().map(|v| &v.table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn row(&self) -> Option<&Arc<RowLabeled>> {
        self.row.as_ref()
    }

    pub fn set_row(&mut self, row: Option<Arc<RowLabeled>>) {
        self.row = row;
    }

    /// Run `f` with these tables (and their row) visible to [`Column::get`] on this thread.
    pub fn expose<R>(&self, f: impl FnOnce() -> R) -> R {
        EXPOSED.with_borrow_mut(|stack| stack.push(self.clone()));
        let _exposed = Exposed;
        f()
    }

    /// Read `column` from the row of the innermost exposed tables.
    pub(crate) fn read_exposed<T>(
        column: &ColumnRef,
        read: impl FnOnce(&RowLabeled, &str) -> Result<T>,
    ) -> Result<T> {
        EXPOSED.with_borrow(|stack| {
            let Some((tables, row)) = stack
                .last()
                .and_then(|tables| tables.row.as_ref().map(|row| (tables, row)))
            else {
                return Err(Error::msg(format!(
                    "Row was not configured when the value of column `{}` was requested",
                    column.full_name()
                )));
            };
            read(row, &tables.label(column))
        })
    }
}

/// One or more tables listed in a `FROM`.
pub trait IntoTables {
    fn into_tables(self) -> Vec<Table>;
}

impl IntoTables for &Table {
    fn into_tables(self) -> Vec<Table> {
        vec![self.clone()]
    }
}

impl<const N: usize> IntoTables for [&Table; N] {
    fn into_tables(self) -> Vec<Table> {
        self.into_iter().cloned().collect()
    }
}

impl IntoTables for &[&Table] {
    fn into_tables(self) -> Vec<Table> {
        self.iter().map(|v| (*v).clone()).collect()
    }
}

impl IntoTables for Vec<Table> {
    fn into_tables(self) -> Vec<Table> {
        self
    }
}
