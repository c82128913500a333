use crate::{AsValue, Column, ColumnRef, SqlType, TypeHandler, Value};
use rust_decimal::Decimal;
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};
use time::{Date, PrimitiveDateTime, Time};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    Like,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl CompareOp {
    pub fn sign(&self) -> &'static str {
        match self {
            CompareOp::Equal => "=",
            CompareOp::Like => "LIKE",
            CompareOp::Greater => ">",
            CompareOp::GreaterEqual => ">=",
            CompareOp::Less => "<",
            CompareOp::LessEqual => "<=",
        }
    }
}

/// Left side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(ColumnRef),
    Raw(String),
}

impl<T> From<&Column<T>> for Operand {
    fn from(value: &Column<T>) -> Self {
        Operand::Column(value.column_ref())
    }
}

impl From<&ColumnRef> for Operand {
    fn from(value: &ColumnRef) -> Self {
        Operand::Column(value.clone())
    }
}

impl From<ColumnRef> for Operand {
    fn from(value: ColumnRef) -> Self {
        Operand::Column(value)
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Raw(value.into())
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Operand::Raw(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextTransform {
    Upper,
    Lower,
}

impl TextTransform {
    pub fn function(&self) -> &'static str {
        match self {
            TextTransform::Upper => "UPPER",
            TextTransform::Lower => "LOWER",
        }
    }
}

/// Right side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Rhs {
    /// Bound as a parameter.
    Value(Value),
    /// Rendered as the qualified column name, binds nothing.
    Column(ColumnRef),
    /// SQL text function applied to the inner operand, the value is bound untransformed.
    Transform(TextTransform, Box<Rhs>),
}

impl Rhs {
    /// Value to bind, if the operand binds one.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Rhs::Value(v) => Some(v),
            Rhs::Column(..) => None,
            Rhs::Transform(_, inner) => inner.value(),
        }
    }
}

/// Wrap the operand in `UPPER(..)`.
pub fn upper(value: impl Into<Rhs>) -> Rhs {
    Rhs::Transform(TextTransform::Upper, Box::new(value.into()))
}

/// Wrap the operand in `LOWER(..)`.
pub fn lower(value: impl Into<Rhs>) -> Rhs {
    Rhs::Transform(TextTransform::Lower, Box::new(value.into()))
}

macro_rules! impl_rhs_from_value {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for Rhs {
                fn from(value: $source) -> Self {
                    Rhs::Value(value.into())
                }
            }
        )+
    };
}
impl_rhs_from_value!(
    bool,
    i32,
    i64,
    f32,
    f64,
    Decimal,
    String,
    &str,
    Box<[u8]>,
    Vec<u8>,
    Date,
    Time,
    PrimitiveDateTime,
    Uuid,
    Value,
);

impl<T: AsValue> From<Option<T>> for Rhs {
    fn from(value: Option<T>) -> Self {
        Rhs::Value(value.as_value())
    }
}

impl<T> From<&Column<T>> for Rhs {
    fn from(value: &Column<T>) -> Self {
        Rhs::Column(value.column_ref())
    }
}

impl From<&ColumnRef> for Rhs {
    fn from(value: &ColumnRef) -> Self {
        Rhs::Column(value.clone())
    }
}

impl From<ColumnRef> for Rhs {
    fn from(value: ColumnRef) -> Self {
        Rhs::Column(value)
    }
}

/// `lhs op rhs` predicate, also used for the `column = value` pairs of INSERT and SET.
#[derive(Clone)]
pub struct Comparison {
    pub lhs: Operand,
    pub op: CompareOp,
    pub rhs: Rhs,
    pub sql_type: Option<SqlType>,
    pub handler: Option<Arc<dyn TypeHandler>>,
}

impl Comparison {
    pub fn new(lhs: impl Into<Operand>, op: CompareOp, rhs: impl Into<Rhs>) -> Self {
        Self {
            lhs: lhs.into(),
            op,
            rhs: rhs.into(),
            sql_type: None,
            handler: None,
        }
    }

    /// Bind the value with an explicit SQL type.
    pub fn sql_type(&mut self, sql_type: SqlType) -> &mut Self {
        self.sql_type = Some(sql_type);
        self
    }

    /// Bind the value through `handler`.
    pub fn handler(&mut self, handler: impl TypeHandler + 'static) -> &mut Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn shared_handler(&mut self, handler: Arc<dyn TypeHandler>) -> &mut Self {
        self.handler = Some(handler);
        self
    }
}

impl Debug for Comparison {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Comparison")
            .field("lhs", &self.lhs)
            .field("op", &self.op)
            .field("rhs", &self.rhs)
            .field("sql_type", &self.sql_type)
            .field("handler", &self.handler.is_some())
            .finish()
    }
}
