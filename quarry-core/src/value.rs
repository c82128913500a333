use rust_decimal::Decimal;
use std::{
    any::{self, Any, TypeId},
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
    sync::Arc,
};
use time::{
    Date, PrimitiveDateTime, Time, format_description::BorrowedFormatItem, macros::format_description,
};
use uuid::Uuid;

/// Text layout used to exchange dates with drivers storing them as text.
pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
pub const TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second][optional [.[subsecond]]]");
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
);
pub const TIMESTAMP_ISO_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
);

/// Dynamically typed value used for query parameters and row cells.
///
/// Every typed variant carries an `Option`: `None` is a typed NULL, it still knows its
/// SQL type and can be bound without any further hint. [`Value::Null`] is the untyped NULL.
#[derive(Default, Debug, Clone, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Float32(Option<f32>),
    Float64(Option<f64>),
    Decimal(Option<Decimal>),
    Varchar(Option<String>),
    Blob(Option<Box<[u8]>>),
    Date(Option<Date>),
    Time(Option<Time>),
    Timestamp(Option<PrimitiveDateTime>),
    Uuid(Option<Uuid>),
    /// Name of an enumeration constant.
    Enum(Option<String>),
    /// Value of a type unknown to the core, bindable only through a type handler.
    Custom(CustomValue),
}

impl Value {
    /// Wrap a value of an arbitrary type, it needs a type handler to be bound.
    pub fn custom<T: Any + Send + Sync>(value: T) -> Value {
        Value::Custom(CustomValue {
            key: TypeKey::of::<T>(),
            value: Some(Arc::new(value)),
        })
    }

    /// Typed NULL of an arbitrary type.
    pub fn custom_null<T: Any + Send + Sync>() -> Value {
        Value::Custom(CustomValue {
            key: TypeKey::of::<T>(),
            value: None,
        })
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Null
            | Value::Boolean(None)
            | Value::Int32(None)
            | Value::Int64(None)
            | Value::Float32(None)
            | Value::Float64(None)
            | Value::Decimal(None)
            | Value::Varchar(None)
            | Value::Blob(None)
            | Value::Date(None)
            | Value::Time(None)
            | Value::Timestamp(None)
            | Value::Uuid(None)
            | Value::Enum(None) => true,
            Value::Custom(v) => v.value.is_none(),
            _ => false,
        }
    }

    /// Key of the Rust type this value was produced from, used to look up type handlers.
    /// The untyped NULL and enumeration names have no key.
    pub fn type_key(&self) -> Option<TypeKey> {
        Some(match self {
            Value::Null | Value::Enum(..) => return None,
            Value::Boolean(..) => TypeKey::of::<bool>(),
            Value::Int32(..) => TypeKey::of::<i32>(),
            Value::Int64(..) => TypeKey::of::<i64>(),
            Value::Float32(..) => TypeKey::of::<f32>(),
            Value::Float64(..) => TypeKey::of::<f64>(),
            Value::Decimal(..) => TypeKey::of::<Decimal>(),
            Value::Varchar(..) => TypeKey::of::<String>(),
            Value::Blob(..) => TypeKey::of::<Box<[u8]>>(),
            Value::Date(..) => TypeKey::of::<Date>(),
            Value::Time(..) => TypeKey::of::<Time>(),
            Value::Timestamp(..) => TypeKey::of::<PrimitiveDateTime>(),
            Value::Uuid(..) => TypeKey::of::<Uuid>(),
            Value::Custom(v) => v.key,
        })
    }

    /// SQL type naturally associated with the variant.
    pub fn sql_type(&self) -> Option<SqlType> {
        Some(match self {
            Value::Null => return None,
            Value::Boolean(..) => SqlType::Boolean,
            Value::Int32(..) => SqlType::Integer,
            Value::Int64(..) => SqlType::BigInt,
            Value::Float32(..) => SqlType::Real,
            Value::Float64(..) => SqlType::Double,
            Value::Decimal(..) => SqlType::Decimal,
            Value::Varchar(..) | Value::Enum(..) => SqlType::Varchar,
            Value::Blob(..) => SqlType::Blob,
            Value::Date(..) => SqlType::Date,
            Value::Time(..) => SqlType::Time,
            Value::Timestamp(..) => SqlType::Timestamp,
            Value::Uuid(..) => SqlType::Uuid,
            Value::Custom(v) => SqlType::Other(v.key.name),
        })
    }

    /// Name of the variant, for messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Boolean(..) => "bool",
            Value::Int32(..) => "i32",
            Value::Int64(..) => "i64",
            Value::Float32(..) => "f32",
            Value::Float64(..) => "f64",
            Value::Decimal(..) => "Decimal",
            Value::Varchar(..) => "String",
            Value::Blob(..) => "Blob",
            Value::Date(..) => "Date",
            Value::Time(..) => "Time",
            Value::Timestamp(..) => "Timestamp",
            Value::Uuid(..) => "Uuid",
            Value::Enum(..) => "Enum",
            Value::Custom(v) => v.key.name,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        macro_rules! write_or_null {
            ($v:expr) => {
                match $v {
                    Some(v) => Display::fmt(v, f),
                    None => f.write_str("NULL"),
                }
            };
        }
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Boolean(v) => write_or_null!(v),
            Value::Int32(v) => write_or_null!(v),
            Value::Int64(v) => write_or_null!(v),
            Value::Float32(v) => write_or_null!(v),
            Value::Float64(v) => write_or_null!(v),
            Value::Decimal(v) => write_or_null!(v),
            Value::Varchar(v) => write_or_null!(v),
            Value::Blob(v) => match v {
                Some(v) => write!(f, "<{} bytes>", v.len()),
                None => f.write_str("NULL"),
            },
            Value::Date(v) => write_or_null!(v),
            Value::Time(v) => write_or_null!(v),
            Value::Timestamp(v) => write_or_null!(v),
            Value::Uuid(v) => write_or_null!(v),
            Value::Enum(v) => write_or_null!(v),
            Value::Custom(v) => Display::fmt(v, f),
        }
    }
}

/// Identity of a Rust type, keys the type handler registry.
#[derive(Clone, Copy)]
pub struct TypeKey {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeKey {
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: any::type_name::<T>(),
        }
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for TypeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[derive(Clone)]
pub struct CustomValue {
    pub key: TypeKey,
    pub value: Option<Arc<dyn Any + Send + Sync>>,
}

impl CustomValue {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_deref().and_then(|v| v.downcast_ref::<T>())
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && match (&self.value, &other.value) {
                (Some(l), Some(r)) => Arc::ptr_eq(l, r),
                (None, None) => true,
                _ => false,
            }
    }
}

impl Debug for CustomValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Custom({}", self.key.name)?;
        if self.value.is_none() {
            f.write_str(", NULL")?;
        }
        f.write_str(")")
    }
}

impl Display for CustomValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(..) => write!(f, "<{}>", self.key.name),
            None => f.write_str("NULL"),
        }
    }
}

/// Explicit SQL type of a parameter, it can be attached to a comparison to bind a
/// typed NULL or to let the driver coerce the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Boolean,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal,
    Varchar,
    Blob,
    Date,
    Time,
    Timestamp,
    Uuid,
    Other(&'static str),
}

impl Display for SqlType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::Double => "DOUBLE",
            SqlType::Decimal => "DECIMAL",
            SqlType::Varchar => "VARCHAR",
            SqlType::Blob => "BLOB",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Uuid => "UUID",
            SqlType::Other(name) => *name,
        })
    }
}
