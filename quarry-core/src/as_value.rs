use crate::{
    DATE_FORMAT, Error, Result, TIME_FORMAT, TIMESTAMP_FORMAT, TIMESTAMP_ISO_FORMAT, Value,
    truncate_long,
};
use rust_decimal::{Decimal, prelude::FromPrimitive};
use std::{any, str::FromStr};
use time::{Date, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Conversion between Rust types and the dynamically typed [`Value`].
///
/// Used in both directions: to turn parameters into values before they are bound and
/// to read row cells back into typed fields. Drivers are not required to give back the
/// same variant they received (SQLite for example returns every integer as `Int64`
/// and dates as text), so `try_from_value` accepts the alternative representations.
///
/// ```rust
/// use quarry_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert_eq!(v, Value::Int32(Some(42)));
/// let n = i32::try_from_value(Value::Int64(Some(42))).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// Typed NULL of this type.
    fn as_empty_value() -> Value;
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

fn conversion_error<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {:?} to {}",
        value,
        any::type_name::<T>()
    ))
}

fn out_of_range<T>(value: impl std::fmt::Display) -> Error {
    Error::msg(format!(
        "Value {} is out of range for {}",
        value,
        any::type_name::<T>()
    ))
}

macro_rules! impl_as_value {
    ($source:ty, $destination:path, $value:ident $(, $pat_rest:pat => $expr_rest:expr)* $(,)?) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self.into()))
            }
            fn try_from_value($value: Value) -> Result<Self> {
                match $value {
                    $destination(Some(v)) => Ok(v.into()),
                    $($pat_rest => $expr_rest,)*
                    _ => Err(conversion_error::<Self>(&$value)),
                }
            }
        }

        impl From<$source> for Value {
            fn from(value: $source) -> Self {
                value.as_value()
            }
        }
    };
}

impl_as_value!(
    bool,
    Value::Boolean,
    value,
    Value::Int32(Some(v)) => Ok(v != 0),
    Value::Int64(Some(v)) => Ok(v != 0),
    Value::Varchar(Some(ref v)) => match v.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(conversion_error::<bool>(&value)),
    },
);
impl_as_value!(
    i32,
    Value::Int32,
    value,
    Value::Int64(Some(v)) => i32::try_from(v).map_err(|_| out_of_range::<i32>(v)),
    Value::Varchar(Some(ref v)) => v
        .trim()
        .parse()
        .map_err(|_| conversion_error::<i32>(&value)),
);
impl_as_value!(
    i64,
    Value::Int64,
    value,
    Value::Int32(Some(v)) => Ok(v as i64),
    Value::Varchar(Some(ref v)) => v
        .trim()
        .parse()
        .map_err(|_| conversion_error::<i64>(&value)),
);
impl_as_value!(
    f32,
    Value::Float32,
    value,
    Value::Float64(Some(v)) => Ok(v as f32),
    Value::Int32(Some(v)) => Ok(v as f32),
    Value::Int64(Some(v)) => Ok(v as f32),
);
impl_as_value!(
    f64,
    Value::Float64,
    value,
    Value::Float32(Some(v)) => Ok(v as f64),
    Value::Int32(Some(v)) => Ok(v as f64),
    Value::Int64(Some(v)) => Ok(v as f64),
);
impl_as_value!(
    Decimal,
    Value::Decimal,
    value,
    Value::Int32(Some(v)) => Ok(Decimal::from(v)),
    Value::Int64(Some(v)) => Ok(Decimal::from(v)),
    Value::Float32(Some(v)) => Decimal::from_f32(v).ok_or_else(|| out_of_range::<Decimal>(v)),
    Value::Float64(Some(v)) => Decimal::from_f64(v).ok_or_else(|| out_of_range::<Decimal>(v)),
    Value::Varchar(Some(ref v)) => Decimal::from_str(v.trim()).map_err(|e| {
        Error::new(e).context(format!("Cannot parse `{}` as Decimal", truncate_long!(v)))
    }),
);
impl_as_value!(
    String,
    Value::Varchar,
    value,
    Value::Enum(Some(v)) => Ok(v),
);
impl_as_value!(
    Box<[u8]>,
    Value::Blob,
    value,
    Value::Varchar(Some(v)) => Ok(v.into_bytes().into_boxed_slice()),
);
impl_as_value!(
    Vec<u8>,
    Value::Blob,
    value,
    Value::Varchar(Some(v)) => Ok(v.into_bytes()),
);
impl_as_value!(
    Date,
    Value::Date,
    value,
    Value::Varchar(Some(ref v)) => Date::parse(v, DATE_FORMAT).map_err(|e| {
        Error::new(e).context(format!("Cannot parse `{}` as Date", truncate_long!(v)))
    }),
);
impl_as_value!(
    Time,
    Value::Time,
    value,
    Value::Varchar(Some(ref v)) => Time::parse(v, TIME_FORMAT).map_err(|e| {
        Error::new(e).context(format!("Cannot parse `{}` as Time", truncate_long!(v)))
    }),
);
impl_as_value!(
    PrimitiveDateTime,
    Value::Timestamp,
    value,
    Value::Varchar(Some(ref v)) => PrimitiveDateTime::parse(v, TIMESTAMP_FORMAT)
        .or_else(|_| PrimitiveDateTime::parse(v, TIMESTAMP_ISO_FORMAT))
        .map_err(|e| {
            Error::new(e).context(format!("Cannot parse `{}` as Timestamp", truncate_long!(v)))
        }),
);
impl_as_value!(
    Uuid,
    Value::Uuid,
    value,
    Value::Varchar(Some(ref v)) => Uuid::parse_str(v).map_err(|e| {
        Error::new(e).context(format!("Cannot parse `{}` as Uuid", truncate_long!(v)))
    }),
    Value::Blob(Some(ref v)) => Uuid::from_slice(v).map_err(Error::new),
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::try_from_value(value).map(Some)
    }
}

impl<T: AsValue> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.as_value()
    }
}

impl AsValue for Value {
    fn as_empty_value() -> Value {
        Value::Null
    }
    fn as_value(self) -> Value {
        self
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}
