use crate::{AsValue, Error, ErrorKind, Result, SqlType, Statement, TypeKey, Value};
use std::{
    any::Any,
    collections::HashMap,
    fmt::{self, Debug, Display, Formatter},
    sync::Arc,
};

/// Binds values of one type on a statement, taking over the built-in binding.
pub trait TypeHandler: Send + Sync {
    fn bind(&self, statement: &mut dyn Statement, index: usize, value: &Value) -> Result<()>;
}

impl<F> TypeHandler for F
where
    F: Fn(&mut dyn Statement, usize, &Value) -> Result<()> + Send + Sync,
{
    fn bind(&self, statement: &mut dyn Statement, index: usize, value: &Value) -> Result<()> {
        self(statement, index, value)
    }
}

/// Registry of type handlers keyed by the Rust type of the value.
#[derive(Clone, Default)]
pub struct TypeHandlers {
    handlers: HashMap<TypeKey, Arc<dyn TypeHandler>>,
}

impl TypeHandlers {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn register<T: Any>(&mut self, handler: impl TypeHandler + 'static) {
        self.handlers.insert(TypeKey::of::<T>(), Arc::new(handler));
    }
    pub fn get(&self, key: &TypeKey) -> Option<&Arc<dyn TypeHandler>> {
        self.handlers.get(key)
    }
    pub fn len(&self) -> usize {
        self.handlers.len()
    }
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Debug for TypeHandlers {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// Value bound to one `?` placeholder.
#[derive(Clone)]
pub struct Param {
    pub value: Value,
    pub sql_type: Option<SqlType>,
    pub handler: Option<Arc<dyn TypeHandler>>,
}

impl Param {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            sql_type: None,
            handler: None,
        }
    }
    pub fn typed(mut self, sql_type: SqlType) -> Self {
        self.sql_type = Some(sql_type);
        self
    }
    pub fn handled(mut self, handler: Arc<dyn TypeHandler>) -> Self {
        self.handler = Some(handler);
        self
    }
}

impl<T: AsValue> From<T> for Param {
    fn from(value: T) -> Self {
        Param::new(value.as_value())
    }
}

impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.sql_type == other.sql_type
    }
}

impl Debug for Param {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Param");
        s.field("value", &self.value);
        if let Some(sql_type) = self.sql_type {
            s.field("sql_type", &sql_type);
        }
        if self.handler.is_some() {
            s.field("handler", &"..");
        }
        s.finish()
    }
}

impl Display for Param {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)?;
        if let Some(sql_type) = self.sql_type {
            write!(f, " ({})", sql_type)?;
        }
        Ok(())
    }
}

/// Bind `params` on `statement` in order, the first one at index 1.
///
/// For every parameter the first applicable rule wins: the handler attached to the
/// parameter, the handler registered for the type of a non NULL value, the explicit
/// SQL type, the built-in binding of the value variant.
pub fn bind_params(
    statement: &mut dyn Statement,
    params: &[Param],
    handlers: &TypeHandlers,
) -> Result<()> {
    for (i, param) in params.iter().enumerate() {
        bind_param(statement, i + 1, param, handlers)?;
    }
    Ok(())
}

fn bind_param(
    statement: &mut dyn Statement,
    index: usize,
    param: &Param,
    handlers: &TypeHandlers,
) -> Result<()> {
    let registered = if param.value.is_null() {
        None
    } else {
        param.value.type_key().and_then(|key| handlers.get(&key))
    };
    if let Some(handler) = param.handler.as_ref().or(registered) {
        log::trace!("Binding #{index} {} through a type handler", param.value);
        return handler.bind(statement, index, &param.value);
    }
    if let Some(sql_type) = param.sql_type {
        log::trace!("Binding #{index} {} as {}", param.value, sql_type);
        return if param.value.is_null() {
            statement.bind_null(index, sql_type)
        } else {
            statement.bind_typed(index, param.value.clone(), sql_type)
        };
    }
    match &param.value {
        Value::Null => Err(Error::new(ErrorKind::NullParameter(index))),
        Value::Custom(v) if v.value.is_none() => Err(Error::new(ErrorKind::NullParameter(index))),
        Value::Custom(v) => Err(Error::new(ErrorKind::UnsupportedParameter {
            position: index,
            type_name: v.key.name,
        })),
        value if value.is_null() => {
            let sql_type = value.sql_type().ok_or_else(|| {
                Error::new(ErrorKind::NullParameter(index))
            })?;
            log::trace!("Binding #{index} NULL as {}", sql_type);
            statement.bind_null(index, sql_type)
        }
        value => {
            log::trace!("Binding #{index} {}", value);
            statement.bind(index, value.clone())
        }
    }
}
