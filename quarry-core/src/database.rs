use crate::{
    Connection, ConnectionHandle, Error, ErrorKind, GenericSqlWriter, PendingQuery, Result,
    SqlWriter, TypeHandler, TypeHandlers,
    transaction::{pinned_connection, track_connection},
};
use std::{
    any::Any,
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

pub type ConnectionFactory =
    Arc<dyn Fn(&PendingQuery<'_>) -> Result<ConnectionHandle> + Send + Sync>;

/// Configuration shared by the queries: where connections come from, how parameters are
/// bound and how SQL is written.
///
/// Cheap to clone, clones share the factory and the handlers.
#[derive(Clone)]
pub struct Database {
    factory: Option<ConnectionFactory>,
    handlers: TypeHandlers,
    writer: Arc<dyn SqlWriter>,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            factory: None,
            handlers: TypeHandlers::new(),
            writer: Arc::new(GenericSqlWriter),
        }
    }
}

impl Database {
    pub fn new() -> Self {
        Default::default()
    }

    /// Open a new connection for each query that does not run in a transaction.
    pub fn with_factory<C, F>(self, factory: F) -> Self
    where
        C: Connection + 'static,
        F: Fn(&PendingQuery<'_>) -> Result<C> + Send + Sync + 'static,
    {
        self.with_handle_factory(move |query| factory(query).map(ConnectionHandle::new))
    }

    /// Factory producing shared handles directly, for example to hand out a pooled connection.
    pub fn with_handle_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&PendingQuery<'_>) -> Result<ConnectionHandle> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Bind every non NULL value of type `T` through `handler`.
    pub fn with_type_handler<T: Any>(mut self, handler: impl TypeHandler + 'static) -> Self {
        self.handlers.register::<T>(handler);
        self
    }

    pub fn with_writer(mut self, writer: impl SqlWriter + 'static) -> Self {
        self.writer = Arc::new(writer);
        self
    }

    pub fn handlers(&self) -> &TypeHandlers {
        &self.handlers
    }

    pub fn writer(&self) -> &dyn SqlWriter {
        self.writer.as_dyn()
    }

    /// Connection for `query`: the one pinned to the active transaction or a new one
    /// from the factory, that becomes the pinned one if a transaction is active.
    pub fn borrow(&self, query: &PendingQuery<'_>) -> Result<ConnectionHandle> {
        if let Some(connection) = pinned_connection() {
            return Ok(connection);
        }
        let Some(factory) = &self.factory else {
            let error = Error::new(ErrorKind::MissingConnectionFactory);
            log::error!("{:#}", error);
            return Err(error);
        };
        let connection = factory(query)?;
        log::trace!("Borrowed {:?} for {}", connection, query.label);
        track_connection(&connection)?;
        Ok(connection)
    }
}

impl Debug for Database {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("factory", &self.factory.is_some())
            .field("handlers", &self.handlers)
            .finish()
    }
}
