use crate::{Error, ErrorKind, Param, Result, RowLabeled, RowNames, SqlType, Value};
use std::{
    fmt::{self, Display, Formatter},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicU64, Ordering},
    },
};

/// Whether the statement should make the keys generated by the database available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratedKeys {
    #[default]
    None,
    Return,
}

/// A live database connection.
///
/// Drivers implement this trait, the core only sees it through a [`ConnectionHandle`].
/// Transactions are expressed the JDBC way: disabling auto-commit opens a unit of work
/// that is finished by [`Connection::commit`] or [`Connection::rollback`].
pub trait Connection: Send {
    fn prepare(&mut self, sql: &str, keys: GeneratedKeys) -> Result<Box<dyn Statement>>;
    fn auto_commit(&self) -> Result<bool>;
    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    fn is_closed(&self) -> bool;
}

/// Prepared statement, parameter indexes are 1-based.
pub trait Statement: Send {
    fn sql(&self) -> &str;
    fn bind(&mut self, index: usize, value: Value) -> Result<()>;
    fn bind_null(&mut self, index: usize, sql_type: SqlType) -> Result<()>;
    /// Bind a value asking the driver to coerce it to the given SQL type.
    fn bind_typed(&mut self, index: usize, value: Value, sql_type: SqlType) -> Result<()>;
    fn clear_bindings(&mut self) -> Result<()>;
    /// Record the current bindings as one entry of the batch.
    fn add_batch(&mut self) -> Result<()>;
    /// Execute the statement, returns `true` when it produced a result set.
    fn execute(&mut self) -> Result<bool>;
    /// Execute every recorded batch entry, returns the update count of each.
    fn execute_batch(&mut self) -> Result<Vec<u64>>;
    /// Rows changed by the last execution, `None` when it produced a result set.
    fn update_count(&self) -> Option<u64>;
    /// Take the result set produced by the last execution.
    fn result_set(&mut self) -> Result<Option<Box<dyn ResultSet>>>;
    fn generated_keys(&mut self) -> Result<Box<dyn ResultSet>>;
}

/// Forward only cursor over the rows produced by a statement.
pub trait ResultSet: Send {
    fn labels(&self) -> RowNames;
    fn next_row(&mut self) -> Result<Option<RowLabeled>>;
}

/// Result set backed by rows already in memory.
pub struct BufferedResultSet {
    labels: RowNames,
    rows: std::vec::IntoIter<RowLabeled>,
}

impl BufferedResultSet {
    pub fn new(labels: RowNames, rows: Vec<RowLabeled>) -> Self {
        Self {
            labels,
            rows: rows.into_iter(),
        }
    }
}

impl ResultSet for BufferedResultSet {
    fn labels(&self) -> RowNames {
        self.labels.clone()
    }
    fn next_row(&mut self) -> Result<Option<RowLabeled>> {
        Ok(self.rows.next())
    }
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Shared reference to a connection.
///
/// The same connection is reachable from the transaction that pinned it and from the
/// queries running inside it, identity is given by the handle id.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: u64,
    connection: Arc<Mutex<Box<dyn Connection>>>,
}

impl ConnectionHandle {
    pub fn new<C: Connection + 'static>(connection: C) -> Self {
        Self::from_boxed(Box::new(connection))
    }

    pub fn from_boxed(connection: Box<dyn Connection>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            connection: Arc::new(Mutex::new(connection)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the two handles point to the same connection.
    pub fn same(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.connection, &other.connection)
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn Connection>> {
        // A panic while holding the lock leaves the connection usable, the caller decides what to do with it
        self.connection
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn Connection) -> Result<R>) -> Result<R> {
        let mut guard = self.lock();
        if guard.is_closed() {
            return Err(Error::new(ErrorKind::ConnectionClosed));
        }
        f(guard.as_mut())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_closed()
    }

    /// Close the connection, closing an already closed connection does nothing.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock();
        if guard.is_closed() {
            return Ok(());
        }
        guard.close()
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionHandle({})", self.id)
    }
}

/// A query about to borrow a connection, given to the connection factory.
#[derive(Debug)]
pub struct PendingQuery<'a> {
    pub label: &'a str,
    pub sql: &'a str,
    pub params: &'a [Param],
}

impl Display for PendingQuery<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.sql)
    }
}
