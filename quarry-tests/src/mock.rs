use quarry::{
    BufferedResultSet, Connection, ConnectionHandle, Database, Error, GeneratedKeys, Result,
    ResultSet, RowLabeled, RowNames, SqlType, Statement, Value,
};
use std::sync::{Arc, Mutex, MutexGuard};

/// What a recording connection was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Prepare(String),
    Bind(usize, Value),
    BindNull(usize, SqlType),
    BindTyped(usize, Value, SqlType),
    AddBatch,
    Execute,
    ExecuteBatch(usize),
    SetAutoCommit(bool),
    Commit,
    Rollback,
    Close,
}

/// Event tagged with the id of the connection that recorded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub connection: u64,
    pub event: Event,
}

#[derive(Default)]
struct MockState {
    events: Vec<Recorded>,
    labels: Option<RowNames>,
    rows: Vec<Box<[Value]>>,
    fail_on: Option<String>,
    opened: u64,
}

/// Scripted database recording every call made on its connections.
///
/// Statements starting with `SELECT` produce the scripted rows, every other statement
/// reports one updated row and, when asked, one generated key per execution.
#[derive(Clone, Default)]
pub struct Mock {
    state: Arc<Mutex<MockState>>,
}

impl Mock {
    pub fn new() -> Self {
        Default::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Rows returned by every `SELECT`.
    pub fn with_rows(self, labels: &[&str], rows: Vec<Vec<Value>>) -> Self {
        {
            let mut state = self.state();
            state.labels = Some(labels.iter().map(|v| v.to_string()).collect());
            state.rows = rows.into_iter().map(Vec::into_boxed_slice).collect();
        }
        self
    }

    /// Fail the execution of statements containing `fragment`.
    pub fn fail_on(self, fragment: impl Into<String>) -> Self {
        self.state().fail_on = Some(fragment.into());
        self
    }

    pub fn connect(&self) -> RecordingConnection {
        let id = {
            let mut state = self.state();
            state.opened += 1;
            state.opened
        };
        RecordingConnection {
            id,
            mock: self.clone(),
            auto_commit: true,
            closed: false,
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle::new(self.connect())
    }

    /// Database opening a new recording connection for every borrow.
    pub fn database(&self) -> Database {
        let mock = self.clone();
        Database::new().with_factory(move |_| Ok(mock.connect()))
    }

    fn record(&self, connection: u64, event: Event) {
        self.state().events.push(Recorded { connection, event });
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.state().events.clone()
    }

    /// Events of one connection, in order.
    pub fn events_of(&self, connection: u64) -> Vec<Event> {
        self.state()
            .events
            .iter()
            .filter(|v| v.connection == connection)
            .map(|v| v.event.clone())
            .collect()
    }

    /// Number of occurrences of `event` across all the connections.
    pub fn count(&self, event: &Event) -> usize {
        self.state()
            .events
            .iter()
            .filter(|v| &v.event == event)
            .count()
    }

    /// Number of connections opened so far.
    pub fn opened(&self) -> u64 {
        self.state().opened
    }

    /// Connections opened and not yet closed.
    pub fn open_connections(&self) -> usize {
        let state = self.state();
        let closed = state
            .events
            .iter()
            .filter(|v| v.event == Event::Close)
            .count();
        state.opened as usize - closed
    }

    pub fn clear(&self) {
        self.state().events.clear();
    }
}

pub struct RecordingConnection {
    id: u64,
    mock: Mock,
    auto_commit: bool,
    closed: bool,
}

impl RecordingConnection {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Connection for RecordingConnection {
    fn prepare(&mut self, sql: &str, keys: GeneratedKeys) -> Result<Box<dyn Statement>> {
        self.mock.record(self.id, Event::Prepare(sql.to_string()));
        Ok(Box::new(RecordingStatement {
            connection: self.id,
            mock: self.mock.clone(),
            sql: sql.to_string(),
            keys,
            batch: 0,
            executions: 0,
            update_count: None,
            results: None,
        }))
    }

    fn auto_commit(&self) -> Result<bool> {
        Ok(self.auto_commit)
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        self.mock.record(self.id, Event::SetAutoCommit(auto_commit));
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.mock.record(self.id, Event::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.mock.record(self.id, Event::Rollback);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.mock.record(self.id, Event::Close);
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

pub struct RecordingStatement {
    connection: u64,
    mock: Mock,
    sql: String,
    keys: GeneratedKeys,
    batch: usize,
    executions: usize,
    update_count: Option<u64>,
    results: Option<BufferedResultSet>,
}

impl RecordingStatement {
    fn record(&self, event: Event) {
        self.mock.record(self.connection, event);
    }

    fn check_failure(&self) -> Result<()> {
        let fail_on = self.mock.state().fail_on.clone();
        match fail_on {
            Some(fragment) if self.sql.contains(&fragment) => Err(Error::msg(format!(
                "Scripted failure of the statement containing `{}`",
                fragment
            ))),
            _ => Ok(()),
        }
    }
}

impl Statement for RecordingStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, index: usize, value: Value) -> Result<()> {
        self.record(Event::Bind(index, value));
        Ok(())
    }

    fn bind_null(&mut self, index: usize, sql_type: SqlType) -> Result<()> {
        self.record(Event::BindNull(index, sql_type));
        Ok(())
    }

    fn bind_typed(&mut self, index: usize, value: Value, sql_type: SqlType) -> Result<()> {
        self.record(Event::BindTyped(index, value, sql_type));
        Ok(())
    }

    fn clear_bindings(&mut self) -> Result<()> {
        Ok(())
    }

    fn add_batch(&mut self) -> Result<()> {
        self.record(Event::AddBatch);
        self.batch += 1;
        Ok(())
    }

    fn execute(&mut self) -> Result<bool> {
        self.record(Event::Execute);
        self.check_failure()?;
        if self.sql.trim_start().starts_with("SELECT") {
            let state = self.mock.state();
            let labels = state.labels.clone().unwrap_or_else(|| RowNames::from(Vec::new()));
            let rows = state
                .rows
                .iter()
                .map(|v| RowLabeled::new(labels.clone(), v.clone()))
                .collect();
            drop(state);
            self.results = Some(BufferedResultSet::new(labels, rows));
            self.update_count = None;
            return Ok(true);
        }
        self.executions = 1;
        self.update_count = Some(1);
        Ok(false)
    }

    fn execute_batch(&mut self) -> Result<Vec<u64>> {
        self.record(Event::ExecuteBatch(self.batch));
        self.check_failure()?;
        let updates = vec![1; self.batch];
        self.executions = self.batch;
        self.update_count = Some(self.batch as u64);
        self.batch = 0;
        Ok(updates)
    }

    fn update_count(&self) -> Option<u64> {
        self.update_count
    }

    fn result_set(&mut self) -> Result<Option<Box<dyn ResultSet>>> {
        Ok(self
            .results
            .take()
            .map(|v| Box::new(v) as Box<dyn ResultSet>))
    }

    fn generated_keys(&mut self) -> Result<Box<dyn ResultSet>> {
        let labels: RowNames = Arc::new(["id".to_string()]);
        let count = if self.keys == GeneratedKeys::Return {
            self.executions
        } else {
            0
        };
        let rows = (0..count)
            .map(|i| RowLabeled::new(labels.clone(), Box::new([Value::Int64(Some(i as i64 + 1))])))
            .collect();
        Ok(Box::new(BufferedResultSet::new(labels, rows)))
    }
}
