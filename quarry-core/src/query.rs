use crate::{
    Clause, ConnectionHandle, Database, Error, ErrorKind, GeneratedKeys, GenericSqlWriter, Node,
    NodeKind, Param, PendingQuery, Result, ResultSet, RowLabeled, SqlWriter, Statement, Tables,
    active_transaction, bind_params, is_transaction_active,
    transaction::track_connection,
    truncate_long,
    writer::Rendered,
};
use std::{
    any,
    fmt::{self, Debug, Formatter},
    sync::Arc,
};

pub type RowMapper<T> = Box<dyn FnMut(&RowLabeled) -> Result<T> + Send>;
pub type KeysCallback = Box<dyn FnMut(&RowLabeled, usize) -> Result<()> + Send>;

/// Outcome of [`Query::execute`].
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub has_result_set: bool,
    /// Update count of the statement, one entry per batch element in batch mode.
    pub updates: Vec<u64>,
}

impl ExecutionResult {
    pub fn updated_rows(&self) -> u64 {
        self.updates.iter().sum()
    }
}

/// Executable statement: the expression tree, the tables it reads and the mapper
/// turning each row into a `T`.
///
/// Connections are borrowed from the [`Database`] when the query executes, unless one
/// was given with [`Query::connection`]. Outside of a transaction the connection is
/// closed as soon as the query is done with it (after the update count of a DML
/// statement, after the last row of a result set); inside a transaction it stays open
/// until the transaction ends.
pub struct Query<T> {
    label: String,
    children: Vec<Node>,
    tables: Tables,
    connection: Option<ConnectionHandle>,
    statement: Option<Box<dyn Statement>>,
    results: Option<Box<dyn ResultSet>>,
    mapper: Option<RowMapper<T>>,
    generated_keys: Option<KeysCallback>,
    autoclose: bool,
    veto_close: bool,
}

impl<T> Default for Query<T> {
    fn default() -> Self {
        Self {
            label: format!("Query<{}>", any::type_name::<T>()),
            children: Vec::new(),
            tables: Tables::new(),
            connection: None,
            statement: None,
            results: None,
            mapper: None,
            generated_keys: None,
            autoclose: true,
            veto_close: false,
        }
    }
}

impl<T> Query<T> {
    pub fn new(op: impl FnOnce(&mut Clause<'_>)) -> Self {
        let mut query = Self::default();
        query.build(op);
        query
    }

    /// Add more nodes to the root of the tree.
    pub fn build(&mut self, op: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        op(&mut Clause::new(&mut self.children, &mut self.tables));
        self
    }

    /// Name shown in the diagnostics.
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn map(mut self, mapper: impl FnMut(&RowLabeled) -> Result<T> + Send + 'static) -> Self {
        self.mapper = Some(Box::new(mapper));
        self
    }

    /// Called once per generated key row with its zero-based position.
    pub fn generated_keys(
        mut self,
        callback: impl FnMut(&RowLabeled, usize) -> Result<()> + Send + 'static,
    ) -> Self {
        self.generated_keys = Some(Box::new(callback));
        self
    }

    /// Whether the connection can be closed when the query is done with it, outside of
    /// transactions. Defaults to `true`.
    pub fn autoclose(mut self, autoclose: bool) -> Self {
        self.autoclose = autoclose;
        self
    }

    /// Run on `connection` instead of borrowing one.
    pub fn connection(mut self, connection: ConnectionHandle) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Connection currently held by the query.
    pub fn held_connection(&self) -> Option<&ConnectionHandle> {
        self.connection.as_ref()
    }

    pub fn render(&self) -> Result<String> {
        Ok(self.render_with(&GenericSqlWriter)?.sql)
    }

    pub fn render_with(&self, writer: &dyn SqlWriter) -> Result<Rendered> {
        writer.render(&self.children, &self.tables)
    }

    /// Parameters in placeholder order.
    pub fn params(&self) -> Result<Vec<Param>> {
        Ok(self.render_with(&GenericSqlWriter)?.params)
    }

    /// Diagnostic text: label, SQL, parameters and the active transaction.
    pub fn describe(&self) -> String {
        let (sql, params) = match self.render_with(&GenericSqlWriter) {
            Ok(rendered) => (rendered.sql, rendered.params),
            Err(error) => (format!("<{:#}>", error), Vec::new()),
        };
        let mut out = String::new();
        out.push_str("Query    : ");
        out.push_str(&self.label);
        out.push_str("\nSQL      : ");
        out.push_str(&sql.replace('\n', "\n           "));
        out.push_str("\nParams   : [");
        out.push_str(
            &params
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        );
        out.push(']');
        if let Some(id) = active_transaction() {
            out.push_str("\nTX ID    : ");
            out.push_str(&id.to_string());
        }
        out
    }

    fn with_diagnostics(&self, error: Error) -> Error {
        let error = error.context(self.describe());
        log::error!("{:#}", error);
        error
    }

    fn batch_len(&self) -> Option<usize> {
        match self.children.first() {
            Some(Node {
                kind: NodeKind::Batch(batch),
                ..
            }) => Some(batch.len()),
            _ => None,
        }
    }

    /// Render, prepare, bind and execute the statement.
    ///
    /// When the first node is a batch, the statement is prepared once and executed for
    /// every entity in a single round trip, without auto-commit. Outside of a transaction
    /// the batch is committed (or rolled back on failure) before returning.
    pub fn execute(&mut self, db: &Database) -> Result<ExecutionResult> {
        self.release();
        let batch_len = self.batch_len();
        if batch_len == Some(0) {
            return Err(self.with_diagnostics(Error::new(ErrorKind::EmptyBatch)));
        }
        let rendered = self
            .render_with(db.writer())
            .map_err(|e| self.with_diagnostics(e))?;
        let connection = match self.acquire(db, &rendered) {
            Ok(connection) => connection,
            Err(error) => return Err(self.with_diagnostics(error)),
        };
        let result = if batch_len.is_some() {
            self.execute_batch(db, &connection)
        } else {
            self.execute_single(db, &connection, &rendered)
        };
        match result {
            Ok(result) => {
                if !result.has_result_set {
                    self.check_close();
                }
                Ok(result)
            }
            Err(error) => {
                let error = self.with_diagnostics(error);
                self.check_close();
                Err(error)
            }
        }
    }

    fn acquire(&mut self, db: &Database, rendered: &Rendered) -> Result<ConnectionHandle> {
        if let Some(connection) = &self.connection {
            track_connection(connection)?;
            return Ok(connection.clone());
        }
        let connection = db.borrow(&PendingQuery {
            label: &self.label,
            sql: &rendered.sql,
            params: &rendered.params,
        })?;
        self.connection = Some(connection.clone());
        Ok(connection)
    }

    fn keys_strategy(&self) -> GeneratedKeys {
        if self.generated_keys.is_some() {
            GeneratedKeys::Return
        } else {
            GeneratedKeys::None
        }
    }

    fn execute_single(
        &mut self,
        db: &Database,
        connection: &ConnectionHandle,
        rendered: &Rendered,
    ) -> Result<ExecutionResult> {
        let keys = self.keys_strategy();
        let mut statement = connection.with(|c| c.prepare(&rendered.sql, keys))?;
        bind_params(statement.as_mut(), &rendered.params, db.handlers())?;
        log::debug!("Executing {}:\n{}", self.label, truncate_long!(rendered.sql));
        let has_result_set = statement.execute()?;
        let updates = statement.update_count().into_iter().collect();
        if has_result_set {
            self.results = statement.result_set()?;
        }
        self.harvest_keys(statement.as_mut())?;
        self.statement = Some(statement);
        Ok(ExecutionResult {
            has_result_set,
            updates,
        })
    }

    fn execute_batch(
        &mut self,
        db: &Database,
        connection: &ConnectionHandle,
    ) -> Result<ExecutionResult> {
        let auto_commit = connection.with(|c| c.auto_commit())?;
        connection.with(|c| c.set_auto_commit(false))?;
        let owned = !is_transaction_active();
        let result = self.run_batch(db, connection);
        let result = match result {
            Ok(updates) if owned => connection.with(|c| c.commit()).map(|_| updates),
            result => result,
        };
        if result.is_err() && owned {
            if let Err(error) = connection.with(|c| c.rollback()) {
                log::error!("{:#}", error.context("While rolling back the batch"));
            }
        }
        if auto_commit {
            if let Err(error) = connection.with(|c| c.set_auto_commit(true)) {
                log::error!("{:#}", error.context("While restoring auto-commit"));
            }
        }
        result.map(|updates| ExecutionResult {
            has_result_set: false,
            updates,
        })
    }

    fn run_batch(&mut self, db: &Database, connection: &ConnectionHandle) -> Result<Vec<u64>> {
        let keys = self.keys_strategy();
        let mut statement: Option<Box<dyn Statement>> = None;
        let mut entities = 0;
        loop {
            let Some(Node {
                kind: NodeKind::Batch(batch),
                children,
            }) = self.children.first_mut()
            else {
                let error = Error::new(ErrorKind::Structural(
                    "The batch must be the first node of the query".into(),
                ));
                log::error!("{:#}", error);
                return Err(error);
            };
            children.clear();
            if !(batch.next)(&mut Clause::new(children, &mut self.tables)) {
                break;
            }
            let rendered = db.writer().render(&self.children, &self.tables)?;
            if statement.is_none() {
                log::debug!(
                    "Executing batch {}:\n{}",
                    self.label,
                    truncate_long!(rendered.sql)
                );
                statement = Some(connection.with(|c| c.prepare(&rendered.sql, keys))?);
            }
            if let Some(statement) = statement.as_mut() {
                statement.clear_bindings()?;
                bind_params(statement.as_mut(), &rendered.params, db.handlers())?;
                statement.add_batch()?;
            }
            entities += 1;
        }
        let Some(mut statement) = statement else {
            return Err(Error::new(ErrorKind::EmptyBatch));
        };
        log::trace!("Batch of {} entities", entities);
        let updates = statement.execute_batch()?;
        self.harvest_keys(statement.as_mut())?;
        self.statement = Some(statement);
        Ok(updates)
    }

    fn harvest_keys(&mut self, statement: &mut dyn Statement) -> Result<()> {
        let Some(callback) = self.generated_keys.as_mut() else {
            return Ok(());
        };
        let mut keys = statement.generated_keys()?;
        let mut counter = 0;
        while let Some(row) = keys.next_row()? {
            callback(&row, counter)?;
            counter += 1;
        }
        Ok(())
    }

    /// Drop statement and result set of a previous execution.
    fn release(&mut self) {
        self.results = None;
        self.statement = None;
    }

    /// Close the connection unless closing is vetoed, a transaction is active or
    /// autoclose is disabled.
    fn check_close(&mut self) {
        if self.veto_close || is_transaction_active() || !self.autoclose {
            return;
        }
        self.release();
        if let Some(connection) = self.connection.take() {
            log::trace!("Closing {:?} after {}", connection, self.label);
            if let Err(error) = connection.close() {
                log::error!("{:#}", error.context("While closing the connection"));
            }
        }
    }

    /// Execute the query requiring it to produce a result set.
    fn require_result_set(&mut self, db: &Database) -> Result<()> {
        if self.mapper.is_none() {
            return Err(self.with_diagnostics(Error::new(ErrorKind::MissingMapper)));
        }
        self.veto_close = true;
        let result = self.execute(db);
        self.veto_close = false;
        match result {
            Ok(result) if result.has_result_set && self.results.is_some() => Ok(()),
            Ok(..) => {
                let error = self.with_diagnostics(Error::new(ErrorKind::NoResultSet));
                self.check_close();
                Err(error)
            }
            Err(error) => {
                self.check_close();
                Err(error)
            }
        }
    }

    /// Map the next row, the columns of the tables read from it while the mapper runs.
    fn next_mapped(&mut self) -> Result<Option<T>> {
        let Some(results) = self.results.as_mut() else {
            return Ok(None);
        };
        let Some(row) = results.next_row()? else {
            self.tables.set_row(None);
            return Ok(None);
        };
        let row = Arc::new(row);
        self.tables.set_row(Some(row.clone()));
        let Some(mapper) = self.mapper.as_mut() else {
            return Err(Error::new(ErrorKind::MissingMapper));
        };
        self.tables.expose(|| mapper(&row)).map(Some)
    }

    fn finish_results(&mut self) {
        self.results = None;
        self.tables.set_row(None);
        self.check_close();
    }

    /// First row, `None` when the result set is empty.
    pub fn first(&mut self, db: &Database) -> Result<Option<T>> {
        self.require_result_set(db)?;
        let result = self.next_mapped();
        self.finish_results();
        result
    }

    /// First row, an [`ErrorKind::EmptyResult`] when the result set is empty.
    pub fn single(&mut self, db: &Database) -> Result<T> {
        match self.first(db)? {
            Some(value) => Ok(value),
            None => Err(self.with_diagnostics(Error::new(ErrorKind::EmptyResult))),
        }
    }

    /// Every row, read before the connection is released.
    pub fn list(&mut self, db: &Database) -> Result<Vec<T>> {
        self.require_result_set(db)?;
        let mut result = Vec::new();
        loop {
            match self.next_mapped() {
                Ok(Some(value)) => result.push(value),
                Ok(None) => break,
                Err(error) => {
                    self.finish_results();
                    return Err(error);
                }
            }
        }
        self.finish_results();
        Ok(result)
    }

    /// Rows read one at a time, the connection is released when the iterator is
    /// exhausted or dropped.
    pub fn iter(&mut self, db: &Database) -> Result<Rows<'_, T>> {
        self.require_result_set(db)?;
        Ok(Rows {
            query: self,
            done: false,
        })
    }

    /// Take the raw result set of the last execution, the caller reads it directly.
    pub fn result_set(&mut self) -> Option<Box<dyn ResultSet>> {
        self.results.take()
    }

    /// Update count of the last single statement execution.
    pub fn update_count(&self) -> Option<u64> {
        self.statement.as_ref().and_then(|s| s.update_count())
    }
}

impl<T> Debug for Query<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("label", &self.label)
            .field("children", &self.children)
            .field("tables", &self.tables)
            .field("connection", &self.connection)
            .field("autoclose", &self.autoclose)
            .finish()
    }
}

/// Lazy iterator over the rows of a query.
pub struct Rows<'q, T> {
    query: &'q mut Query<T>,
    done: bool,
}

impl<T> Iterator for Rows<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.query.next_mapped() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                self.query.finish_results();
                None
            }
            Err(error) => {
                self.done = true;
                self.query.finish_results();
                Some(Err(error))
            }
        }
    }
}

impl<T> Drop for Rows<'_, T> {
    fn drop(&mut self) {
        if !self.done {
            self.query.finish_results();
        }
    }
}
