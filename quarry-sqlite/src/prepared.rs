use crate::{CBox, SqliteRows, error_message_from_ptr};
use libsqlite3_sys::*;
use quarry_core::{
    AsValue, BufferedResultSet, DATE_FORMAT, Error, GeneratedKeys, Result, ResultSet, RowLabeled,
    SqlType, Statement, TIME_FORMAT, TIMESTAMP_FORMAT, Value, truncate_long,
};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::{
    ffi::c_int,
    fmt::{self, Display},
    ops::Deref,
    os::raw::{c_char, c_void},
    sync::Arc,
};

/// Compiled statement, it keeps the database handle alive until it is finalized.
pub(crate) struct StatementHandle {
    // Finalized before the handle is released
    statement: CBox<*mut sqlite3_stmt>,
    _connection: Arc<CBox<*mut sqlite3>>,
}

impl StatementHandle {
    pub(crate) fn new(
        statement: CBox<*mut sqlite3_stmt>,
        connection: Arc<CBox<*mut sqlite3>>,
    ) -> Self {
        Self {
            statement,
            _connection: connection,
        }
    }
}

impl Deref for StatementHandle {
    type Target = *mut sqlite3_stmt;

    fn deref(&self) -> &Self::Target {
        &self.statement.ptr
    }
}

/// Prepared SQLite statement.
///
/// Bindings are collected and applied when the statement executes, so the same
/// statement can run once per batch entry.
pub struct SqliteStatement {
    pub(crate) statement: Arc<StatementHandle>,
    sql: String,
    keys: GeneratedKeys,
    bindings: Vec<Option<Value>>,
    batch: Vec<Vec<Option<Value>>>,
    update_count: Option<u64>,
    results: Option<SqliteRows>,
    generated: Vec<i64>,
}

impl SqliteStatement {
    pub(crate) fn new(statement: StatementHandle, sql: String, keys: GeneratedKeys) -> Self {
        let count = unsafe { sqlite3_bind_parameter_count(*statement) } as usize;
        Self {
            statement: Arc::new(statement),
            sql,
            keys,
            bindings: vec![None; count],
            batch: Vec::new(),
            update_count: None,
            results: None,
            generated: Vec::new(),
        }
    }

    fn slot(&mut self, index: usize) -> Result<&mut Option<Value>> {
        let count = self.bindings.len();
        self.bindings.get_mut(index.wrapping_sub(1)).ok_or_else(|| {
            let error = Error::msg(format!(
                "Parameter index {} is out of range, the query has {} parameters:\n{}",
                index,
                count,
                truncate_long!(self.sql)
            ));
            log::error!("{:#}", error);
            error
        })
    }

    fn error(&self, context: &str) -> Error {
        let message = unsafe {
            let db = sqlite3_db_handle(**self.statement);
            error_message_from_ptr(&sqlite3_errmsg(db)).to_string()
        };
        let error = Error::msg(message).context(format!(
            "{}:\n{}",
            context,
            truncate_long!(self.sql)
        ));
        log::error!("{:#}", error);
        error
    }

    /// Reset the statement and bind `values`.
    fn apply(&self, values: &[Option<Value>]) -> Result<()> {
        unsafe {
            sqlite3_reset(**self.statement);
            sqlite3_clear_bindings(**self.statement);
        }
        for (i, value) in values.iter().enumerate() {
            let Some(value) = value else {
                let error = Error::msg(format!(
                    "Parameter {} was not bound for query:\n{}",
                    i + 1,
                    truncate_long!(self.sql)
                ));
                log::error!("{:#}", error);
                return Err(error);
            };
            self.bind_index(value, (i + 1) as c_int)?;
        }
        Ok(())
    }

    fn bind_index(&self, value: &Value, index: c_int) -> Result<()> {
        let statement = **self.statement;
        unsafe {
            let rc = match value {
                v if v.is_null() => sqlite3_bind_null(statement, index),
                Value::Boolean(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
                Value::Int32(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
                Value::Int64(Some(v)) => sqlite3_bind_int64(statement, index, *v),
                Value::Float32(Some(v)) => sqlite3_bind_double(statement, index, *v as f64),
                Value::Float64(Some(v)) => sqlite3_bind_double(statement, index, *v),
                Value::Decimal(Some(v)) => sqlite3_bind_double(
                    statement,
                    index,
                    v.to_f64().ok_or_else(|| {
                        Error::msg(format!("Cannot convert the Decimal value `{}` to f64", v))
                    })?,
                ),
                Value::Varchar(Some(v)) | Value::Enum(Some(v)) => bind_text(statement, index, v),
                Value::Blob(Some(v)) => sqlite3_bind_blob(
                    statement,
                    index,
                    v.as_ptr() as *const c_void,
                    v.len() as c_int,
                    SQLITE_TRANSIENT(),
                ),
                Value::Date(Some(v)) => bind_text(statement, index, &v.format(DATE_FORMAT)?),
                Value::Time(Some(v)) => bind_text(statement, index, &v.format(TIME_FORMAT)?),
                Value::Timestamp(Some(v)) => {
                    bind_text(statement, index, &v.format(TIMESTAMP_FORMAT)?)
                }
                Value::Uuid(Some(v)) => bind_text(statement, index, &v.to_string()),
                _ => {
                    let error =
                        Error::msg(format!("Cannot use a {:?} as a query parameter", value));
                    log::error!("{:#}", error);
                    return Err(error);
                }
            };
            if rc != SQLITE_OK {
                return Err(self.error(&format!("Cannot bind parameter {} to query", index)));
            }
        }
        Ok(())
    }

    /// Step until the statement is done, returns the rows it changed.
    fn run_to_completion(&mut self) -> Result<u64> {
        let statement = **self.statement;
        unsafe {
            let db = sqlite3_db_handle(statement);
            let before = sqlite3_total_changes(db);
            loop {
                match sqlite3_step(statement) {
                    SQLITE_DONE => break,
                    SQLITE_ROW => continue,
                    _ => return Err(self.error("While executing the query")),
                }
            }
            if self.keys == GeneratedKeys::Return {
                self.generated.push(sqlite3_last_insert_rowid(db));
            }
            Ok((sqlite3_total_changes(db) - before).max(0) as u64)
        }
    }

    fn is_query(&self) -> bool {
        unsafe { sqlite3_column_count(**self.statement) > 0 }
    }
}

unsafe fn bind_text(statement: *mut sqlite3_stmt, index: c_int, value: &str) -> c_int {
    unsafe {
        sqlite3_bind_text(
            statement,
            index,
            value.as_ptr() as *const c_char,
            value.len() as c_int,
            SQLITE_TRANSIENT(),
        )
    }
}

/// Convert `value` to the representation SQLite stores for `sql_type`.
fn coerce(value: Value, sql_type: SqlType) -> Result<Value> {
    Ok(match sql_type {
        SqlType::Boolean => bool::try_from_value(value)?.as_value(),
        SqlType::Integer | SqlType::BigInt => i64::try_from_value(value)?.as_value(),
        SqlType::Real | SqlType::Double => f64::try_from_value(value)?.as_value(),
        SqlType::Decimal => Decimal::try_from_value(value)?.as_value(),
        SqlType::Varchar => match value {
            Value::Varchar(..) => value,
            value => Value::Varchar(Some(value.to_string())),
        },
        _ => value,
    })
}

impl Statement for SqliteStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn bind(&mut self, index: usize, value: Value) -> Result<()> {
        *self.slot(index)? = Some(value);
        Ok(())
    }

    fn bind_null(&mut self, index: usize, _sql_type: SqlType) -> Result<()> {
        *self.slot(index)? = Some(Value::Null);
        Ok(())
    }

    fn bind_typed(&mut self, index: usize, value: Value, sql_type: SqlType) -> Result<()> {
        let value = coerce(value, sql_type).map_err(|e| {
            let error = e.context(format!("Cannot bind parameter {} as {}", index, sql_type));
            log::error!("{:#}", error);
            error
        })?;
        *self.slot(index)? = Some(value);
        Ok(())
    }

    fn clear_bindings(&mut self) -> Result<()> {
        self.bindings.iter_mut().for_each(|v| *v = None);
        Ok(())
    }

    fn add_batch(&mut self) -> Result<()> {
        self.batch.push(self.bindings.clone());
        Ok(())
    }

    fn execute(&mut self) -> Result<bool> {
        self.results = None;
        self.generated.clear();
        self.apply(&self.bindings)?;
        if self.is_query() {
            self.update_count = None;
            self.results = Some(SqliteRows::new(self.statement.clone())?);
            return Ok(true);
        }
        self.update_count = Some(self.run_to_completion()?);
        Ok(false)
    }

    fn execute_batch(&mut self) -> Result<Vec<u64>> {
        self.results = None;
        self.generated.clear();
        let batch = std::mem::take(&mut self.batch);
        let mut updates = Vec::with_capacity(batch.len());
        for bindings in &batch {
            self.apply(bindings)?;
            updates.push(self.run_to_completion()?);
        }
        self.update_count = Some(updates.iter().sum());
        Ok(updates)
    }

    fn update_count(&self) -> Option<u64> {
        self.update_count
    }

    fn result_set(&mut self) -> Result<Option<Box<dyn ResultSet>>> {
        Ok(self
            .results
            .take()
            .map(|rows| Box::new(rows) as Box<dyn ResultSet>))
    }

    fn generated_keys(&mut self) -> Result<Box<dyn ResultSet>> {
        let labels: Arc<[String]> = Arc::new(["rowid".to_string()]);
        let rows = self
            .generated
            .iter()
            .map(|id| RowLabeled::new(labels.clone(), Box::new([Value::Int64(Some(*id))])))
            .collect();
        Ok(Box::new(BufferedResultSet::new(labels, rows)))
    }
}

impl Display for SqliteStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:p}", **self.statement)
    }
}
