use crate::{
    StatementHandle, error_message_from_ptr,
    extract::{extract_name, extract_value},
};
use libsqlite3_sys::{
    SQLITE_DONE, SQLITE_ROW, sqlite3_column_count, sqlite3_db_handle, sqlite3_errmsg,
    sqlite3_step,
};
use quarry_core::{Error, Result, ResultSet, RowLabeled, RowNames};
use std::sync::Arc;

/// Rows of a statement, stepped one at a time.
///
/// The first row is read when the statement executes so that errors surface there.
pub struct SqliteRows {
    statement: Arc<StatementHandle>,
    labels: RowNames,
    pending: Option<RowLabeled>,
    done: bool,
}

impl SqliteRows {
    pub(crate) fn new(statement: Arc<StatementHandle>) -> Result<Self> {
        let labels = unsafe {
            let count = sqlite3_column_count(**statement);
            (0..count)
                .map(|i| extract_name(**statement, i))
                .collect::<Result<RowNames>>()?
        };
        let mut result = Self {
            statement,
            labels,
            pending: None,
            done: false,
        };
        result.pending = result.step()?;
        Ok(result)
    }

    fn step(&mut self) -> Result<Option<RowLabeled>> {
        if self.done {
            return Ok(None);
        }
        unsafe {
            let statement = **self.statement;
            match sqlite3_step(statement) {
                SQLITE_ROW => {
                    let values = (0..self.labels.len() as i32)
                        .map(|i| extract_value(statement, i))
                        .collect::<Result<_>>()?;
                    Ok(Some(RowLabeled::new(self.labels.clone(), values)))
                }
                SQLITE_DONE => {
                    self.done = true;
                    Ok(None)
                }
                _ => {
                    self.done = true;
                    let error = Error::msg(
                        error_message_from_ptr(&sqlite3_errmsg(sqlite3_db_handle(statement)))
                            .to_string(),
                    );
                    log::error!("{:#}", error);
                    Err(error)
                }
            }
        }
    }
}

impl ResultSet for SqliteRows {
    fn labels(&self) -> RowNames {
        self.labels.clone()
    }

    fn next_row(&mut self) -> Result<Option<RowLabeled>> {
        if let Some(row) = self.pending.take() {
            return Ok(Some(row));
        }
        self.step()
    }
}
