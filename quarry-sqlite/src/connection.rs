use crate::{CBox, SqliteDriver, SqliteStatement, StatementHandle, error_message_from_ptr};
use libsqlite3_sys::{
    SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_FULLMUTEX, SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI,
    sqlite3, sqlite3_busy_timeout, sqlite3_close, sqlite3_errmsg, sqlite3_exec,
    sqlite3_finalize, sqlite3_get_autocommit, sqlite3_open_v2, sqlite3_prepare_v2,
};
use quarry_core::{
    Connection, Context, Error, GeneratedKeys, Result, Statement, truncate_long,
};
use std::{
    ffi::{CStr, CString, c_int},
    ptr,
    sync::Arc,
};

/// Milliseconds a statement waits for a lock held by another connection.
pub const BUSY_TIMEOUT: c_int = 1000;

/// Connection to a SQLite database.
///
/// Auto-commit is emulated with explicit transactions: turning it off opens one with
/// `BEGIN`, and every commit or rollback opens the next. Prepared statements share the
/// database handle, it is released once the connection is closed and the last of them
/// is finalized.
pub struct SqliteConnection {
    pub(crate) connection: Arc<CBox<*mut sqlite3>>,
    auto_commit: bool,
}

impl SqliteConnection {
    /// Open the database at `url`: `sqlite://<path>[?<uri parameters>]`, for example
    /// `sqlite://data.sqlite?mode=rwc` or `sqlite://:memory:`.
    pub fn connect(url: &str) -> Result<SqliteConnection> {
        let prefix = format!("{}://", SqliteDriver::NAME);
        if !url.starts_with(&prefix) {
            let error = Error::msg(format!(
                "Expected sqlite connection url to start with `{}`",
                &prefix
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        let context = || format!("Error while decoding connection URL: `{}`", url);
        let uri = CString::new(format!("file:{}", url.trim_start_matches(&prefix)))
            .with_context(context)?;
        let mut connection = CBox::new(ptr::null_mut(), |p| unsafe {
            sqlite3_close(p);
        });
        unsafe {
            let rc = sqlite3_open_v2(
                uri.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE | SQLITE_OPEN_URI | SQLITE_OPEN_FULLMUTEX,
                ptr::null(),
            );
            if rc != SQLITE_OK {
                let message = if connection.is_null() {
                    "Out of memory".to_string()
                } else {
                    error_message_from_ptr(&sqlite3_errmsg(*connection)).to_string()
                };
                let error = Error::msg(message).context(format!("Cannot open `{}`", url));
                log::error!("{:#}", error);
                return Err(error);
            }
            sqlite3_busy_timeout(*connection, BUSY_TIMEOUT);
        }
        log::debug!("Connected to {}", url);
        Ok(Self {
            connection: Arc::new(connection),
            auto_commit: true,
        })
    }

    /// Run one or more statements without parameters.
    pub fn execute_script(&mut self, sql: &str) -> Result<()> {
        let context = || format!("While executing:\n{}", truncate_long!(sql));
        let sql = CString::new(sql).with_context(context)?;
        unsafe {
            let rc = sqlite3_exec(
                **self.connection,
                sql.as_ptr(),
                None,
                ptr::null_mut(),
                ptr::null_mut(),
            );
            if rc != SQLITE_OK {
                let error = Error::msg(
                    error_message_from_ptr(&sqlite3_errmsg(**self.connection)).to_string(),
                )
                .context(context());
                log::error!("{:#}", error);
                return Err(error);
            }
        }
        Ok(())
    }

    /// Whether a transaction is open on the database handle.
    fn in_transaction(&self) -> bool {
        unsafe { sqlite3_get_autocommit(**self.connection) == 0 }
    }
}

impl Connection for SqliteConnection {
    fn prepare(&mut self, sql: &str, keys: GeneratedKeys) -> Result<Box<dyn Statement>> {
        let context = || format!("While preparing the query:\n{}", truncate_long!(sql));
        let query = CString::new(sql).with_context(context)?;
        let mut statement = CBox::new(ptr::null_mut(), |p| unsafe {
            sqlite3_finalize(p);
        });
        unsafe {
            let mut tail = ptr::null();
            let rc = sqlite3_prepare_v2(
                **self.connection,
                query.as_ptr(),
                -1,
                &mut *statement,
                &mut tail,
            );
            if rc != SQLITE_OK {
                let error = Error::msg(
                    error_message_from_ptr(&sqlite3_errmsg(**self.connection)).to_string(),
                )
                .context(context());
                log::error!("{:#}", error);
                return Err(error);
            }
            if statement.is_null() {
                let error = Error::msg("The query does not contain any statement").context(context());
                log::error!("{:#}", error);
                return Err(error);
            }
            if !tail.is_null() {
                let remaining = CStr::from_ptr(tail).to_string_lossy();
                if remaining.chars().any(|c| !c.is_whitespace() && c != ';') {
                    let error = Error::msg("Cannot prepare more than one statement at a time")
                        .context(context());
                    log::error!("{:#}", error);
                    return Err(error);
                }
            }
        }
        Ok(Box::new(SqliteStatement::new(
            StatementHandle::new(statement, self.connection.clone()),
            sql.to_string(),
            keys,
        )))
    }

    fn auto_commit(&self) -> Result<bool> {
        Ok(self.auto_commit)
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        if auto_commit == self.auto_commit {
            return Ok(());
        }
        if auto_commit {
            if self.in_transaction() {
                self.execute_script("COMMIT")?;
            }
        } else if !self.in_transaction() {
            self.execute_script("BEGIN")?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.auto_commit {
            return Ok(());
        }
        if self.in_transaction() {
            self.execute_script("COMMIT")?;
        }
        self.execute_script("BEGIN")
    }

    fn rollback(&mut self) -> Result<()> {
        if self.auto_commit {
            return Ok(());
        }
        if self.in_transaction() {
            self.execute_script("ROLLBACK")?;
        }
        self.execute_script("BEGIN")
    }

    fn close(&mut self) -> Result<()> {
        if self.connection.is_null() {
            return Ok(());
        }
        if self.in_transaction() {
            if let Err(error) = self.execute_script("ROLLBACK") {
                log::warn!("{:#}", error.context("While closing the connection"));
            }
        }
        // Statements still alive keep the handle open until they are finalized
        self.connection = Arc::new(CBox::new(ptr::null_mut(), |_| {}));
        log::trace!("Connection closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.connection.is_null()
    }
}
