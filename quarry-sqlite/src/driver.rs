use crate::SqliteConnection;
use quarry_core::Database;

/// Entry point of the SQLite driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub const NAME: &'static str = "sqlite";

    pub const fn new() -> Self {
        Self
    }

    /// Database opening a new connection to `url` for every query outside of transactions.
    pub fn database(&self, url: impl Into<String>) -> Database {
        let url = url.into();
        Database::new().with_factory(move |_| SqliteConnection::connect(&url))
    }
}
