#[cfg(test)]
mod tests {
    use quarry_sqlite::{SqliteConnection, SqliteDriver};
    use quarry_tests::{execute_tests, init_logs};
    use std::sync::Mutex;

    static MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn sqlite() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().expect("Failed to create the database directory");
        let url = format!("sqlite://{}", dir.path().join("quarry.sqlite").display());
        // Readers and writers on separate connections must not block each other
        SqliteConnection::connect(&url)
            .expect("Could not open the database")
            .execute_script("PRAGMA journal_mode=WAL;")
            .expect("Failed to enable the write-ahead log");
        execute_tests(&SqliteDriver::new().database(url));
    }
}
