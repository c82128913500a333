#[cfg(test)]
mod tests {
    use quarry_core::{
        Connection, ConnectionHandle, ErrorKind, GeneratedKeys, Query, ResultSet, SqlType,
        Statement, Table, Value,
    };
    use quarry_sqlite::{SqliteConnection, SqliteDriver};
    use quarry_tests::{init_logs, silent_logs};
    use std::sync::Mutex;

    static MUTEX: Mutex<()> = Mutex::new(());

    fn memory() -> SqliteConnection {
        SqliteConnection::connect("sqlite://:memory:").expect("Could not open the database")
    }

    fn count(connection: &mut SqliteConnection) -> i64 {
        let mut statement = connection
            .prepare("SELECT COUNT(*) FROM item", GeneratedKeys::None)
            .expect("Failed to prepare the count");
        assert!(statement.execute().expect("Failed to count"));
        let mut rows = statement
            .result_set()
            .expect("Failed to read the result set")
            .expect("A SELECT has a result set");
        let row = rows
            .next_row()
            .expect("Failed to read the row")
            .expect("COUNT returns one row");
        row.get_at::<i64>(0).expect("Count is an integer")
    }

    #[test]
    fn create_database() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().expect("Failed to create the database directory");
        let path = dir.path().join("creation.sqlite");
        assert!(!path.exists(), "Database file should not exist before test");
        SqliteConnection::connect(&format!("sqlite://{}?mode=rwc", path.display()))
            .expect("Could not open the database");
        assert!(
            path.exists(),
            "Database file should be created after connection"
        );
        SqliteConnection::connect(&format!("sqlite://{}?mode=ro", path.display()))
            .expect("Could not open the database");
        std::fs::remove_file(&path).expect("Failed to remove the database file");
        silent_logs! {
            assert!(
                SqliteConnection::connect(&format!("sqlite://{}?mode=ro", path.display()))
                    .is_err(),
                "Should not be able to open in read only unexisting database"
            );
        }
    }

    #[test]
    fn wrong_url() {
        silent_logs! {
            assert!(SqliteConnection::connect("postgres://some_value").is_err());
        }
    }

    #[test]
    fn prepare() {
        init_logs();
        let mut connection = memory();
        assert!(
            connection
                .prepare("SELECT 1;  \n", GeneratedKeys::None)
                .is_ok()
        );
        silent_logs! {
            assert!(
                connection
                    .prepare("SELECT 1; SELECT 2", GeneratedKeys::None)
                    .is_err()
            );
            assert!(connection.prepare("  ", GeneratedKeys::None).is_err());
            assert!(connection.prepare("SELEC 1", GeneratedKeys::None).is_err());
        }
    }

    #[test]
    fn statements() {
        init_logs();
        let mut connection = memory();
        connection
            .execute_script("CREATE TABLE item (id INTEGER PRIMARY KEY, name TEXT, price REAL);")
            .expect("Failed to create the table");
        let mut insert = connection
            .prepare(
                "INSERT INTO item (name, price) VALUES (?, ?)",
                GeneratedKeys::Return,
            )
            .expect("Failed to prepare the insert");
        silent_logs! {
            assert!(insert.bind(3, Value::Int32(Some(1))).is_err());
            assert!(insert.execute().is_err(), "Parameter 1 is not bound");
        }
        for (name, price) in [("pen", 1.5), ("ink", 7.25)] {
            insert.clear_bindings().expect("Failed to clear");
            insert
                .bind(1, Value::Varchar(Some(name.into())))
                .expect("Failed to bind the name");
            insert
                .bind(2, Value::Float64(Some(price)))
                .expect("Failed to bind the price");
            insert.add_batch().expect("Failed to add to the batch");
        }
        assert_eq!(insert.execute_batch().expect("Failed to run the batch"), [1, 1]);
        let mut keys = insert.generated_keys().expect("Failed to read the keys");
        assert_eq!(keys.labels().as_ref(), ["rowid".to_string()]);
        let mut ids = Vec::new();
        while let Some(row) = keys.next_row().expect("Failed to read a key") {
            ids.push(row.get_at::<i64>(0).expect("Key is an integer"));
        }
        assert_eq!(ids, [1, 2]);

        insert
            .bind(1, Value::Varchar(None))
            .expect("Failed to bind the name");
        insert
            .bind_typed(2, Value::Int32(Some(3)), SqlType::Double)
            .expect("Failed to bind the price");
        assert!(!insert.execute().expect("Failed to insert"));
        assert_eq!(insert.update_count(), Some(1));
        drop(insert);
        assert_eq!(count(&mut connection), 3);

        let mut select = connection
            .prepare(
                "SELECT name, price FROM item WHERE price > ? ORDER BY id",
                GeneratedKeys::None,
            )
            .expect("Failed to prepare the select");
        select
            .bind_null(1, SqlType::Double)
            .expect("Failed to bind NULL");
        assert!(select.execute().expect("Failed to select"));
        let mut rows = select
            .result_set()
            .expect("Failed to read the result set")
            .expect("A SELECT has a result set");
        assert_eq!(rows.labels().as_ref(), ["name".to_string(), "price".to_string()]);
        assert!(rows.next_row().expect("Failed to read").is_none());
        drop(rows);
        select
            .bind(1, Value::Float64(Some(2.0)))
            .expect("Failed to bind the price");
        assert!(select.execute().expect("Failed to select"));
        let mut rows = select
            .result_set()
            .expect("Failed to read the result set")
            .expect("A SELECT has a result set");
        let first = rows
            .next_row()
            .expect("Failed to read")
            .expect("One row expected");
        assert_eq!(first.get::<String>("name").expect("name"), "ink");
        let second = rows
            .next_row()
            .expect("Failed to read")
            .expect("Two rows expected");
        assert_eq!(second.get::<Option<String>>("name").expect("name"), None);
        assert_eq!(second.get::<f64>("price").expect("price"), 3.0);
        assert!(rows.next_row().expect("Failed to read").is_none());
    }

    #[test]
    fn auto_commit() {
        init_logs();
        let mut connection = memory();
        connection
            .execute_script("CREATE TABLE item (id INTEGER PRIMARY KEY);")
            .expect("Failed to create the table");
        assert!(connection.auto_commit().expect("Auto-commit"));
        connection
            .set_auto_commit(false)
            .expect("Failed to disable auto-commit");
        assert!(!connection.auto_commit().expect("Auto-commit"));
        connection
            .execute_script("INSERT INTO item (id) VALUES (1);")
            .expect("Failed to insert");
        connection.rollback().expect("Failed to roll back");
        assert_eq!(count(&mut connection), 0);
        connection
            .execute_script("INSERT INTO item (id) VALUES (2);")
            .expect("Failed to insert");
        connection.commit().expect("Failed to commit");
        connection
            .execute_script("INSERT INTO item (id) VALUES (3);")
            .expect("Failed to insert");
        connection
            .set_auto_commit(true)
            .expect("Failed to enable auto-commit");
        connection.rollback().expect("Rollback without transaction");
        assert_eq!(count(&mut connection), 2);
        connection.close().expect("Failed to close");
        assert!(connection.is_closed());
    }

    #[test]
    fn statements_outlive_close() {
        init_logs();
        let mut connection = memory();
        connection
            .execute_script(
                "CREATE TABLE item (id INTEGER PRIMARY KEY); INSERT INTO item (id) VALUES (1), (2);",
            )
            .expect("Failed to create the table");
        let mut select = connection
            .prepare("SELECT id FROM item ORDER BY id", GeneratedKeys::None)
            .expect("Failed to prepare the select");
        assert!(select.execute().expect("Failed to select"));
        let mut rows = select
            .result_set()
            .expect("Failed to read the result set")
            .expect("A SELECT has a result set");
        connection.close().expect("Failed to close");
        assert!(connection.is_closed());
        connection.close().expect("Closing twice is fine");
        let first = rows
            .next_row()
            .expect("The statement keeps the database open")
            .expect("One row expected");
        assert_eq!(first.get_at::<i64>(0).expect("Id"), 1);
        drop(rows);
        drop(select);
        assert!(connection.is_closed());
    }

    #[test]
    fn closed_handle() {
        init_logs();
        let handle = ConnectionHandle::new(memory());
        handle.close().expect("Failed to close");
        assert!(handle.is_closed());
        silent_logs! {
            let error = Query::<()>::new(|q| {
                q.raw("SELECT 1");
            })
            .connection(handle.clone())
            .execute(&SqliteDriver::new().database("sqlite://:memory:"))
            .expect_err("The connection is closed");
            assert_eq!(ErrorKind::of(&error), Some(&ErrorKind::ConnectionClosed));
        }
    }

    #[test]
    fn driver_queries() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().expect("Failed to create the database directory");
        let url = format!("sqlite://{}", dir.path().join("driver.sqlite").display());
        let db = SqliteDriver::new().database(url);
        Query::<()>::new(|q| {
            q.raw("CREATE TABLE item (id INTEGER PRIMARY KEY, name TEXT)");
        })
        .execute(&db)
        .expect("Failed to create the table");
        let item = Table::new("item");
        let name = item.column::<String>("name");
        let result = Query::<()>::new(|q| {
            q.insert(&item, |i| {
                i.eq(&name, "pen");
            });
        })
        .execute(&db)
        .expect("Failed to insert");
        assert_eq!(result.updated_rows(), 1);
        let names = Query::new(|q| {
            q.select(&name);
            q.from(&item);
        })
        .map(|row| row.get::<String>("name"))
        .list(&db)
        .expect("Failed to list");
        assert_eq!(names, ["pen"]);
    }
}
