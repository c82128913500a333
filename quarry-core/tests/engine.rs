#[cfg(test)]
mod tests {
    use indoc::indoc;
    use quarry_core::{Database, ErrorKind, Query, RowLabeled, Table, Value};
    use quarry_tests::{
        init_logs,
        mock::{Event, Mock},
        silent_logs,
    };
    use std::sync::{Arc, Mutex};

    fn people() -> Mock {
        Mock::new().with_rows(
            &["id", "name"],
            vec![
                vec![Value::Int64(Some(1)), Value::Varchar(Some("Ann".into()))],
                vec![Value::Int64(Some(2)), Value::Varchar(Some("Ben".into()))],
                vec![Value::Int64(Some(3)), Value::Varchar(Some("Cid".into()))],
            ],
        )
    }

    fn names() -> Query<String> {
        let person = Table::new("person");
        let name = person.column::<String>("name");
        let mapped = name.clone();
        Query::new(|q| {
            q.select(&name);
            q.from(&person);
        })
        .named("names")
        .map(move |_| mapped.get())
    }

    #[test]
    fn dml_closes_after_update_count() {
        init_logs();
        let mock = Mock::new();
        let db = mock.database();
        let person = Table::new("person");
        let name = person.column::<String>("name");
        let mut query = Query::<()>::new(|q| {
            q.insert(&person, |i| {
                i.eq(&name, "Ann");
            });
        });
        let result = query.execute(&db).expect("Failed to execute the insert");
        assert_eq!(result.updates, [1]);
        assert!(!result.has_result_set);
        assert!(query.held_connection().is_none());
        assert_eq!(
            mock.events_of(1),
            [
                Event::Prepare("INSERT INTO person (name) VALUES (?)".into()),
                Event::Bind(1, Value::Varchar(Some("Ann".into()))),
                Event::Execute,
                Event::Close,
            ]
        );
        assert_eq!(mock.open_connections(), 0);
    }

    #[test]
    fn rows_close_after_reading() {
        init_logs();
        let mock = people();
        let db = mock.database();
        assert_eq!(
            names().list(&db).expect("Failed to list"),
            ["Ann", "Ben", "Cid"]
        );
        assert_eq!(
            names().first(&db).expect("Failed to query the first"),
            Some("Ann".to_string())
        );
        assert_eq!(names().single(&db).expect("Failed to query one"), "Ann");
        assert_eq!(mock.opened(), 3);
        assert_eq!(mock.open_connections(), 0);
        assert_eq!(
            mock.events_of(2),
            [
                Event::Prepare("SELECT name \nFROM person".into()),
                Event::Execute,
                Event::Close,
            ]
        );
    }

    #[test]
    fn empty_results() {
        init_logs();
        let mock = Mock::new().with_rows(&["name"], Vec::new());
        let db = mock.database();
        assert!(names().list(&db).expect("Failed to list").is_empty());
        assert_eq!(names().first(&db).expect("Failed to query"), None);
        silent_logs! {
            let error = names().single(&db).expect_err("No row to return");
            assert_eq!(ErrorKind::of(&error), Some(&ErrorKind::EmptyResult));
        }
        assert_eq!(mock.open_connections(), 0);
    }

    #[test]
    fn lazy_rows() {
        init_logs();
        let mock = people();
        let db = mock.database();
        let mut query = names();
        {
            let mut rows = query.iter(&db).expect("Failed to iterate");
            assert_eq!(
                rows.next().map(|v| v.expect("Failed to map")),
                Some("Ann".to_string())
            );
            assert_eq!(mock.open_connections(), 1);
        }
        assert_eq!(mock.open_connections(), 0);
        let all = query
            .iter(&db)
            .expect("Failed to iterate again")
            .collect::<Result<Vec<_>, _>>()
            .expect("Failed to map");
        assert_eq!(all, ["Ann", "Ben", "Cid"]);
        assert_eq!(mock.open_connections(), 0);
        assert_eq!(mock.count(&Event::Execute), 2);
    }

    #[test]
    fn rows_from_dml() {
        init_logs();
        let mock = Mock::new();
        let db = mock.database();
        let person = Table::new("person");
        let id = person.column::<i64>("id");
        silent_logs! {
            let error = Query::new(|q| {
                q.delete(&person, |d| {
                    d.eq(&id, 1i64);
                });
            })
            .map(|row: &RowLabeled| row.get_at::<i64>(0))
            .list(&db)
            .expect_err("A delete returns no rows");
            assert_eq!(ErrorKind::of(&error), Some(&ErrorKind::NoResultSet));
        }
        assert_eq!(mock.count(&Event::Execute), 1);
        assert_eq!(mock.open_connections(), 0);
    }

    #[test]
    fn missing_mapper() {
        init_logs();
        let mock = people();
        let db = mock.database();
        silent_logs! {
            let error = Query::<String>::new(|q| {
                q.raw("SELECT name FROM person");
            })
            .list(&db)
            .expect_err("Rows cannot be mapped");
            assert_eq!(ErrorKind::of(&error), Some(&ErrorKind::MissingMapper));
        }
        assert_eq!(mock.opened(), 0);
    }

    #[test]
    fn missing_factory() {
        init_logs();
        silent_logs! {
            let error = Query::<()>::new(|q| {
                q.raw("DELETE FROM person");
            })
            .execute(&Database::new())
            .expect_err("No connection available");
            assert_eq!(
                ErrorKind::of(&error),
                Some(&ErrorKind::MissingConnectionFactory)
            );
        }
    }

    #[test]
    fn failure_closes_and_describes() {
        init_logs();
        let mock = Mock::new().fail_on("person");
        let db = mock.database();
        silent_logs! {
            let error = Query::<()>::new(|q| {
                q.raw(indoc! {"
                    UPDATE person
                    SET name = UPPER(name)"});
            })
            .named("shout")
            .execute(&db)
            .expect_err("The statement must fail");
            let message = format!("{:#}", error);
            assert!(message.contains("Query    : shout"), "{}", message);
            assert!(
                message.contains("SQL      : UPDATE person\n           SET name = UPPER(name)"),
                "{}",
                message
            );
            assert!(message.contains("Scripted failure"), "{}", message);
        }
        assert_eq!(mock.events_of(1).last(), Some(&Event::Close));
        assert_eq!(mock.open_connections(), 0);
    }

    #[test]
    fn autoclose_and_explicit_connection() {
        init_logs();
        let mock = Mock::new();
        let db = mock.database();
        let mut query = Query::<()>::new(|q| {
            q.raw("DELETE FROM person WHERE id = 1");
        })
        .autoclose(false);
        query.execute(&db).expect("Failed to delete");
        assert!(query.held_connection().is_some());
        assert_eq!(mock.open_connections(), 1);
        assert_eq!(query.update_count(), Some(1));

        let handle = mock.handle();
        let mut query = Query::<()>::new(|q| {
            q.raw("DELETE FROM person WHERE id = 2");
        })
        .connection(handle.clone())
        .autoclose(false);
        query.execute(&db).expect("Failed to delete");
        query.execute(&db).expect("Failed to delete again");
        assert!(!handle.is_closed());
        assert_eq!(mock.count(&Event::Execute), 3);
        handle.close().expect("Failed to close");
        handle.close().expect("Closing twice is harmless");
        assert_eq!(mock.count(&Event::Close), 1);
    }

    #[test]
    fn batch() {
        init_logs();
        let mock = Mock::new();
        let db = mock.database();
        let person = Table::new("person");
        let name = person.column::<String>("name");
        let keys = Arc::new(Mutex::new(Vec::new()));
        let collected = keys.clone();
        let (table, column) = (person.clone(), name.clone());
        let result = Query::<()>::new(|q| {
            q.batch(["Ann", "Ben", "Cid"], move |q, value| {
                q.insert(&table, |i| {
                    i.eq(&column, value);
                });
            });
        })
        .generated_keys(move |row, position| {
            collected
                .lock()
                .expect("Keys lock")
                .push((position, row.get_at::<i64>(0)?));
            Ok(())
        })
        .execute(&db)
        .expect("Failed to execute the batch");
        assert_eq!(result.updates, [1, 1, 1]);
        assert_eq!(result.updated_rows(), 3);
        assert_eq!(*keys.lock().expect("Keys lock"), [(0, 1), (1, 2), (2, 3)]);
        let bind = |v: &str| Event::Bind(1, Value::Varchar(Some(v.into())));
        assert_eq!(
            mock.events_of(1),
            [
                Event::SetAutoCommit(false),
                Event::Prepare("INSERT INTO person (name) VALUES (?)".into()),
                bind("Ann"),
                Event::AddBatch,
                bind("Ben"),
                Event::AddBatch,
                bind("Cid"),
                Event::AddBatch,
                Event::ExecuteBatch(3),
                Event::Commit,
                Event::SetAutoCommit(true),
                Event::Close,
            ]
        );
    }

    #[test]
    fn batch_failure_rolls_back() {
        init_logs();
        let mock = Mock::new().fail_on("INSERT");
        let db = mock.database();
        let person = Table::new("person");
        let name = person.column::<String>("name");
        silent_logs! {
            let error = Query::<()>::new(|q| {
                q.batch(vec!["Ann".to_string()], move |q, value| {
                    q.insert(&person, |i| {
                        i.eq(&name, value);
                    });
                });
            })
            .execute(&db)
            .expect_err("The batch must fail");
            assert!(format!("{:#}", error).contains("Scripted failure"));
        }
        let events = mock.events_of(1);
        assert_eq!(
            events[events.len() - 4..],
            [
                Event::ExecuteBatch(1),
                Event::Rollback,
                Event::SetAutoCommit(true),
                Event::Close,
            ]
        );
        assert_eq!(mock.count(&Event::Commit), 0);
    }

    #[test]
    fn empty_batch() {
        init_logs();
        let mock = Mock::new();
        let db = mock.database();
        let person = Table::new("person");
        silent_logs! {
            let error = Query::<()>::new(|q| {
                q.batch(Vec::<String>::new(), move |q, _| {
                    q.delete_all(&person);
                });
            })
            .execute(&db)
            .expect_err("An empty batch cannot run");
            assert_eq!(ErrorKind::of(&error), Some(&ErrorKind::EmptyBatch));
        }
        assert_eq!(mock.opened(), 0);
    }
}
