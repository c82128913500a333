#[cfg(test)]
mod tests {
    use quarry_core::{
        Database, Error, ErrorKind, Propagation, Query, Result, Table, Value,
        active_transaction, is_transaction_active, transaction, transaction_with,
    };
    use quarry_tests::{
        init_logs,
        mock::{Event, Mock},
        silent_logs,
    };
    use std::{panic, thread};

    fn insert(db: &Database, name: &str) -> Result<()> {
        let person = Table::new("person");
        let column = person.column::<String>("name");
        Query::<()>::new(|q| {
            q.insert(&person, |i| {
                i.eq(&column, name);
            });
        })
        .execute(db)?;
        Ok(())
    }

    fn prepared(name: &str) -> [Event; 3] {
        [
            Event::Prepare("INSERT INTO person (name) VALUES (?)".into()),
            Event::Bind(1, Value::Varchar(Some(name.into()))),
            Event::Execute,
        ]
    }

    #[test]
    fn commit_on_success() {
        init_logs();
        let mock = Mock::new();
        let db = mock.database();
        let id = transaction(Propagation::Required, || {
            let id = active_transaction();
            assert!(id.is_some());
            insert(&db, "Ann")?;
            insert(&db, "Ben")?;
            Ok(id)
        })
        .expect("The transaction must commit");
        assert!(id.is_some());
        assert!(!is_transaction_active());
        assert_eq!(mock.opened(), 1);
        let mut expected = vec![Event::SetAutoCommit(false)];
        expected.extend(prepared("Ann"));
        expected.extend(prepared("Ben"));
        expected.extend([Event::Commit, Event::Close]);
        assert_eq!(mock.events_of(1), expected);
    }

    #[test]
    fn rollback_on_error() {
        init_logs();
        let mock = Mock::new();
        let db = mock.database();
        let error = transaction(Propagation::Required, || {
            insert(&db, "Ann")?;
            Err::<(), _>(Error::msg("Abort"))
        })
        .expect_err("The transaction must fail");
        assert_eq!(error.to_string(), "Abort");
        assert_eq!(mock.count(&Event::Rollback), 1);
        assert_eq!(mock.count(&Event::Commit), 0);
        assert_eq!(mock.events_of(1).last(), Some(&Event::Close));
    }

    #[test]
    fn failed_query_rolls_back() {
        init_logs();
        let mock = Mock::new().fail_on("INSERT");
        let db = mock.database();
        silent_logs! {
            transaction(Propagation::Required, || insert(&db, "Ann"))
                .expect_err("The insert must fail");
        }
        let events = mock.events_of(1);
        assert_eq!(events[events.len() - 2..], [Event::Rollback, Event::Close]);
        assert_eq!(mock.count(&Event::Close), 1);
    }

    #[test]
    fn empty_transaction() {
        init_logs();
        let mock = Mock::new();
        transaction(Propagation::Required, || Ok(()))
            .expect("An empty transaction commits");
        assert_eq!(mock.opened(), 0);
        assert!(!is_transaction_active());
    }

    #[test]
    fn nested_required_shares_the_connection() {
        init_logs();
        let mock = Mock::new();
        let db = mock.database();
        transaction(Propagation::Required, || {
            let outer = active_transaction();
            insert(&db, "Ann")?;
            transaction(Propagation::Required, || {
                assert_eq!(active_transaction(), outer);
                insert(&db, "Ben")
            })?;
            transaction(Propagation::Required, || insert(&db, "Cid"))
        })
        .expect("The transaction must commit");
        assert_eq!(mock.opened(), 1);
        assert_eq!(mock.count(&Event::Commit), 1);
        assert_eq!(mock.count(&Event::Close), 1);
        assert_eq!(mock.count(&Event::Execute), 3);
    }

    #[test]
    fn failing_participant_marks_rollback_only() {
        init_logs();
        let mock = Mock::new();
        let db = mock.database();
        let mut outer_id = None;
        silent_logs! {
            let error = transaction(Propagation::Required, || {
                outer_id = active_transaction();
                insert(&db, "Ann")?;
                let inner = transaction(Propagation::Required, || {
                    insert(&db, "Ben")?;
                    Err::<(), _>(Error::msg("Inner failure"))
                });
                assert!(inner.is_err());
                insert(&db, "Cid")
            })
            .expect_err("The transaction is rollback-only");
            let id = outer_id.expect("Transaction id");
            assert_eq!(
                ErrorKind::of(&error),
                Some(&ErrorKind::TransactionRolledBack(id))
            );
        }
        assert_eq!(mock.count(&Event::Commit), 0);
        assert_eq!(mock.count(&Event::Rollback), 1);
        assert!(!is_transaction_active());
    }

    #[test]
    fn requires_new_is_independent() {
        init_logs();
        let mock = Mock::new();
        let db = mock.database();
        transaction(Propagation::Required, || {
            let outer = active_transaction();
            insert(&db, "Ann")?;
            transaction(Propagation::RequiresNew, || {
                assert_ne!(active_transaction(), outer);
                insert(&db, "Ben")
            })?;
            assert_eq!(active_transaction(), outer);
            insert(&db, "Cid")?;
            Err::<(), _>(Error::msg("Undo the outer"))
        })
        .expect_err("The outer transaction must fail");
        assert_eq!(mock.opened(), 2);
        let mut outer = vec![Event::SetAutoCommit(false)];
        outer.extend(prepared("Ann"));
        outer.extend(prepared("Cid"));
        outer.extend([Event::Rollback, Event::Close]);
        assert_eq!(mock.events_of(1), outer);
        let mut inner = vec![Event::SetAutoCommit(false)];
        inner.extend(prepared("Ben"));
        inner.extend([Event::Commit, Event::Close]);
        assert_eq!(mock.events_of(2), inner);
    }

    #[test]
    fn requires_new_failure_leaves_outer_alone() {
        init_logs();
        let mock = Mock::new();
        let db = mock.database();
        transaction(Propagation::Required, || {
            insert(&db, "Ann")?;
            let inner = transaction(Propagation::RequiresNew, || {
                insert(&db, "Ben")?;
                Err::<(), _>(Error::msg("Inner failure"))
            });
            assert!(inner.is_err());
            Ok(())
        })
        .expect("The outer transaction must commit");
        assert_eq!(mock.events_of(1).iter().rev().nth(1), Some(&Event::Commit));
        assert_eq!(mock.events_of(2).iter().rev().nth(1), Some(&Event::Rollback));
    }

    #[test]
    fn explicit_connection() {
        init_logs();
        let mock = Mock::new();
        let db = Database::new();
        let handle = mock.handle();
        transaction_with(handle.clone(), Propagation::Required, || {
            insert(&db, "Ann")?;
            insert(&db, "Ben")
        })
        .expect("The transaction must commit");
        assert_eq!(mock.opened(), 1);
        assert!(handle.is_closed());
        let mut expected = vec![Event::SetAutoCommit(false)];
        expected.extend(prepared("Ann"));
        expected.extend(prepared("Ben"));
        expected.extend([Event::Commit, Event::Close]);
        assert_eq!(mock.events_of(1), expected);
    }

    #[test]
    fn batch_inside_transaction() {
        init_logs();
        let mock = Mock::new();
        let db = mock.database();
        let person = Table::new("person");
        let name = person.column::<String>("name");
        transaction(Propagation::Required, || {
            Query::<()>::new(|q| {
                q.batch(["Ann", "Ben"], move |q, value| {
                    q.insert(&person, |i| {
                        i.eq(&name, value);
                    });
                });
            })
            .execute(&db)?;
            insert(&db, "Cid")
        })
        .expect("The transaction must commit");
        let events = mock.events_of(1);
        assert_eq!(mock.count(&Event::Commit), 1);
        assert_eq!(events.last(), Some(&Event::Close));
        assert!(!events.contains(&Event::SetAutoCommit(true)));
        let batch = events
            .iter()
            .position(|v| *v == Event::ExecuteBatch(2))
            .expect("The batch was executed");
        let commit = events
            .iter()
            .position(|v| *v == Event::Commit)
            .expect("The transaction committed");
        assert!(batch < commit);
        assert_eq!(events[commit - 1], Event::Execute);
    }

    #[test]
    fn panic_rolls_back() {
        init_logs();
        let mock = Mock::new();
        let db = mock.database();
        silent_logs! {
            let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                let _ = transaction(Propagation::Required, || -> Result<()> {
                    insert(&db, "Ann")?;
                    panic!("Boom")
                });
            }));
            assert!(result.is_err());
        }
        assert!(!is_transaction_active());
        assert_eq!(mock.count(&Event::Rollback), 1);
        assert_eq!(mock.count(&Event::Close), 1);
    }

    #[test]
    fn transactions_are_per_thread() {
        init_logs();
        let mock = Mock::new();
        let db = mock.database();
        transaction(Propagation::Required, || {
            insert(&db, "Ann")?;
            let other = db.clone();
            thread::spawn(move || {
                assert!(!is_transaction_active());
                insert(&other, "Ben").expect("Failed to insert from the other thread");
            })
            .join()
            .map_err(|_| Error::msg("The other thread panicked"))?;
            Ok(())
        })
        .expect("The transaction must commit");
        assert_eq!(mock.opened(), 2);
        let mut other = prepared("Ben").to_vec();
        other.push(Event::Close);
        assert_eq!(mock.events_of(2), other);
        assert_eq!(mock.events_of(1).iter().rev().nth(1), Some(&Event::Commit));
    }
}
