use crate::customer::{Customer, Customers};
use quarry::{Database, ErrorKind, Query};
use std::sync::{LazyLock, Mutex};

pub fn simple(db: &Database) {
    static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));
    let _lock = MUTEX.lock();

    // Setup
    let customers = Customers::new();
    customers
        .create(db)
        .expect("Failed to create the customer table");
    let keys = customers
        .insert_many(db, &["Alice", "Bob", "Carol"])
        .expect("Failed to insert the customers");
    assert_eq!(keys.len(), 3);
    assert!(keys.windows(2).all(|v| v[0] < v[1]));

    // Single
    let bob = customers
        .by_id(keys[1])
        .single(db)
        .expect("Failed to query Bob");
    assert_eq!(
        bob,
        Customer {
            id: keys[1],
            name: "Bob".into(),
            email: None,
            balance: 10.0,
        }
    );
    let error = customers
        .by_id(-1)
        .single(db)
        .expect_err("A missing customer must not be found");
    assert_eq!(ErrorKind::of(&error), Some(&ErrorKind::EmptyResult));

    // First
    let missing = customers
        .by_id(-1)
        .first(db)
        .expect("Failed to query a missing customer");
    assert_eq!(missing, None);
    let alice = customers
        .by_id(keys[0])
        .first(db)
        .expect("Failed to query Alice")
        .expect("Alice must be found");
    assert_eq!(alice.name, "Alice");
    assert_eq!(alice.balance, 0.0);

    // Update
    let result = Query::<()>::new(|q| {
        q.update(&customers.table, |set| {
            set.eq(&customers.email, "bob@example.com");
            set.eq(&customers.balance, 15.5);
        });
        q.filter(|w| {
            w.eq(&customers.id, keys[1]);
        });
    })
    .named("update Bob")
    .execute(db)
    .expect("Failed to update Bob");
    assert_eq!(result.updated_rows(), 1);
    assert!(!result.has_result_set);
    let bob = customers
        .by_id(keys[1])
        .single(db)
        .expect("Failed to query the updated Bob");
    assert_eq!(bob.email.as_deref(), Some("bob@example.com"));
    assert_eq!(bob.balance, 15.5);

    // Insert with generated key
    let mut generated = None;
    {
        let key = std::sync::Arc::new(Mutex::new(None));
        let collected = key.clone();
        Query::<()>::new(|q| {
            q.insert(&customers.table, |i| {
                i.eq(&customers.name, "Dave");
                i.eq(&customers.email, Some("dave@example.com".to_string()));
                i.eq(&customers.balance, 99.25);
            });
        })
        .generated_keys(move |row, position| {
            assert_eq!(position, 0);
            if let Ok(mut key) = collected.lock() {
                *key = Some(row.get_at::<i64>(0)?);
            }
            Ok(())
        })
        .execute(db)
        .expect("Failed to insert Dave");
        if let Ok(key) = key.lock() {
            generated = *key;
        }
    }
    let dave_id = generated.expect("Dave must have a generated key");
    assert!(dave_id > keys[2]);
    let dave = customers
        .by_id(dave_id)
        .single(db)
        .expect("Failed to query Dave");
    assert_eq!(dave.email.as_deref(), Some("dave@example.com"));

    // List
    let all = customers.all().list(db).expect("Failed to list the customers");
    assert_eq!(
        all.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
        ["Alice", "Bob", "Carol", "Dave"]
    );
    let rich = Query::new(|q| {
        q.select(&customers.name);
        q.from(&customers.table);
        q.filter(|w| {
            w.gte(&customers.balance, 15.5);
        });
        q.raw("ORDER BY name");
    })
    .map({
        let name = customers.name.clone();
        move |_| name.get()
    })
    .list(db)
    .expect("Failed to list the rich customers");
    assert_eq!(rich, ["Bob", "Carol", "Dave"]);

    // Rows from a statement without a result set
    let error = Query::new(|q| {
        q.delete(&customers.table, |d| {
            d.eq(&customers.id, -1);
        });
    })
    .map(|row| row.get_at::<i64>(0))
    .first(db)
    .expect_err("A DELETE has no rows");
    assert_eq!(ErrorKind::of(&error), Some(&ErrorKind::NoResultSet));

    // Delete
    let mut query = Query::<()>::new(|q| {
        q.delete(&customers.table, |d| {
            d.eq(&customers.name, "Alice");
            d.or(|or| {
                or.eq(&customers.name, "Carol");
            });
        });
    });
    assert_eq!(
        query.render().expect("Failed to render the delete"),
        "DELETE FROM customer \nWHERE name = ? OR name = ?"
    );
    let result = query
        .execute(db)
        .expect("Failed to delete Alice and Carol");
    assert_eq!(result.updated_rows(), 2);
    assert_eq!(customers.count(db).expect("Failed to count"), 2);
    assert_eq!(customers.clear(db).expect("Failed to clear"), 2);
    assert!(
        customers
            .all()
            .list(db)
            .expect("Failed to list the empty table")
            .is_empty()
    );
}
