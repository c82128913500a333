use crate::customer::Customers;
use quarry::{
    Database, Error, ErrorKind, Propagation, Query, Result, is_transaction_active, transaction,
};
use std::sync::{LazyLock, Mutex};

fn insert(db: &Database, customers: &Customers, name: &str) -> Result<()> {
    Query::<()>::new(|q| {
        q.insert(&customers.table, |i| {
            i.eq(&customers.name, name);
            i.eq(&customers.balance, 0.0);
        });
    })
    .named("insert customer")
    .execute(db)?;
    Ok(())
}

/// Scenarios opening a second connection while the first one is in a transaction, the
/// database must allow a reader and a writer at the same time.
pub fn transaction1(db: &Database) {
    static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));
    let _lock = MUTEX.lock();

    // Setup
    let customers = Customers::new();
    customers
        .create(db)
        .expect("Failed to create the customer table");
    customers
        .insert_many(db, &["Alice", "Bob"])
        .expect("Failed to insert the customers");

    // Commit
    let result = transaction(Propagation::Required, || {
        assert!(is_transaction_active());
        insert(db, &customers, "Carol")?;
        insert(db, &customers, "Dave")?;
        customers.count(db)
    })
    .expect("The transaction must commit");
    assert_eq!(result, 4);
    assert!(!is_transaction_active());
    assert_eq!(customers.count(db).expect("Failed to count"), 4);

    // Rollback on error
    let error = transaction(Propagation::Required, || {
        insert(db, &customers, "Eve")?;
        assert_eq!(customers.count(db)?, 5);
        Err::<(), _>(Error::msg("Changed my mind"))
    })
    .expect_err("The transaction must fail");
    assert_eq!(error.to_string(), "Changed my mind");
    assert_eq!(customers.count(db).expect("Failed to count"), 4);

    // Nested required blocks share the outer transaction
    transaction(Propagation::Required, || {
        insert(db, &customers, "Frank")?;
        transaction(Propagation::Required, || insert(db, &customers, "Grace"))?;
        Err::<(), _>(Error::msg("Undo both"))
    })
    .expect_err("The outer transaction must fail");
    assert_eq!(customers.count(db).expect("Failed to count"), 4);

    // A failing participant marks the transaction rollback-only
    let error = transaction(Propagation::Required, || {
        insert(db, &customers, "Heidi")?;
        let inner = transaction(Propagation::Required, || {
            insert(db, &customers, "Ivan")?;
            Err::<(), _>(Error::msg("Inner failure"))
        });
        assert!(inner.is_err());
        Ok(())
    })
    .expect_err("A rollback-only transaction must not commit");
    assert!(matches!(
        ErrorKind::of(&error),
        Some(ErrorKind::TransactionRolledBack(..))
    ));
    assert_eq!(customers.count(db).expect("Failed to count"), 4);

    // Requires new does not see the uncommitted changes of the outer transaction
    transaction(Propagation::Required, || {
        insert(db, &customers, "Judy")?;
        assert_eq!(customers.count(db)?, 5);
        let inner = transaction(Propagation::RequiresNew, || customers.count(db))?;
        assert_eq!(inner, 4);
        Err::<(), _>(Error::msg("Drop Judy"))
    })
    .expect_err("The outer transaction must fail");
    assert_eq!(customers.count(db).expect("Failed to count"), 4);

    // Requires new commits independently of the outer transaction
    transaction(Propagation::Required, || {
        assert_eq!(customers.count(db)?, 4);
        transaction(Propagation::RequiresNew, || {
            insert(db, &customers, "Mallory")
        })?;
        Err::<(), _>(Error::msg("Keep Mallory"))
    })
    .expect_err("The outer transaction must fail");
    assert_eq!(customers.count(db).expect("Failed to count"), 5);
    assert!(!is_transaction_active());
}
