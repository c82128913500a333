use crate::customer::Customers;
use quarry::Database;
use std::sync::{LazyLock, Mutex};

pub fn lazy(db: &Database) {
    static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));
    let _lock = MUTEX.lock();

    // Setup
    let customers = Customers::new();
    customers
        .create(db)
        .expect("Failed to create the customer table");
    let names = (0..50).map(|i| format!("customer {:02}", i)).collect::<Vec<_>>();
    let keys = customers
        .insert_many(db, &names.iter().map(String::as_str).collect::<Vec<_>>())
        .expect("Failed to insert the customers");
    assert_eq!(keys.len(), 50);

    // Read everything one row at a time
    let mut query = customers.all();
    let mut count = 0;
    let mut total = 0.0;
    for customer in query.iter(db).expect("Failed to start the iteration") {
        let customer = customer.expect("Failed to read a customer");
        assert_eq!(customer.name, names[count]);
        total += customer.balance;
        count += 1;
    }
    assert_eq!(count, 50);
    assert_eq!(total, (0..50).map(|i| i as f64 * 10.0).sum::<f64>());

    // Stop early, the rows left are discarded
    let first = query
        .iter(db)
        .expect("Failed to restart the iteration")
        .take(3)
        .map(|v| v.map(|v| v.name))
        .collect::<Result<Vec<_>, _>>()
        .expect("Failed to read the first customers");
    assert_eq!(first, ["customer 00", "customer 01", "customer 02"]);
    assert_eq!(customers.count(db).expect("Failed to count"), 50);
}
