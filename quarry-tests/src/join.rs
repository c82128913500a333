use crate::customer::Customers;
use quarry::{Column, Database, Query, Table};
use std::sync::{LazyLock, Mutex};

#[derive(Clone)]
struct Purchases {
    table: Table,
    id: Column<i64>,
    customer_id: Column<i64>,
    total: Column<Option<f64>>,
}

impl Purchases {
    fn new() -> Self {
        let table = Table::new("purchase");
        Self {
            id: table.column("id"),
            customer_id: table.column("customer_id"),
            total: table.column("total"),
            table,
        }
    }
}

pub fn join(db: &Database) {
    static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));
    let _lock = MUTEX.lock();

    // Setup
    let customers = Customers::new();
    let purchases = Purchases::new();
    customers
        .create(db)
        .expect("Failed to create the customer table");
    Query::<()>::new(|q| {
        q.raw("DROP TABLE IF EXISTS purchase");
    })
    .execute(db)
    .expect("Failed to drop the purchase table");
    Query::<()>::new(|q| {
        q.raw("CREATE TABLE purchase (id INTEGER PRIMARY KEY, customer_id INTEGER NOT NULL, total REAL)");
    })
    .execute(db)
    .expect("Failed to create the purchase table");
    let keys = customers
        .insert_many(db, &["Alice", "Bob", "Carol"])
        .expect("Failed to insert the customers");
    let rows = vec![(1, keys[0], 12.5), (2, keys[0], 7.25), (3, keys[2], 30.0)];
    let fixture = purchases.clone();
    Query::<()>::new(|q| {
        q.batch(rows, move |q, (id, customer, total)| {
            q.insert(&fixture.table, |i| {
                i.eq(&fixture.id, id as i64);
                i.eq(&fixture.customer_id, customer);
                i.eq(&fixture.total, total);
            });
        });
    })
    .execute(db)
    .expect("Failed to insert the purchases");

    // Inner join, the columns of both tables are read through their aliases
    let mut query = Query::new(|q| {
        q.select((&customers.name, &purchases.total));
        q.from(&customers.table);
        q.inner_join(&purchases.table, |on| {
            on.eq(&purchases.customer_id, &customers.id);
        });
        q.raw("ORDER BY purchase.id");
    })
    .map({
        let name = customers.name.clone();
        let total = purchases.total.clone();
        move |_| Ok((name.get()?, total.get()?))
    });
    assert_eq!(
        query.render().expect("Failed to render the join"),
        "SELECT customer.name customer_name, purchase.total purchase_total \nFROM customer \nINNER JOIN purchase ON purchase.customer_id = customer.id ORDER BY purchase.id"
    );
    let joined = query.list(db).expect("Failed to query the join");
    assert_eq!(
        joined,
        [
            ("Alice".to_string(), Some(12.5)),
            ("Alice".to_string(), Some(7.25)),
            ("Carol".to_string(), Some(30.0)),
        ]
    );

    // Left join keeps the customers without purchases
    let lonely = Query::new(|q| {
        q.select(&customers.name);
        q.from(&customers.table);
        q.left_join(&purchases.table, |on| {
            on.eq(&purchases.customer_id, &customers.id);
        });
        q.filter(|w| {
            w.raw("purchase.id IS NULL");
        });
    })
    .map({
        let name = customers.name.clone();
        move |_| name.get()
    })
    .list(db)
    .expect("Failed to query the left join");
    assert_eq!(lonely, ["Bob"]);

    // Aggregation over the join
    let totals = Query::new(|q| {
        q.select(&customers.name);
        q.raw(", SUM(purchase.total) spent");
        q.from(&customers.table);
        q.join(&purchases.table, |on| {
            on.eq(&purchases.customer_id, &customers.id);
        });
        q.group_by("customer.name");
        q.having(|h| {
            h.gt("SUM(purchase.total)", 15.0);
        });
        q.raw("ORDER BY customer.name");
    })
    .map({
        let name = customers.name.clone();
        move |row| Ok((name.get()?, row.get::<f64>("spent")?))
    })
    .list(db)
    .expect("Failed to query the totals");
    assert_eq!(
        totals,
        [("Alice".to_string(), 19.75), ("Carol".to_string(), 30.0)]
    );

    // The aliases of the joins don't reach the single table statements
    customers
        .insert_many(db, &["Dave"])
        .expect("Failed to insert after the joins");
    let names = customers
        .all()
        .list(db)
        .expect("Failed to list the customers")
        .into_iter()
        .map(|v| v.name)
        .collect::<Vec<_>>();
    assert_eq!(names, ["Alice", "Bob", "Carol", "Dave"]);
}
