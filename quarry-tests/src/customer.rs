use quarry::{Column, Database, Query, Result, Table};
use std::sync::{Arc, Mutex};

/// `customer` table of the scenarios.
#[derive(Clone)]
pub struct Customers {
    pub table: Table,
    pub id: Column<i64>,
    pub name: Column<String>,
    pub email: Column<Option<String>>,
    pub balance: Column<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub balance: f64,
}

impl Customers {
    pub fn new() -> Self {
        Self::on(Table::new("customer"))
    }

    pub fn on(table: Table) -> Self {
        Self {
            id: table.column("id"),
            name: table.column("name"),
            email: table.column("email"),
            balance: table.column("balance"),
            table,
        }
    }

    /// Customer of the row the executing query is reading.
    pub fn read(&self) -> Result<Customer> {
        Ok(Customer {
            id: self.id.get()?,
            name: self.name.get()?,
            email: self.email.get()?,
            balance: self.balance.get()?,
        })
    }

    pub fn create(&self, db: &Database) -> Result<()> {
        Query::<()>::new(|q| {
            q.raw("DROP TABLE IF EXISTS customer");
        })
        .execute(db)?;
        Query::<()>::new(|q| {
            q.raw(
                "CREATE TABLE customer (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, email TEXT, balance REAL NOT NULL)",
            );
        })
        .execute(db)?;
        Ok(())
    }

    pub fn clear(&self, db: &Database) -> Result<u64> {
        let table = self.table.clone();
        Ok(Query::<()>::new(|q| {
            q.delete_all(&table);
        })
        .execute(db)?
        .updated_rows())
    }

    /// Insert one customer per name, every customer gets a balance of 10 times its position.
    pub fn insert_many(&self, db: &Database, names: &[&str]) -> Result<Vec<i64>> {
        let names = names.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        let fixture = self.clone();
        let keys = Arc::new(Mutex::new(Vec::new()));
        let collected = keys.clone();
        Query::<()>::new(|q| {
            q.batch(names.into_iter().enumerate(), move |q, (i, name)| {
                q.insert(&fixture.table, |insert| {
                    insert.eq(&fixture.name, name);
                    insert.eq(&fixture.balance, i as f64 * 10.0);
                });
            });
        })
        .named("insert customers")
        .generated_keys(move |row, _| {
            if let Ok(mut keys) = collected.lock() {
                keys.push(row.get_at::<i64>(0)?);
            }
            Ok(())
        })
        .execute(db)?;
        let keys = keys
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default();
        Ok(keys)
    }

    pub fn by_id(&self, id: i64) -> Query<Customer> {
        let fixture = self.clone();
        Query::new(|q| {
            q.select(&self.table);
            q.from(&self.table);
            q.filter(|w| {
                w.eq(&self.id, id);
            });
        })
        .named("customer by id")
        .map(move |_| fixture.read())
    }

    pub fn all(&self) -> Query<Customer> {
        let fixture = self.clone();
        Query::new(|q| {
            q.select(&self.table);
            q.from(&self.table);
            q.raw("ORDER BY id");
        })
        .named("all customers")
        .map(move |_| fixture.read())
    }

    pub fn count(&self, db: &Database) -> Result<i64> {
        Query::new(|q| {
            q.raw("SELECT COUNT(*) FROM customer");
        })
        .named("count customers")
        .map(|row| row.get_at::<i64>(0))
        .single(db)
    }
}

impl Default for Customers {
    fn default() -> Self {
        Self::new()
    }
}
