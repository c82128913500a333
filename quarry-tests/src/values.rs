use quarry::{
    Column, Database, Error, ErrorKind, Query, Result, SqlType, Statement, Table, Value,
};
use rust_decimal::Decimal;
use std::sync::{LazyLock, Mutex};
use time::{
    Date, PrimitiveDateTime, Time,
    macros::{date, datetime, time},
};
use uuid::Uuid;

/// Amount in cents, bound as a decimal string by its type handler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Money(pub i64);

fn bind_money(statement: &mut dyn Statement, index: usize, value: &Value) -> Result<()> {
    let Value::Custom(custom) = value else {
        return Err(Error::msg(format!("Expected money, found {}", value)));
    };
    let Some(money) = custom.downcast_ref::<Money>() else {
        return Err(Error::msg("Expected money"));
    };
    let text = format!("{}.{:02}", money.0 / 100, money.0 % 100);
    statement.bind(index, Value::Varchar(Some(text)))
}

#[derive(Clone)]
struct Measures {
    table: Table,
    id: Column<i32>,
    flag: Column<bool>,
    amount: Column<Decimal>,
    ratio: Column<f64>,
    label: Column<String>,
    payload: Column<Vec<u8>>,
    day: Column<Date>,
    at: Column<Time>,
    stamp: Column<PrimitiveDateTime>,
    token: Column<Uuid>,
    note: Column<Option<String>>,
}

impl Measures {
    fn new() -> Self {
        let table = Table::new("measure");
        Self {
            id: table.column("id"),
            flag: table.column("flag"),
            amount: table.column("amount"),
            ratio: table.column("ratio"),
            label: table.column("label"),
            payload: table.column("payload"),
            day: table.column("day"),
            at: table.column("at"),
            stamp: table.column("stamp"),
            token: table.column("token"),
            note: table.column("note"),
            table,
        }
    }
}

pub fn values(db: &Database) {
    static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));
    let _lock = MUTEX.lock();

    // Setup
    let db = db.clone().with_type_handler::<Money>(bind_money);
    let db = &db;
    let m = Measures::new();
    Query::<()>::new(|q| {
        q.raw("DROP TABLE IF EXISTS measure");
    })
    .execute(db)
    .expect("Failed to drop the measure table");
    Query::<()>::new(|q| {
        q.raw(
            "CREATE TABLE measure (id INTEGER PRIMARY KEY, flag BOOLEAN, amount DECIMAL, ratio REAL, label TEXT, payload BLOB, day DATE, at TIME, stamp TIMESTAMP, token TEXT, note TEXT)",
        );
    })
    .execute(db)
    .expect("Failed to create the measure table");

    // Every type survives the round trip
    let token = Uuid::parse_str("5e915574-bb30-4430-98cf-c5854f61fbbd").expect("Valid uuid");
    Query::<()>::new(|q| {
        q.insert(&m.table, |i| {
            i.eq(&m.id, 1);
            i.eq(&m.flag, true);
            i.eq(&m.amount, Decimal::new(1250, 2));
            i.eq(&m.ratio, 0.125);
            i.eq(&m.label, Value::custom(Money(1999)));
            i.eq(&m.payload, vec![0xdeu8, 0xad, 0xbe, 0xef]);
            i.eq(&m.day, date!(2024 - 03 - 05));
            i.eq(&m.at, time!(9:30:15.5));
            i.eq(&m.stamp, datetime!(2024-03-05 23:59:58));
            i.eq(&m.token, token);
            i.eq(&m.note, None::<String>);
        });
    })
    .execute(db)
    .expect("Failed to insert the measure");
    let fixture = m.clone();
    let row = Query::new(|q| {
        q.select(&m.table);
        q.from(&m.table);
        q.filter(|w| {
            w.eq(&m.id, 1);
        });
    })
    .map(move |_| {
        Ok((
            fixture.flag.get()?,
            fixture.amount.get()?,
            fixture.ratio.get()?,
            fixture.label.get()?,
            fixture.payload.get()?,
            fixture.day.get()?,
            fixture.at.get()?,
            fixture.stamp.get()?,
            fixture.token.get()?,
            fixture.note.get()?,
        ))
    })
    .single(db)
    .expect("Failed to query the measure");
    assert!(row.0);
    assert_eq!(row.1, Decimal::new(125, 1));
    assert_eq!(row.2, 0.125);
    assert_eq!(row.3, "19.99");
    assert_eq!(row.4, [0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(row.5, date!(2024 - 03 - 05));
    assert_eq!(row.6, time!(9:30:15.5));
    assert_eq!(row.7, datetime!(2024-03-05 23:59:58));
    assert_eq!(row.8, token);
    assert_eq!(row.9, None);

    // Values compared with the registered handler and with a handler of the comparison
    let fixture = m.clone();
    let mut query = Query::new(|q| {
        q.select(&m.id);
        q.from(&m.table);
        q.filter(|w| {
            w.eq(&m.label, Value::custom(Money(1999)));
            w.and(|and| {
                and.eq(&m.note, Value::Null).sql_type(SqlType::Varchar);
                and.or(|or| {
                    or.eq(&m.token, Value::custom(token)).handler(
                        |statement: &mut dyn Statement, index: usize, value: &Value| {
                            let Value::Custom(custom) = value else {
                                return Err(Error::msg("Expected a custom value"));
                            };
                            let text = custom.downcast_ref::<Uuid>().map(Uuid::to_string);
                            statement.bind(index, Value::Varchar(text))
                        },
                    );
                });
            });
        });
    })
    .map(move |_| fixture.id.get());
    assert_eq!(
        query.render().expect("Failed to render the filter"),
        "SELECT id \nFROM measure \nWHERE label = ? AND (note = ? OR token = ?)"
    );
    let found = query.list(db).expect("Failed to filter with custom values");
    assert_eq!(found, [1]);

    // Untyped NULL without a handler
    let error = Query::<()>::new(|q| {
        q.update(&m.table, |set| {
            set.eq(&m.note, Value::Null);
        });
        q.filter(|w| {
            w.eq(&m.id, 1);
        });
    })
    .execute(db)
    .expect_err("An untyped NULL cannot be bound");
    assert_eq!(ErrorKind::of(&error), Some(&ErrorKind::NullParameter(1)));

    // Typed NULL and an enum name
    Query::<()>::new(|q| {
        q.update(&m.table, |set| {
            set.eq(&m.note, Value::Enum(Some("GOLD".into())));
            set.eq(&m.ratio, Value::Float64(None));
        });
        q.filter(|w| {
            w.eq(&m.id, 1);
        });
    })
    .execute(db)
    .expect("Failed to update the measure");
    let fixture = m.clone();
    let (note, ratio) = Query::new(|q| {
        q.select((&m.note, &m.ratio));
        q.from(&m.table);
    })
    .map(move |row| Ok((fixture.note.get()?, row.get::<Option<f64>>("ratio")?)))
    .single(db)
    .expect("Failed to query the updated measure");
    assert_eq!(note.as_deref(), Some("GOLD"));
    assert_eq!(ratio, None);
}
