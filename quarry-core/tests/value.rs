#[cfg(test)]
mod tests {
    use quarry_core::{AsValue, RowLabeled, RowNames, SqlType, Table, Tables, Value};
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use time::macros::{date, datetime, time};
    use uuid::Uuid;

    #[test]
    fn typed_nulls() {
        assert_eq!(i64::as_empty_value(), Value::Int64(None));
        assert_eq!(Option::<String>::None.as_value(), Value::Varchar(None));
        assert!(Value::Date(None).is_null());
        assert!(Value::Null.is_null());
        assert!(!Value::Boolean(Some(false)).is_null());
        assert_eq!(Value::Int32(None).sql_type(), Some(SqlType::Integer));
        assert_eq!(Value::Null.sql_type(), None);
        assert_eq!(Value::Enum(None).type_key(), None);
    }

    #[test]
    fn driver_representations() {
        assert!(bool::try_from_value(Value::Int64(Some(1))).expect("bool from int"));
        assert!(!bool::try_from_value(Value::Varchar(Some("false".into()))).expect("bool"));
        assert!(bool::try_from_value(Value::Varchar(Some("maybe".into()))).is_err());
        assert!(bool::try_from_value(Value::Varchar(Some(" TRUE".into()))).expect("bool"));
        assert_eq!(
            i32::try_from_value(Value::Varchar(Some(" 7 ".into()))).expect("i32 from text"),
            7
        );
        let error = i64::try_from_value(Value::Varchar(Some("seven".into())))
            .expect_err("Not a number");
        assert!(error.to_string().contains("seven"));
        assert_eq!(
            i64::try_from_value(Value::Int32(Some(-3))).expect("i64 from i32"),
            -3
        );
        assert_eq!(
            i32::try_from_value(Value::Int64(Some(-12))).expect("i32 from i64"),
            -12
        );
        assert!(i32::try_from_value(Value::Int64(Some(i64::MAX))).is_err());
        assert_eq!(
            Decimal::try_from_value(Value::Varchar(Some("12.50".into()))).expect("Decimal"),
            Decimal::new(125, 1)
        );
        assert_eq!(
            Decimal::try_from_value(Value::Float64(Some(0.5))).expect("Decimal from float"),
            Decimal::new(5, 1)
        );
        assert_eq!(
            String::try_from_value(Value::Enum(Some("GOLD".into()))).expect("String"),
            "GOLD"
        );
        assert_eq!(
            time::Date::try_from_value(Value::Varchar(Some("2024-02-29".into())))
                .expect("Date"),
            date!(2024 - 02 - 29)
        );
        assert_eq!(
            time::Time::try_from_value(Value::Varchar(Some("23:01:02.25".into())))
                .expect("Time"),
            time!(23:01:02.25)
        );
        assert_eq!(
            time::PrimitiveDateTime::try_from_value(Value::Varchar(Some(
                "2024-02-29T10:00:00".into()
            )))
            .expect("Timestamp"),
            datetime!(2024-02-29 10:00)
        );
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").expect("Valid uuid");
        assert_eq!(
            Uuid::try_from_value(Value::Blob(Some(id.as_bytes().to_vec().into())))
                .expect("Uuid from blob"),
            id
        );
        assert_eq!(
            Option::<i64>::try_from_value(Value::Null).expect("Optional"),
            None
        );
        assert!(f64::try_from_value(Value::Varchar(Some("1.0".into()))).is_err());
    }

    #[test]
    fn custom_values() {
        #[derive(Debug, PartialEq)]
        struct Point(i32, i32);
        let value = Value::custom(Point(1, 2));
        let Value::Custom(custom) = &value else {
            panic!("Expected a custom value");
        };
        assert_eq!(custom.downcast_ref::<Point>(), Some(&Point(1, 2)));
        assert_eq!(custom.downcast_ref::<String>(), None);
        assert!(!value.is_null());
        assert!(value.type_name().ends_with("Point"));
        assert_eq!(value.type_key(), Value::custom_null::<Point>().type_key());
        assert!(Value::custom_null::<Point>().is_null());
        assert_eq!(value.clone(), value);
        assert_ne!(value, Value::custom(Point(1, 2)));
    }

    #[test]
    fn display() {
        assert_eq!(Value::Int32(Some(3)).to_string(), "3");
        assert_eq!(Value::Varchar(None).to_string(), "NULL");
        assert_eq!(Value::Blob(Some([1u8, 2, 3].into())).to_string(), "<3 bytes>");
        assert_eq!(Value::Date(Some(date!(2020 - 01 - 02))).to_string(), "2020-01-02");
    }

    #[test]
    fn row_lookup() {
        let labels: RowNames = Arc::new(["ID".to_string(), "name".to_string()]);
        let row = RowLabeled::new(
            labels,
            Box::new([Value::Int64(Some(4)), Value::Varchar(None)]),
        );
        assert_eq!(row.len(), 2);
        assert_eq!(row.get::<i64>("ID").expect("Exact label"), 4);
        assert_eq!(row.get::<i32>("id").expect("Case insensitive label"), 4);
        assert_eq!(row.get::<Option<String>>("NAME").expect("Nullable"), None);
        assert!(row.get::<String>("name").is_err());
        let error = row.get::<i64>("missing").expect_err("No such column");
        assert!(error.to_string().contains("ID, name"));
        assert!(row.get_at::<i64>(2).is_err());
    }

    #[test]
    fn columns_read_the_current_row() {
        let customer = Table::new("customer");
        let id = customer.column::<i64>("id");
        let email = customer.column::<Option<String>>("email");
        assert!(id.get().is_err());
        let labels: RowNames = Arc::new(["id".to_string(), "email".to_string()]);
        let mut tables = Tables::new();
        tables.register(&customer);
        assert!(tables.expose(|| id.get()).is_err());
        tables.set_row(Some(Arc::new(RowLabeled::new(
            labels,
            Box::new([Value::Int64(Some(9)), Value::Null]),
        ))));
        assert_eq!(tables.expose(|| id.get()).expect("Column id"), 9);
        assert!(tables.expose(|| email.is_null()).expect("Column email"));
        assert!(id.get().is_err());
        assert_eq!(id.to_string(), "id");
        assert_eq!(customer.columns().len(), 2);
    }

    #[test]
    fn innermost_exposed_row_wins() {
        let customer = Table::new("customer");
        let id = customer.column::<i64>("id");
        let labels: RowNames = Arc::new(["id".to_string()]);
        let row = |v: i64| {
            Some(Arc::new(RowLabeled::new(
                labels.clone(),
                Box::new([Value::Int64(Some(v))]),
            )))
        };
        let mut outer = Tables::new();
        outer.register(&customer);
        outer.set_row(row(1));
        let mut inner = outer.clone();
        inner.set_row(row(2));
        let read = outer.expose(|| {
            let nested = inner.expose(|| id.get()).expect("Inner row");
            (id.get().expect("Outer row"), nested)
        });
        assert_eq!(read, (1, 2));
    }
}
