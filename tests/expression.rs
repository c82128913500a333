#[cfg(test)]
mod tests {
    use quarry::{
        CompareOp, ErrorKind, NodeKind, Operand, Param, Query, Rhs, SqlWriter, Table, Value,
        lower, upper,
    };

    struct Writer;
    impl SqlWriter for Writer {
        fn as_dyn(&self) -> &dyn SqlWriter {
            self
        }
    }

    const WRITER: Writer = Writer {};

    fn sql<T>(query: &Query<T>) -> String {
        query
            .render_with(&WRITER)
            .expect("Failed to render the query")
            .sql
    }

    #[test]
    fn raw() {
        let query = Query::<()>::new(|q| {
            q.raw("SELECT 1");
        });
        assert_eq!(sql(&query), "SELECT 1");

        let query = Query::<()>::new(|q| {
            q.raw("SELECT");
            q.raw("1,");
            q.raw("2");
        });
        assert_eq!(sql(&query), "SELECT 1, 2");

        let query = Query::<()>::new(|q| {
            q.raw("SELECT (");
            q.raw("1)");
            q.raw("\nUNION SELECT 2");
        });
        assert_eq!(sql(&query), "SELECT (1)\nUNION SELECT 2");
    }

    #[test]
    fn where_and_or() {
        let t = Table::new("t");
        let a = t.column::<i32>("a");
        let b = t.column::<i32>("b");
        let c = t.column::<i32>("c");
        let query = Query::<()>::new(|q| {
            q.filter(|w| {
                w.eq(&a, 1);
                w.and(|and| {
                    and.eq(&b, 2);
                    and.or(|or| {
                        or.eq(&c, 3);
                    });
                });
            });
        });
        assert_eq!(sql(&query), "\nWHERE a = ? AND (b = ? OR c = ?)");
        assert_eq!(
            query.params().expect("Failed to collect the params"),
            [Param::new(1), Param::new(2), Param::new(3)]
        );
    }

    #[test]
    fn leading_group() {
        let t = Table::new("t");
        let a = t.column::<i32>("a");
        let b = t.column::<i32>("b");
        let query = Query::<()>::new(|q| {
            q.raw("SELECT * FROM t");
            q.filter(|w| {
                w.or(|or| {
                    or.eq(&a, 1);
                    or.or(|or| {
                        or.eq(&b, 2);
                    });
                });
                w.and(|and| {
                    and.lt(&a, 10);
                });
            });
        });
        assert_eq!(
            sql(&query),
            "SELECT * FROM t \nWHERE (a = ? OR b = ?)AND a < ?"
        );

        let query = Query::<()>::new(|q| {
            q.filter(|w| {
                w.and(|and| {
                    and.gt(&a, 1);
                    and.and(|and| {
                        and.lte(&b, 2);
                    });
                });
            });
        });
        assert_eq!(sql(&query), "\nWHERE (a > ? AND b <= ?)");
    }

    #[test]
    fn empty_where() {
        let query = Query::<()>::new(|q| {
            q.raw("SELECT * FROM t");
            q.filter(|_| {});
        });
        assert_eq!(sql(&query), "SELECT * FROM t");
    }

    #[test]
    fn operators() {
        let t = Table::new("t");
        let a = t.column::<String>("a");
        let query = Query::<()>::new(|q| {
            q.filter(|w| {
                w.like(&a, "x%");
                w.and(|and| {
                    and.gte(&a, "b");
                });
                w.or(|or| {
                    or.lte(&a, "z");
                });
            });
        });
        assert_eq!(sql(&query), "\nWHERE a LIKE ? AND a >= ? OR a <= ?");
        let Some(NodeKind::Where) = query.nodes().first().map(|v| &v.kind) else {
            panic!("Expected a where node");
        };
        let comparison = query.nodes()[0].children[0]
            .as_comparison()
            .expect("Expected a comparison");
        assert_eq!(comparison.op, CompareOp::Like);
        assert!(matches!(&comparison.lhs, Operand::Column(column) if column.name() == "a"));
        assert_eq!(
            comparison.rhs,
            Rhs::Value(Value::Varchar(Some("x%".into())))
        );
    }

    #[test]
    fn transforms() {
        let t = Table::new("t");
        let name = t.column::<String>("name");
        let query = Query::<()>::new(|q| {
            q.filter(|w| {
                w.eq("UPPER(name)", upper("bob"));
                w.or(|or| {
                    or.like(&name, lower(upper("%X%")));
                });
            });
        });
        assert_eq!(
            sql(&query),
            "\nWHERE UPPER(name) = UPPER(?)OR name LIKE LOWER(UPPER(?))"
        );
        assert_eq!(
            query.params().expect("Failed to collect the params"),
            [Param::new("bob"), Param::new("%X%")]
        );
    }

    #[test]
    fn in_values() {
        let t = Table::new("t");
        let id = t.column::<i64>("id");
        let query = Query::<()>::new(|q| {
            q.raw("SELECT * FROM t");
            q.filter(|w| {
                w.in_(&id, |values| {
                    values.raw("?, ?, ?");
                });
            });
        });
        assert_eq!(sql(&query), "SELECT * FROM t \nWHERE id IN (?, ?, ?)");

        let query = Query::<()>::new(|q| {
            q.raw("SELECT * FROM t");
            q.filter(|w| {
                w.in_(&id, |values| {
                    values.raw("SELECT id FROM archived");
                });
            });
        });
        assert_eq!(
            sql(&query),
            "SELECT * FROM t \nWHERE id IN (SELECT id FROM archived)"
        );

        let query = Query::<()>::new(|q| {
            q.filter(|w| {
                w.in_(&id, |_| {});
            });
        });
        let error = query
            .render_with(&WRITER)
            .expect_err("An empty IN must not render");
        assert!(matches!(
            ErrorKind::of(&error),
            Some(ErrorKind::Structural(message)) if message.contains("`id`")
        ));
    }

    #[test]
    fn select_group_having() {
        let orders = Table::new("orders");
        let customer = orders.column::<i64>("customer");
        let total = orders.column::<f64>("total");
        let query = Query::<()>::new(|q| {
            q.select((&customer, &total));
            q.from(&orders);
            q.group_by("customer");
            q.having(|h| {
                h.gt("SUM(total)", 100.0);
            });
        });
        assert_eq!(
            sql(&query),
            "SELECT customer, total \nFROM orders \nGROUP BY customer \nHAVING SUM(total) > ?"
        );
    }

    #[test]
    fn describe() {
        let t = Table::new("t");
        let a = t.column::<i32>("a");
        let query = Query::<()>::new(|q| {
            q.raw("SELECT * FROM t");
            q.filter(|w| {
                w.eq(&a, 7);
            });
        })
        .named("find t");
        assert_eq!(
            query.describe(),
            concat!(
                "Query    : find t\n",
                "SQL      : SELECT * FROM t \n",
                "           WHERE a = ?\n",
                "Params   : [7]",
            )
        );
    }
}
