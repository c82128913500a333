use crate::{
    Batch, Column, CompareOp, Comparison, IntoColumns, IntoTables, JoinType, Node, NodeKind,
    Operand, Rhs, Table, Tables,
};

/// Builder adding nodes to one level of the expression tree.
///
/// Every nesting method takes a closure receiving the builder of the new node's
/// children, so the shape of the code follows the shape of the statement:
///
/// ```rust
/// use quarry_core::{Query, Table};
/// let customer = Table::new("customer");
/// let id = customer.column::<i32>("id");
/// let name = customer.column::<String>("name");
/// let query = Query::<String>::new(|q| {
///     q.select(&name);
///     q.from(&customer);
///     q.filter(|w| {
///         w.gt(&id, 10);
///     });
/// });
/// assert_eq!(
///     query.render().unwrap(),
///     "SELECT name \nFROM customer \nWHERE id > ?",
/// );
/// ```
pub struct Clause<'a> {
    children: &'a mut Vec<Node>,
    tables: &'a mut Tables,
}

macro_rules! comparison {
    ($(#[$meta:meta])* $name:ident, $op:expr) => {
        $(#[$meta])*
        pub fn $name(&mut self, lhs: impl Into<Operand>, rhs: impl Into<Rhs>) -> &mut Comparison {
            self.comparison(Comparison::new(lhs, $op, rhs))
        }
    };
}

impl<'a> Clause<'a> {
    pub fn new(children: &'a mut Vec<Node>, tables: &'a mut Tables) -> Self {
        Self { children, tables }
    }

    /// Tables registered so far in the query.
    pub fn tables(&self) -> &Tables {
        self.tables
    }

    pub fn push(&mut self, node: Node) -> &mut Self {
        self.children.push(node);
        self
    }

    fn nested(&mut self, kind: NodeKind, op: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        let node = Node::build(kind, self.tables, op);
        self.push(node)
    }

    /// SQL written verbatim.
    pub fn raw(&mut self, sql: impl Into<String>) -> &mut Self {
        self.push(Node::new(NodeKind::Raw(sql.into())))
    }

    pub fn select(&mut self, columns: impl IntoColumns) -> &mut Self {
        self.push(Node::new(NodeKind::Select(columns.into_columns())))
    }

    pub fn select_with(
        &mut self,
        columns: impl IntoColumns,
        op: impl FnOnce(&mut Clause<'_>),
    ) -> &mut Self {
        self.nested(NodeKind::Select(columns.into_columns()), op)
    }

    pub fn from(&mut self, tables: impl IntoTables) -> &mut Self {
        self.from_with(tables, |_| {})
    }

    /// `FROM` with nested nodes, usually joins.
    pub fn from_with(
        &mut self,
        tables: impl IntoTables,
        op: impl FnOnce(&mut Clause<'_>),
    ) -> &mut Self {
        let tables = tables.into_tables();
        for table in &tables {
            self.tables.register(table);
        }
        self.nested(NodeKind::From(tables), op)
    }

    /// `WHERE` clause.
    pub fn filter(&mut self, op: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        self.nested(NodeKind::Where, op)
    }

    pub fn and(&mut self, op: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        self.nested(NodeKind::And, op)
    }

    pub fn or(&mut self, op: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        self.nested(NodeKind::Or, op)
    }

    pub fn comparison(&mut self, comparison: Comparison) -> &mut Comparison {
        self.children
            .push(Node::new(NodeKind::Comparison(comparison)));
        match self.children.last_mut() {
            Some(Node {
                kind: NodeKind::Comparison(comparison),
                ..
            }) => comparison,
            _ => unreachable!(),
        }
    }

    comparison!(eq, CompareOp::Equal);
    comparison!(like, CompareOp::Like);
    comparison!(gt, CompareOp::Greater);
    comparison!(gte, CompareOp::GreaterEqual);
    comparison!(lt, CompareOp::Less);
    comparison!(lte, CompareOp::LessEqual);

    /// `JOIN table ON ..`, the closure adds the join predicates.
    pub fn join(&mut self, table: &Table, on: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        self.tables.register(table);
        let node = Self::join_node(table, self.tables, on);
        self.push(node)
    }

    fn join_node(table: &Table, tables: &mut Tables, on: impl FnOnce(&mut Clause<'_>)) -> Node {
        Node::build(NodeKind::Join(table.clone()), tables, |join| {
            join.raw("ON");
            join.nested(NodeKind::JoinOn, on);
        })
    }

    fn discriminated_join(
        &mut self,
        join_type: JoinType,
        table: &Table,
        on: impl FnOnce(&mut Clause<'_>),
    ) -> &mut Self {
        self.tables.register(table);
        let mut node = Node::new(NodeKind::JoinDiscriminator(join_type));
        node.children.push(Self::join_node(table, self.tables, on));
        self.push(node)
    }

    pub fn left_join(&mut self, table: &Table, on: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        self.discriminated_join(JoinType::Left, table, on)
    }

    pub fn right_join(&mut self, table: &Table, on: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        self.discriminated_join(JoinType::Right, table, on)
    }

    pub fn inner_join(&mut self, table: &Table, on: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        self.discriminated_join(JoinType::Inner, table, on)
    }

    pub fn outer_join(&mut self, table: &Table, on: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        self.discriminated_join(JoinType::Outer, table, on)
    }

    pub fn group_by(&mut self, sql: impl Into<String>) -> &mut Self {
        let sql = sql.into();
        self.nested(NodeKind::GroupBy, |group| {
            group.raw(sql);
        })
    }

    pub fn having(&mut self, op: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        self.nested(NodeKind::Having, op)
    }

    /// `column IN (..)`, the closure adds the content of the parentheses.
    pub fn in_<T>(
        &mut self,
        column: &Column<T>,
        op: impl FnOnce(&mut Clause<'_>),
    ) -> &mut Self {
        self.nested(NodeKind::In(column.column_ref()), op)
    }

    /// `INSERT INTO table (..) VALUES (..)`, the closure adds `column = value` pairs.
    pub fn insert(&mut self, table: &Table, op: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        self.nested(NodeKind::Insert(table.clone()), op)
    }

    /// `UPDATE table SET ..`, the closure adds the assignments. A predicate is required.
    pub fn update(&mut self, table: &Table, op: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        self.update_node(table, false, op)
    }

    /// Same as [`Clause::update`] but allowed to change every row of the table.
    pub fn update_all(&mut self, table: &Table, op: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        self.update_node(table, true, op)
    }

    fn update_node(
        &mut self,
        table: &Table,
        all_rows: bool,
        op: impl FnOnce(&mut Clause<'_>),
    ) -> &mut Self {
        self.nested(
            NodeKind::Update {
                table: table.clone(),
                all_rows,
            },
            |update| {
                update.set(op);
            },
        )
    }

    pub fn set(&mut self, op: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        self.nested(NodeKind::Set, op)
    }

    /// `DELETE FROM table`, the closure adds the predicates. A predicate is required.
    pub fn delete(&mut self, table: &Table, op: impl FnOnce(&mut Clause<'_>)) -> &mut Self {
        self.nested(
            NodeKind::Delete {
                table: table.clone(),
                all_rows: false,
            },
            op,
        )
    }

    /// `DELETE FROM table` removing every row.
    pub fn delete_all(&mut self, table: &Table) -> &mut Self {
        self.push(Node::new(NodeKind::Delete {
            table: table.clone(),
            all_rows: true,
        }))
    }

    /// Repeat the statement built by `body` once for each entity.
    pub fn batch<T, I, F>(&mut self, entities: I, body: F) -> &mut Self
    where
        T: Send + 'static,
        I: IntoIterator<Item = T>,
        F: FnMut(&mut Clause<'_>, T) + Send + 'static,
    {
        self.push(Node::new(NodeKind::Batch(Batch::new(entities, body))))
    }
}
