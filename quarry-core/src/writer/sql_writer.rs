use crate::{
    ColumnRef, Comparison, Error, ErrorKind, Node, NodeKind, Operand, Param, Result, Rhs, Table,
    Tables, separated_by,
    writer::{Context, Fragment, Rendered},
};

/// Characters after which a child is written without a separating space.
pub const NO_SPACE_AFTER: [char; 4] = [' ', '(', ')', '\n'];

fn structural(message: String) -> Error {
    let error = Error::new(ErrorKind::Structural(message));
    log::error!("{:#}", error);
    error
}

/// Printer turning the expression tree into SQL text and parameters in a single pass.
///
/// Every node kind has its own method with a default implementation, a dialect can
/// override the pieces it writes differently.
pub trait SqlWriter: Send + Sync {
    fn as_dyn(&self) -> &dyn SqlWriter;

    /// Render the children of a query root, `tables` gives the aliases.
    fn render(&self, nodes: &[Node], tables: &Tables) -> Result<Rendered> {
        let root_filter = nodes.iter().any(|node| {
            node.is_filter()
                || (matches!(node.kind, NodeKind::Batch(..))
                    && node.children.iter().any(Node::is_filter))
        });
        let mut context = Context::new(root_filter, tables.clone());
        let mut out = String::with_capacity(128);
        self.write_children(&mut context, &mut out, Fragment::Query, nodes)?;
        Ok(Rendered {
            sql: out,
            params: context.params,
        })
    }

    /// Separate the next child from what is already written.
    fn write_spacing(&self, _context: &mut Context, out: &mut String) {
        if out.chars().last().is_some_and(|c| !NO_SPACE_AFTER.contains(&c)) {
            out.push(' ');
        }
    }

    fn write_children(
        &self,
        context: &mut Context,
        out: &mut String,
        parent: Fragment,
        children: &[Node],
    ) -> Result<()> {
        // Groups without predicates write nothing and don't take a position
        for (i, child) in children.iter().filter(|v| v.has_content()).enumerate() {
            self.write_spacing(context, out);
            let previous = context.enter(parent, i);
            let result = self.write_node(context, out, child);
            context.leave(previous);
            result?;
        }
        Ok(())
    }

    fn write_node(&self, context: &mut Context, out: &mut String, node: &Node) -> Result<()> {
        let children = &node.children;
        match &node.kind {
            NodeKind::Raw(sql) => {
                out.push_str(sql);
                Ok(())
            }
            NodeKind::Comparison(comparison) => self.write_comparison(context, out, comparison),
            NodeKind::Select(columns) => self.write_select(context, out, columns, children),
            NodeKind::From(tables) => self.write_from(context, out, tables, children),
            NodeKind::Join(table) => self.write_join(context, out, table, children),
            NodeKind::JoinDiscriminator(join_type) => {
                out.push('\n');
                out.push_str(join_type.keyword());
                self.write_children(context, out, Fragment::JoinDiscriminator, children)
            }
            NodeKind::JoinOn => self.write_children(context, out, Fragment::JoinOn, children),
            NodeKind::Where => self.write_where(context, out, children),
            NodeKind::And => self.write_connective(context, out, Fragment::And, children),
            NodeKind::Or => self.write_connective(context, out, Fragment::Or, children),
            NodeKind::GroupBy => {
                out.push_str("\nGROUP BY ");
                self.write_children(context, out, Fragment::GroupBy, children)
            }
            NodeKind::Having => {
                out.push_str("\nHAVING ");
                self.write_children(context, out, Fragment::Having, children)
            }
            NodeKind::In(column) => self.write_in(context, out, column, children),
            NodeKind::Insert(table) => self.write_insert(context, out, table, children),
            NodeKind::Update { table, all_rows } => {
                self.write_update(context, out, table, *all_rows, children)
            }
            NodeKind::Set => self.write_set(context, out, children),
            NodeKind::Delete { table, all_rows } => {
                self.write_delete(context, out, table, *all_rows, children)
            }
            NodeKind::Batch(..) => self.write_children(context, out, Fragment::Batch, children),
        }
    }

    /// Qualified name of the column, as used in predicates.
    fn write_column_ref(&self, context: &mut Context, out: &mut String, column: &ColumnRef) {
        out.push_str(&context.tables.qualified(column));
    }

    /// Table with its alias, when it differs from the name.
    fn write_table(&self, context: &mut Context, out: &mut String, table: &Table) {
        out.push_str(&context.tables.display(table));
    }

    fn write_operand(&self, context: &mut Context, out: &mut String, operand: &Operand) {
        match operand {
            Operand::Column(column) => self.write_column_ref(context, out, column),
            Operand::Raw(sql) => out.push_str(sql),
        }
    }

    /// Write the right operand, registering the parameter of a bound value.
    fn write_rhs(&self, context: &mut Context, out: &mut String, comparison: &Comparison, rhs: &Rhs) {
        match rhs {
            Rhs::Value(value) => {
                out.push('?');
                context.params.push(Param {
                    value: value.clone(),
                    sql_type: comparison.sql_type,
                    handler: comparison.handler.clone(),
                });
            }
            Rhs::Column(column) => self.write_column_ref(context, out, column),
            Rhs::Transform(transform, inner) => {
                out.push_str(transform.function());
                out.push('(');
                self.write_rhs(context, out, comparison, inner);
                out.push(')');
            }
        }
    }

    fn write_comparison(
        &self,
        context: &mut Context,
        out: &mut String,
        comparison: &Comparison,
    ) -> Result<()> {
        self.write_operand(context, out, &comparison.lhs);
        out.push(' ');
        out.push_str(comparison.op.sign());
        out.push(' ');
        self.write_rhs(context, out, comparison, &comparison.rhs);
        Ok(())
    }

    fn write_select(
        &self,
        context: &mut Context,
        out: &mut String,
        columns: &[ColumnRef],
        children: &[Node],
    ) -> Result<()> {
        out.push_str("SELECT ");
        separated_by(
            out,
            columns,
            |out, column| out.push_str(&context.tables.selection(column)),
            ", ",
        );
        self.write_children(context, out, Fragment::Select, children)
    }

    fn write_from(
        &self,
        context: &mut Context,
        out: &mut String,
        tables: &[Table],
        children: &[Node],
    ) -> Result<()> {
        if context.fragment == Fragment::Query {
            out.push('\n');
        }
        out.push_str("FROM ");
        separated_by(
            out,
            tables,
            |out, table| self.write_table(context, out, table),
            ", ",
        );
        self.write_children(context, out, Fragment::From, children)
    }

    fn write_join(
        &self,
        context: &mut Context,
        out: &mut String,
        table: &Table,
        children: &[Node],
    ) -> Result<()> {
        if context.fragment != Fragment::JoinDiscriminator {
            out.push('\n');
        }
        out.push_str("JOIN ");
        self.write_table(context, out, table);
        self.write_children(context, out, Fragment::Join, children)
    }

    fn write_where(&self, context: &mut Context, out: &mut String, children: &[Node]) -> Result<()> {
        if !children.iter().any(Node::has_content) {
            return Ok(());
        }
        if context.fragment == Fragment::Query {
            out.push('\n');
        }
        out.push_str("WHERE ");
        self.write_children(context, out, Fragment::Where, children)
    }

    /// `AND` / `OR` group, the keyword is omitted when the group opens its parent group.
    fn write_connective(
        &self,
        context: &mut Context,
        out: &mut String,
        fragment: Fragment,
        children: &[Node],
    ) -> Result<()> {
        let predicates = children.iter().filter(|v| v.has_content()).count();
        if predicates == 0 {
            return Ok(());
        }
        if !(context.fragment.is_predicate_group() && context.position == 0) {
            out.push_str(if fragment == Fragment::Or { "OR " } else { "AND " });
        }
        crate::possibly_parenthesized!(
            out,
            predicates > 1,
            self.write_children(context, out, fragment, children)?
        );
        Ok(())
    }

    fn write_in(
        &self,
        context: &mut Context,
        out: &mut String,
        column: &ColumnRef,
        children: &[Node],
    ) -> Result<()> {
        if children.is_empty() {
            return Err(structural(format!(
                "IN clause on column `{}` has no values",
                context.tables.qualified(column)
            )));
        }
        self.write_column_ref(context, out, column);
        out.push_str(" IN (");
        self.write_children(context, out, Fragment::In, children)?;
        out.push(')');
        Ok(())
    }

    fn write_insert(
        &self,
        context: &mut Context,
        out: &mut String,
        table: &Table,
        children: &[Node],
    ) -> Result<()> {
        let pairs = children
            .iter()
            .filter_map(Node::as_comparison)
            .collect::<Vec<_>>();
        out.push_str("INSERT INTO ");
        out.push_str(table.name());
        out.push_str(" (");
        separated_by(
            out,
            &pairs,
            |out, pair| match &pair.lhs {
                Operand::Column(column) => out.push_str(column.name()),
                Operand::Raw(sql) => out.push_str(sql),
            },
            ", ",
        );
        out.push_str(") VALUES (");
        separated_by(
            out,
            &pairs,
            |out, pair| self.write_rhs(context, out, pair, &pair.rhs),
            ", ",
        );
        out.push(')');
        Ok(())
    }

    fn write_update(
        &self,
        context: &mut Context,
        out: &mut String,
        table: &Table,
        all_rows: bool,
        children: &[Node],
    ) -> Result<()> {
        if !all_rows && !context.root_filter && !children.iter().any(Node::is_filter) {
            return Err(structural(format!(
                "UPDATE of table `{}` has no WHERE clause, use `update_all` to change every row",
                table.name()
            )));
        }
        out.push_str("UPDATE ");
        out.push_str(table.name());
        out.push(' ');
        self.write_children(context, out, Fragment::Update, children)
    }

    /// `SET` assignments, one per line.
    fn write_set(&self, context: &mut Context, out: &mut String, children: &[Node]) -> Result<()> {
        out.push_str("\nSET ");
        for (i, child) in children.iter().enumerate() {
            self.write_spacing(context, out);
            let previous = context.enter(Fragment::Set, i);
            let result = self.write_node(context, out, child);
            context.leave(previous);
            result?;
            if i + 1 < children.len() {
                out.push_str(",\n");
            }
        }
        Ok(())
    }

    fn write_delete(
        &self,
        context: &mut Context,
        out: &mut String,
        table: &Table,
        all_rows: bool,
        children: &[Node],
    ) -> Result<()> {
        let has_where = children.first().is_some_and(Node::is_filter);
        let has_predicate = children.iter().any(Node::has_content);
        if !all_rows && !has_predicate && !context.root_filter {
            return Err(structural(format!(
                "DELETE from table `{}` has no WHERE clause, use `delete_all` to remove every row",
                table.name()
            )));
        }
        out.push_str("DELETE FROM ");
        self.write_table(context, out, table);
        out.push(' ');
        if has_predicate && !has_where {
            out.push_str("\nWHERE ");
            return self.write_children(context, out, Fragment::DeleteWhere, children);
        }
        self.write_children(context, out, Fragment::Delete, children)
    }
}

/// Writer of the SQL understood by most databases.
#[derive(Default, Debug, Clone, Copy)]
pub struct GenericSqlWriter;

impl GenericSqlWriter {
    pub fn new() -> Self {
        Self
    }
}

impl SqlWriter for GenericSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }
}
