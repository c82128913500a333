use crate::{Param, Tables};

/// Kind of the node whose children are being written.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    /// Root of the tree, the query itself.
    #[default]
    Query,
    Raw,
    Comparison,
    Select,
    From,
    Join,
    JoinDiscriminator,
    JoinOn,
    Where,
    And,
    Or,
    GroupBy,
    Having,
    In,
    Insert,
    Update,
    Set,
    Delete,
    /// Bare predicates of a `DELETE`, written after a synthesized `WHERE`.
    DeleteWhere,
    Batch,
}

impl Fragment {
    /// Whether a connective that is the first child of this fragment omits its keyword.
    pub fn is_predicate_group(&self) -> bool {
        matches!(
            self,
            Fragment::Where | Fragment::And | Fragment::Or | Fragment::DeleteWhere
        )
    }
}

#[derive(Default, Debug, Clone)]
pub struct Context {
    /// Fragment of the parent of the node being written.
    pub fragment: Fragment,
    /// Position of the node being written among its siblings.
    pub position: usize,
    /// The query has a non empty `WHERE` outside of its `DELETE`/`UPDATE` node.
    pub root_filter: bool,
    /// Tables of the query, they give the aliases.
    pub tables: Tables,
    /// Parameters, in the order their placeholders were written.
    pub params: Vec<Param>,
}

impl Context {
    pub fn new(root_filter: bool, tables: Tables) -> Self {
        Self {
            root_filter,
            tables,
            ..Default::default()
        }
    }

    /// Set the parent fragment and position for a child, returns the previous ones.
    pub fn enter(&mut self, fragment: Fragment, position: usize) -> (Fragment, usize) {
        let previous = (self.fragment, self.position);
        self.fragment = fragment;
        self.position = position;
        previous
    }

    pub fn leave(&mut self, previous: (Fragment, usize)) {
        (self.fragment, self.position) = previous;
    }
}

/// Output of the render pass: SQL text and the parameters bound to its placeholders.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub params: Vec<Param>,
}
