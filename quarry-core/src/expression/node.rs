use crate::{Clause, ColumnRef, Comparison, Table, Tables, writer::Fragment};
use std::fmt::{self, Debug, Formatter};

/// Kind of join, rendered before the `JOIN` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Left,
    Right,
    Inner,
    Outer,
}

impl JoinType {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Inner => "INNER",
            JoinType::Outer => "OUTER",
        }
    }
}

/// Statement repeated once per entity, the body adds the nodes describing one entity.
pub struct Batch {
    pub(crate) len: usize,
    pub(crate) next: Box<dyn FnMut(&mut Clause<'_>) -> bool + Send>,
}

impl Batch {
    pub fn new<T, I, F>(entities: I, mut body: F) -> Self
    where
        T: Send + 'static,
        I: IntoIterator<Item = T>,
        F: FnMut(&mut Clause<'_>, T) + Send + 'static,
    {
        let mut entities = entities.into_iter().collect::<Vec<_>>().into_iter();
        Self {
            len: entities.len(),
            next: Box::new(move |clause| match entities.next() {
                Some(entity) => {
                    body(clause, entity);
                    true
                }
                None => false,
            }),
        }
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Debug for Batch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch").field("len", &self.len).finish()
    }
}

#[derive(Debug)]
pub enum NodeKind {
    /// SQL fragment written verbatim.
    Raw(String),
    Comparison(Comparison),
    Select(Vec<ColumnRef>),
    From(Vec<Table>),
    Join(Table),
    JoinDiscriminator(JoinType),
    JoinOn,
    Where,
    And,
    Or,
    GroupBy,
    Having,
    In(ColumnRef),
    Insert(Table),
    Update { table: Table, all_rows: bool },
    Set,
    Delete { table: Table, all_rows: bool },
    Batch(Batch),
}

impl NodeKind {
    pub fn fragment(&self) -> Fragment {
        match self {
            NodeKind::Raw(..) => Fragment::Raw,
            NodeKind::Comparison(..) => Fragment::Comparison,
            NodeKind::Select(..) => Fragment::Select,
            NodeKind::From(..) => Fragment::From,
            NodeKind::Join(..) => Fragment::Join,
            NodeKind::JoinDiscriminator(..) => Fragment::JoinDiscriminator,
            NodeKind::JoinOn => Fragment::JoinOn,
            NodeKind::Where => Fragment::Where,
            NodeKind::And => Fragment::And,
            NodeKind::Or => Fragment::Or,
            NodeKind::GroupBy => Fragment::GroupBy,
            NodeKind::Having => Fragment::Having,
            NodeKind::In(..) => Fragment::In,
            NodeKind::Insert(..) => Fragment::Insert,
            NodeKind::Update { .. } => Fragment::Update,
            NodeKind::Set => Fragment::Set,
            NodeKind::Delete { .. } => Fragment::Delete,
            NodeKind::Batch(..) => Fragment::Batch,
        }
    }
}

/// Element of the expression tree, children are rendered in insertion order.
#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
        }
    }

    /// Build the node running `op` to add its children.
    pub fn build(kind: NodeKind, tables: &mut Tables, op: impl FnOnce(&mut Clause<'_>)) -> Self {
        let mut node = Node::new(kind);
        op(&mut Clause::new(&mut node.children, tables));
        node
    }

    /// `WHERE` node with at least one predicate.
    pub fn is_filter(&self) -> bool {
        matches!(self.kind, NodeKind::Where) && self.children.iter().any(Node::has_content)
    }

    /// Whether the node writes something: `WHERE`, `AND` and `OR` groups only do when
    /// they contain a predicate, at any depth.
    pub fn has_content(&self) -> bool {
        match self.kind {
            NodeKind::Where | NodeKind::And | NodeKind::Or => {
                self.children.iter().any(Node::has_content)
            }
            _ => true,
        }
    }

    pub fn as_comparison(&self) -> Option<&Comparison> {
        match &self.kind {
            NodeKind::Comparison(v) => Some(v),
            _ => None,
        }
    }
}
