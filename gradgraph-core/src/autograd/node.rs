use crate::autograd::operation::Operation;
use crate::matrix::Matrix;
use std::fmt;

/// Stable handle to a node owned by a [`Graph`](crate::Graph).
///
/// Handles are plain indices into the graph's arena: cheap to copy, valid for the
/// lifetime of the graph that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in its graph's arena (creation order).
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node is: an externally fed leaf or a derived function of its inputs.
pub(crate) enum NodeKind {
    Constant,
    Variable,
    Function(Box<dyn Operation>),
}

impl NodeKind {
    pub(crate) fn is_leaf(&self) -> bool {
        !matches!(self, NodeKind::Function(_))
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            NodeKind::Constant => "constant",
            NodeKind::Variable => "variable",
            NodeKind::Function(op) => op.name(),
        }
    }
}

/// Arena slot. Leaves always hold a value; functions hold one only while cached.
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) inputs: Vec<NodeId>,
    pub(crate) value: Option<Matrix>,
    /// Epoch in which `value` was computed (functions only).
    pub(crate) epoch: u64,
    /// Auxiliary matrices kept from the last evaluation for the backward rule.
    pub(crate) saved: Vec<Matrix>,
    pub(crate) grad: Option<Matrix>,
    pub(crate) backprop: bool,
}

impl Node {
    pub(crate) fn leaf(kind: NodeKind, value: Matrix) -> Self {
        Node {
            kind,
            inputs: Vec::new(),
            value: Some(value),
            epoch: 0,
            saved: Vec::new(),
            grad: None,
            backprop: true,
        }
    }

    pub(crate) fn function(op: Box<dyn Operation>, inputs: Vec<NodeId>) -> Self {
        Node {
            kind: NodeKind::Function(op),
            inputs,
            value: None,
            epoch: 0,
            saved: Vec::new(),
            grad: None,
            backprop: true,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind.label())
            .field("inputs", &self.inputs)
            .field("shape", &self.value.as_ref().map(Matrix::shape))
            .field("epoch", &self.epoch)
            .field("backprop", &self.backprop)
            .finish()
    }
}
