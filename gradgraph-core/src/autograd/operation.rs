use crate::error::GradGraphError;
use crate::matrix::Matrix;
use crate::rng::Rng;
use std::fmt::Debug;

/// Everything a function node may read while computing its value.
pub(crate) struct ForwardContext<'a> {
    /// Cached values of the node's inputs, in wiring order.
    pub inputs: Vec<&'a Matrix>,
    /// The graph's random source, for stochastic nodes.
    pub rng: &'a mut Rng,
    /// Auxiliaries of the previous evaluation, offered only while the graph asks
    /// stochastic nodes to hold their noise fixed (numerical differentiation).
    pub previous: Option<&'a [Matrix]>,
}

impl<'a> ForwardContext<'a> {
    /// Previously drawn noise of the given shape, if it may be reused.
    pub fn reusable(&self, index: usize, shape: (usize, usize)) -> Option<Matrix> {
        self.previous
            .and_then(|saved| saved.get(index))
            .filter(|m| m.shape() == shape)
            .cloned()
    }
}

/// Result of a forward evaluation.
pub(crate) struct Evaluation {
    pub value: Matrix,
    /// Auxiliaries (masks, noise, statistics) handed back to `backward`.
    pub saved: Vec<Matrix>,
}

impl Evaluation {
    pub fn value(value: Matrix) -> Self {
        Evaluation {
            value,
            saved: Vec::new(),
        }
    }

    pub fn with_saved(value: Matrix, saved: Vec<Matrix>) -> Self {
        Evaluation { value, saved }
    }
}

/// Everything a function node may read while differentiating.
pub(crate) struct BackwardContext<'a> {
    pub inputs: Vec<&'a Matrix>,
    pub output: &'a Matrix,
    pub saved: &'a [Matrix],
    /// Gradient of the loss with respect to this node's output.
    pub grad: &'a Matrix,
}

impl<'a> BackwardContext<'a> {
    pub fn saved(&self, index: usize, operation: &str) -> Result<&'a Matrix, GradGraphError> {
        self.saved.get(index).ok_or_else(|| {
            GradGraphError::InternalError(format!(
                "{} backward is missing saved state #{}",
                operation, index
            ))
        })
    }
}

/// Forward/backward contract shared by every derived node in the catalogue.
///
/// `backward` returns one entry per input, in the order the inputs were wired.
/// `None` means the input receives no gradient from this node (indices, masks).
/// Each `Some` contribution must have the shape of the corresponding input value.
pub(crate) trait Operation: Debug {
    fn name(&self) -> &'static str;

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError>;

    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError>;
}

/// Pass-through node marking the output of a composite sub-graph.
///
/// Its derivative is the identity, so the gradient arriving at the composite flows
/// unchanged into the primitive nodes that actually compute it.
#[derive(Debug)]
pub(crate) struct Identity;

impl Operation for Identity {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        Ok(Evaluation::value(ctx.inputs[0].clone()))
    }

    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        Ok(vec![Some(ctx.grad.clone())])
    }
}
