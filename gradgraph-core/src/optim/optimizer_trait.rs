use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::Scalar;

/// Common interface of the first-order optimizers.
pub trait Optimizer {
    /// Applies one update to every managed variable that holds a gradient.
    ///
    /// Variables that never received a gradient are left untouched.
    fn update(&mut self, graph: &mut Graph) -> Result<(), GradGraphError>;

    /// Variables managed by this optimizer, in update order.
    fn variables(&self) -> &[NodeId];

    fn learning_rate(&self) -> Scalar;

    fn set_learning_rate(&mut self, learning_rate: Scalar) -> Result<(), GradGraphError>;

    /// Drops any accumulated optimizer state.
    fn reset(&mut self);
}
