//! # Parameterised Layers (`nn`)
//!
//! Layers own their trainable [`Variable`](crate::Graph::new_variable)s and are created
//! through `Graph::new_xxx` factories that return a small handle struct: the
//! node id of the layer output plus the ids of every parameter, so that callers can
//! read, overwrite or optimise them.
//!
//! Two kinds of layers live here:
//!
//! - **Dedicated operators** with a hand-written backward rule: [`layers::norm`],
//!   [`layers::gru`], [`layers::conv2d`] and [`layers::embedding`].
//! - **Composites** wired from primitives of [`crate::ops`]: [`layers::linear`],
//!   [`attention`] and [`transformer`]. Their output is an identity node so the
//!   whole sub-graph behaves as a single node for the caller.

use crate::autograd::operation::Identity;
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;

pub mod attention;
pub mod layers;
pub mod transformer;

pub use attention::{AttentionConfig, MultiHeadAttention};
pub use layers::{Conv2d, Conv2dConfig, Embedding, Gru, Linear, Norm};
pub use transformer::{EncoderConfig, EncoderLayer, FeedForward};

impl Graph {
    /// Marks `inner` as the output of a composite sub-graph.
    pub(crate) fn new_composite(&mut self, inner: NodeId) -> Result<NodeId, GradGraphError> {
        self.push_function(Identity, &[inner])
    }
}
