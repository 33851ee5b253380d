use crate::autograd::node::{Node, NodeId, NodeKind};
use crate::autograd::operation::{BackwardContext, ForwardContext, Operation};
use crate::error::GradGraphError;
use crate::matrix::{Matrix, Scalar};
use crate::rng::Rng;
use log::{debug, trace};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Owner of every node of a computation.
///
/// The graph is an arena: factories (`new_constant`, `new_add`, `new_gru`, ...) append a
/// node and hand back its [`NodeId`]. Function nodes are evaluated lazily by
/// [`forward`](Graph::forward) and memoized until the next [`recache`](Graph::recache).
/// [`backward`](Graph::backward) accumulates gradients into every ancestor of a terminal
/// until [`zero_grad`](Graph::zero_grad) clears them.
///
/// Writing to a leaf (`value_mut`, `set_value`) does not invalidate cached function
/// values; call `recache` before evaluating the graph on new data.
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Node>,
    variables: Vec<NodeId>,
    names: HashMap<String, NodeId>,
    epoch: u64,
    rng: Rng,
    hold_noise: bool,
}

impl Graph {
    /// Creates an empty graph with an entropy-seeded random source.
    pub fn new() -> Self {
        Self::from_rng(Rng::new())
    }

    /// Creates an empty graph whose random draws (initialisation, dropout masks,
    /// sampler noise) are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(Rng::seeded(seed))
    }

    fn from_rng(rng: Rng) -> Self {
        Graph {
            nodes: Vec::new(),
            variables: Vec::new(),
            names: HashMap::new(),
            epoch: 0,
            rng,
            hold_noise: false,
        }
    }

    // --- Leaf factories ---

    /// Creates a zero-filled constant, typically an input or target slot.
    pub fn new_constant(&mut self, rows: usize, cols: usize) -> Result<NodeId, GradGraphError> {
        check_dims(rows, cols, "new_constant")?;
        Ok(self.push_leaf(NodeKind::Constant, Matrix::zeros(rows, cols)))
    }

    pub fn new_constant_with(&mut self, value: Matrix) -> Result<NodeId, GradGraphError> {
        check_dims(value.rows(), value.cols(), "new_constant_with")?;
        Ok(self.push_leaf(NodeKind::Constant, value))
    }

    /// Creates a trainable variable initialised from `N(0, 1/cols)`.
    pub fn new_variable(&mut self, rows: usize, cols: usize) -> Result<NodeId, GradGraphError> {
        check_dims(rows, cols, "new_variable")?;
        let std = (1.0 / cols as Scalar).sqrt();
        let value = self.rng.normal_matrix(rows, cols, 0.0, std);
        Ok(self.push_leaf(NodeKind::Variable, value))
    }

    pub fn new_variable_with(&mut self, value: Matrix) -> Result<NodeId, GradGraphError> {
        check_dims(value.rows(), value.cols(), "new_variable_with")?;
        Ok(self.push_leaf(NodeKind::Variable, value))
    }

    /// Creates a randomly initialised variable registered under `name`.
    pub fn new_named_variable(
        &mut self,
        rows: usize,
        cols: usize,
        name: impl Into<String>,
    ) -> Result<NodeId, GradGraphError> {
        let id = self.new_variable(rows, cols)?;
        self.names.insert(name.into(), id);
        Ok(id)
    }

    fn push_leaf(&mut self, kind: NodeKind, value: Matrix) -> NodeId {
        let id = NodeId(self.nodes.len());
        if matches!(kind, NodeKind::Variable) {
            self.variables.push(id);
        }
        trace!("graph: new {} {} {:?}", kind.label(), id, value.shape());
        self.nodes.push(Node::leaf(kind, value));
        id
    }

    /// Registers a function node wired to `inputs`. Used by every operator factory.
    pub(crate) fn push_function<O: Operation + 'static>(
        &mut self,
        op: O,
        inputs: &[NodeId],
    ) -> Result<NodeId, GradGraphError> {
        for &input in inputs {
            self.node(input)?;
        }
        let id = NodeId(self.nodes.len());
        trace!("graph: new {} {} <- {:?}", op.name(), id, inputs);
        self.nodes.push(Node::function(Box::new(op), inputs.to_vec()));
        Ok(id)
    }

    // --- Leaf values ---

    /// Current value of a constant or variable.
    pub fn value(&self, id: NodeId) -> Result<&Matrix, GradGraphError> {
        let node = self.node(id)?;
        if !node.kind.is_leaf() {
            return Err(not_a_leaf(id, "value"));
        }
        node.value.as_ref().ok_or(GradGraphError::Uncached { node: id.0 })
    }

    /// Mutable access to a constant's or variable's value.
    pub fn value_mut(&mut self, id: NodeId) -> Result<&mut Matrix, GradGraphError> {
        let node = self.node_mut(id)?;
        if !node.kind.is_leaf() {
            return Err(not_a_leaf(id, "value_mut"));
        }
        node.value.as_mut().ok_or(GradGraphError::Uncached { node: id.0 })
    }

    /// Replaces a leaf's value. Constants accept any shape (e.g. a new batch size);
    /// variables keep the shape they were created with.
    pub fn set_value(&mut self, id: NodeId, value: Matrix) -> Result<(), GradGraphError> {
        let node = self.node_mut(id)?;
        match node.kind {
            NodeKind::Function(_) => return Err(not_a_leaf(id, "set_value")),
            NodeKind::Variable => {
                if let Some(current) = &node.value {
                    current.ensure_same_shape(&value, "set_value")?;
                }
            }
            NodeKind::Constant => {
                check_dims(value.rows(), value.cols(), "set_value")?;
            }
        }
        node.value = Some(value);
        Ok(())
    }

    // --- Evaluation ---

    /// Evaluates `id`, computing every stale ancestor first, and returns the cached value.
    ///
    /// Within an epoch the result is memoized: a second call returns the same matrix
    /// without recomputation, and stochastic nodes keep their noise.
    pub fn forward(&mut self, id: NodeId) -> Result<&Matrix, GradGraphError> {
        self.node(id)?;
        if !self.is_cached(id) {
            for node in self.ancestors(id, true) {
                self.evaluate(node)?;
            }
        }
        self.nodes[id.0]
            .value
            .as_ref()
            .ok_or(GradGraphError::Uncached { node: id.0 })
    }

    /// Invalidates every cached function value. Gradients are not touched.
    pub fn recache(&mut self) {
        self.epoch += 1;
        trace!("graph: recache, epoch {}", self.epoch);
    }

    /// Invalidates the cached value of a single node.
    pub fn recache_node(&mut self, id: NodeId) -> Result<(), GradGraphError> {
        let node = self.node_mut(id)?;
        if !node.kind.is_leaf() {
            node.value = None;
        }
        Ok(())
    }

    fn is_cached(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.0];
        node.kind.is_leaf() || (node.value.is_some() && node.epoch == self.epoch)
    }

    /// Ancestors of `root` (inclusive) in evaluation order.
    ///
    /// Inputs always precede their consumers in the arena, so sorting by index yields
    /// a topological order. With `stale_only` the walk stops at cached nodes.
    fn ancestors(&self, root: NodeId, stale_only: bool) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) || (stale_only && self.is_cached(id)) {
                continue;
            }
            stack.extend(self.nodes[id.0].inputs.iter().copied());
        }
        let mut order: Vec<NodeId> = seen
            .into_iter()
            .filter(|&id| !stale_only || !self.is_cached(id))
            .collect();
        order.sort_unstable();
        order
    }

    /// Computes one function node from its (already cached) inputs.
    fn evaluate(&mut self, id: NodeId) -> Result<(), GradGraphError> {
        let node = &self.nodes[id.0];
        let op = match &node.kind {
            NodeKind::Function(op) => op,
            _ => return Ok(()),
        };
        let mut inputs = Vec::with_capacity(node.inputs.len());
        for input in &node.inputs {
            let value = self.nodes[input.0]
                .value
                .as_ref()
                .ok_or(GradGraphError::Uncached { node: input.0 })?;
            inputs.push(value);
        }
        let previous = if self.hold_noise {
            Some(node.saved.as_slice())
        } else {
            None
        };
        let mut ctx = ForwardContext {
            inputs,
            rng: &mut self.rng,
            previous,
        };
        let evaluation = op.forward(&mut ctx)?;
        trace!(
            "graph: evaluated {} {} -> {:?}",
            op.name(),
            id,
            evaluation.value.shape()
        );

        let epoch = self.epoch;
        let node = &mut self.nodes[id.0];
        node.value = Some(evaluation.value);
        node.saved = evaluation.saved;
        node.epoch = epoch;
        Ok(())
    }

    /// Asks stochastic nodes to reuse their last noise on re-evaluation.
    pub(crate) fn hold_noise(&mut self, hold: bool) {
        self.hold_noise = hold;
    }

    // --- Gradients ---

    /// Clears every gradient accumulator.
    pub fn zero_grad(&mut self) {
        for node in &mut self.nodes {
            node.grad = None;
        }
    }

    /// Propagates `seed` (dLoss/dTerminal) to every ancestor of `terminal`.
    ///
    /// Contributions from all consumers of a node are summed within the pass and then
    /// added to the node's accumulator, so repeated calls add up until `zero_grad`.
    /// Constants only keep the gradient of the latest pass. Nodes with backprop
    /// disabled neither receive nor propagate gradient.
    ///
    /// # Errors
    /// `ShapeMismatch` if the seed does not have the terminal's shape, or any forward
    /// error raised while evaluating the terminal.
    pub fn backward(&mut self, terminal: NodeId, seed: &Matrix) -> Result<(), GradGraphError> {
        let shape = self.forward(terminal)?.shape();
        if seed.shape() != shape {
            return Err(GradGraphError::shape(shape, seed.shape(), "backward"));
        }

        let order = self.ancestors(terminal, false);
        for &id in &order {
            if !self.is_cached(id) {
                self.evaluate(id)?;
            }
        }

        let mut grad_map: HashMap<NodeId, Matrix> = HashMap::new();
        grad_map.insert(terminal, seed.clone());
        let mut reached = 0usize;

        for &id in order.iter().rev() {
            let grad = match grad_map.remove(&id) {
                Some(grad) => grad,
                None => continue,
            };
            let node = &self.nodes[id.0];
            if !node.backprop {
                trace!("backward: {} {} is frozen", node.kind.label(), id);
                continue;
            }
            reached += 1;

            if let NodeKind::Function(op) = &node.kind {
                let mut inputs = Vec::with_capacity(node.inputs.len());
                for input in &node.inputs {
                    let value = self.nodes[input.0]
                        .value
                        .as_ref()
                        .ok_or(GradGraphError::Uncached { node: input.0 })?;
                    inputs.push(value);
                }
                let output = node
                    .value
                    .as_ref()
                    .ok_or(GradGraphError::Uncached { node: id.0 })?;
                let ctx = BackwardContext {
                    inputs,
                    output,
                    saved: &node.saved,
                    grad: &grad,
                };
                let input_grads = op.backward(&ctx)?;
                if input_grads.len() != node.inputs.len() {
                    return Err(GradGraphError::InternalError(format!(
                        "{} returned {} gradients for {} inputs",
                        op.name(),
                        input_grads.len(),
                        node.inputs.len()
                    )));
                }

                for (k, (&input, contribution)) in node.inputs.iter().zip(input_grads).enumerate() {
                    let contribution = match contribution {
                        Some(c) => c,
                        None => continue,
                    };
                    let expected = ctx.inputs[k].shape();
                    if contribution.shape() != expected {
                        return Err(GradGraphError::shape(
                            expected,
                            contribution.shape(),
                            op.name(),
                        ));
                    }
                    match grad_map.entry(input) {
                        Entry::Occupied(mut slot) => slot.get_mut().add_assign(&contribution)?,
                        Entry::Vacant(slot) => {
                            slot.insert(contribution);
                        }
                    }
                }
            }

            self.store_gradient(id, grad)?;
        }

        debug!(
            "backward from {}: {} of {} ancestors received gradient",
            terminal,
            reached,
            order.len()
        );
        Ok(())
    }

    fn store_gradient(&mut self, id: NodeId, grad: Matrix) -> Result<(), GradGraphError> {
        let node = &mut self.nodes[id.0];
        let latest_only = matches!(node.kind, NodeKind::Constant);
        match node.grad.as_mut() {
            Some(acc) if !latest_only => acc.add_assign(&grad)?,
            _ => node.grad = Some(grad),
        }
        Ok(())
    }

    /// Accumulated gradient of `id`; zeros when nothing has been accumulated yet.
    pub fn gradient(&self, id: NodeId) -> Result<Matrix, GradGraphError> {
        let node = self.node(id)?;
        if let Some(grad) = &node.grad {
            return Ok(grad.clone());
        }
        node.value
            .as_ref()
            .map(Matrix::zeros_like)
            .ok_or(GradGraphError::Uncached { node: id.0 })
    }

    /// Read-only counterpart of [`parameter_mut`](Graph::parameter_mut), used to
    /// validate a whole update before any value changes.
    pub(crate) fn parameter(&self, id: NodeId) -> Result<(&Matrix, Option<&Matrix>), GradGraphError> {
        let node = self.node(id)?;
        if !node.kind.is_leaf() {
            return Err(not_a_leaf(id, "update"));
        }
        let value = node
            .value
            .as_ref()
            .ok_or(GradGraphError::Uncached { node: id.0 })?;
        Ok((value, node.grad.as_ref()))
    }

    /// Value and accumulated gradient of a variable, for optimizers.
    pub(crate) fn parameter_mut(
        &mut self,
        id: NodeId,
    ) -> Result<(&mut Matrix, Option<&Matrix>), GradGraphError> {
        let node = self.node_mut(id)?;
        if !node.kind.is_leaf() {
            return Err(not_a_leaf(id, "update"));
        }
        let value = node
            .value
            .as_mut()
            .ok_or(GradGraphError::Uncached { node: id.0 })?;
        Ok((value, node.grad.as_ref()))
    }

    /// Enables or disables gradient flow through `id`.
    pub fn set_backprop(&mut self, id: NodeId, enabled: bool) -> Result<(), GradGraphError> {
        self.node_mut(id)?.backprop = enabled;
        Ok(())
    }

    pub fn is_backprop_enabled(&self, id: NodeId) -> Result<bool, GradGraphError> {
        Ok(self.node(id)?.backprop)
    }

    // --- Lookup ---

    /// All variables, in creation order.
    pub fn variables(&self) -> &[NodeId] {
        &self.variables
    }

    /// Variables that were given a name, keyed by name.
    pub fn named_variables(&self) -> BTreeMap<String, NodeId> {
        self.names
            .iter()
            .filter(|(_, id)| matches!(self.nodes[id.0].kind, NodeKind::Variable))
            .map(|(name, &id)| (name.clone(), id))
            .collect()
    }

    /// Tags `id` with `name` for later lookup through [`function`](Graph::function).
    pub fn name(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), GradGraphError> {
        self.node(id)?;
        self.names.insert(name.into(), id);
        Ok(())
    }

    /// Looks up a node tagged with [`name`](Graph::name).
    pub fn function(&self, name: &str) -> Result<NodeId, GradGraphError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| GradGraphError::NotFound(format!("no node named '{}'", name)))
    }

    /// The graph's random source, shared by stochastic nodes and client code.
    pub fn random(&mut self) -> &mut Rng {
        &mut self.rng
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of `recache` calls so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_variable(&self, id: NodeId) -> Result<bool, GradGraphError> {
        Ok(matches!(self.node(id)?.kind, NodeKind::Variable))
    }

    /// Shape of the value of `id`. Function nodes are evaluated when their cache is
    /// stale, so the shape is available right after building the graph.
    pub fn shape_of(&mut self, id: NodeId) -> Result<(usize, usize), GradGraphError> {
        Ok(self.forward(id)?.shape())
    }

    fn node(&self, id: NodeId) -> Result<&Node, GradGraphError> {
        self.nodes.get(id.0).ok_or(GradGraphError::UnknownNode(id.0))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GradGraphError> {
        self.nodes
            .get_mut(id.0)
            .ok_or(GradGraphError::UnknownNode(id.0))
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

fn not_a_leaf(id: NodeId, operation: &str) -> GradGraphError {
    GradGraphError::NotALeaf {
        node: id.0,
        operation: operation.to_string(),
    }
}

pub(crate) fn check_dims(rows: usize, cols: usize, operation: &str) -> Result<(), GradGraphError> {
    if rows == 0 || cols == 0 {
        return Err(GradGraphError::InvalidArgument(format!(
            "{}: shape must be positive, got {}x{}",
            operation, rows, cols
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "graph_test.rs"]
mod tests;
