use crate::error::SerializationError;
use crate::wire::{read_matrices, write_matrices};
use gradgraph_core::{GradGraphError, Graph, Matrix, NodeId};
use log::debug;
use std::io::{Read, Write};

fn check_shape(expected: &Matrix, actual: &Matrix, operation: &str) -> Result<(), GradGraphError> {
    if expected.shape() != actual.shape() {
        return Err(GradGraphError::ShapeMismatch {
            expected: expected.shape(),
            actual: actual.shape(),
            operation: operation.to_string(),
        });
    }
    Ok(())
}

/// Weight synchronization between copies of the same model.
///
/// Holds the variable values as of the last full-weight synchronization
/// ([`encode_weights`](Self::encode_weights) or [`apply_weights`](Self::apply_weights)).
/// Every delta is measured against that snapshot until the next full sync, so a
/// worker reports everything it learned since it received the weights and a
/// coordinator folds several workers' deltas into its own copy.
#[derive(Debug, Clone)]
pub struct WeightExchange {
    variables: Vec<NodeId>,
    snapshot: Vec<Matrix>,
}

impl WeightExchange {
    /// Tracks every variable of `graph`, snapshotting their current values.
    pub fn new(graph: &Graph) -> Result<Self, SerializationError> {
        Self::for_variables(graph, graph.variables().to_vec())
    }

    /// Tracks `variables` only, in the given order.
    pub fn for_variables(graph: &Graph, variables: Vec<NodeId>) -> Result<Self, SerializationError> {
        let snapshot = Self::current(graph, &variables)?;
        Ok(WeightExchange {
            variables,
            snapshot,
        })
    }

    pub fn variables(&self) -> &[NodeId] {
        &self.variables
    }

    fn current(graph: &Graph, variables: &[NodeId]) -> Result<Vec<Matrix>, SerializationError> {
        variables
            .iter()
            .map(|&id| graph.value(id).cloned().map_err(SerializationError::from))
            .collect()
    }

    fn check_count(&self, found: usize) -> Result<(), SerializationError> {
        if found != self.variables.len() {
            return Err(SerializationError::CountMismatch {
                expected: self.variables.len(),
                found,
            });
        }
        Ok(())
    }

    /// Writes the absolute values of the tracked variables and makes them the new
    /// snapshot.
    pub fn encode_weights<W: Write>(&mut self, graph: &Graph, writer: &mut W) -> Result<(), SerializationError> {
        let current = Self::current(graph, &self.variables)?;
        write_matrices(writer, &current)?;
        self.snapshot = current;
        Ok(())
    }

    /// Overwrites the tracked variables with absolute values and re-snapshots.
    ///
    /// The stream is fully validated against the variables' shapes before any
    /// value is written.
    pub fn apply_weights<R: Read>(&mut self, graph: &mut Graph, reader: &mut R) -> Result<(), SerializationError> {
        let weights = read_matrices(reader)?;
        self.check_count(weights.len())?;
        for (weight, old) in weights.iter().zip(&self.snapshot) {
            check_shape(old, weight, "apply_weights")?;
        }
        for (&id, weight) in self.variables.iter().zip(&weights) {
            graph.set_value(id, weight.clone())?;
        }
        self.snapshot = weights;
        graph.recache();
        debug!("exchange: applied weights for {} variables", self.variables.len());
        Ok(())
    }

    /// Writes `current - snapshot` per tracked variable. The snapshot is unchanged.
    pub fn encode_delta<W: Write>(&self, graph: &Graph, writer: &mut W) -> Result<(), SerializationError> {
        let current = Self::current(graph, &self.variables)?;
        let deltas = current
            .iter()
            .zip(&self.snapshot)
            .map(|(now, before)| now.sub(before))
            .collect::<Result<Vec<_>, _>>()?;
        write_matrices(writer, &deltas)?;
        debug!("exchange: encoded delta for {} variables", self.variables.len());
        Ok(())
    }

    /// Adds a delta to the tracked variables (`current += delta`). The snapshot is
    /// unchanged.
    pub fn apply_delta<R: Read>(&self, graph: &mut Graph, reader: &mut R) -> Result<(), SerializationError> {
        let deltas = read_matrices(reader)?;
        self.check_count(deltas.len())?;
        for (delta, old) in deltas.iter().zip(&self.snapshot) {
            check_shape(old, delta, "apply_delta")?;
        }
        for (&id, delta) in self.variables.iter().zip(&deltas) {
            graph.value_mut(id)?.add_assign(delta)?;
        }
        graph.recache();
        debug!("exchange: applied delta for {} variables", self.variables.len());
        Ok(())
    }
}

#[cfg(test)]
#[path = "exchange_test.rs"]
mod tests;
