use crate::error::SerializationError;
use crate::wire::{read_matrices, write_matrices};
use gradgraph_core::{GradGraphError, Graph, Matrix};
use log::{info, warn};
use std::io::{Read, Write};

/// Writes the absolute values of every variable of `graph`, in creation order.
pub fn save_checkpoint<W: Write>(graph: &Graph, writer: &mut W) -> Result<(), SerializationError> {
    let values = graph
        .variables()
        .iter()
        .map(|&id| graph.value(id))
        .collect::<Result<Vec<&Matrix>, _>>()?;
    write_matrices(writer, values)?;
    info!("checkpoint: saved {} variables", graph.variables().len());
    Ok(())
}

/// Restores variable values written by [`save_checkpoint`].
///
/// Matrices are assigned to the graph's variables in creation order. When the
/// checkpoint holds more matrices than the graph has variables, the rest become
/// new variables; when it holds fewer, the remaining variables keep their values.
/// Cached function values are invalidated.
///
/// # Errors
/// `Graph(ShapeMismatch)` when a stored matrix does not have its variable's shape.
/// Shapes are checked before anything is written, so a failed load leaves the
/// graph untouched.
pub fn load_checkpoint<R: Read>(graph: &mut Graph, reader: &mut R) -> Result<(), SerializationError> {
    let matrices = read_matrices(reader)?;
    let existing = graph.variables().to_vec();
    if matrices.len() < existing.len() {
        warn!(
            "checkpoint: {} matrices for {} variables, the rest keep their values",
            matrices.len(),
            existing.len()
        );
    }

    for (&id, matrix) in existing.iter().zip(&matrices) {
        let expected = graph.value(id)?.shape();
        if expected != matrix.shape() {
            return Err(GradGraphError::ShapeMismatch {
                expected,
                actual: matrix.shape(),
                operation: "load_checkpoint".to_string(),
            }
            .into());
        }
    }

    let mut created = 0usize;
    for (i, matrix) in matrices.into_iter().enumerate() {
        match existing.get(i) {
            Some(&id) => graph.set_value(id, matrix)?,
            None => {
                graph.new_variable_with(matrix)?;
                created += 1;
            }
        }
    }
    if created > 0 {
        warn!("checkpoint: created {} new variables", created);
    }
    graph.recache();
    info!("checkpoint: loaded into {} variables", graph.variables().len());
    Ok(())
}

#[cfg(test)]
#[path = "checkpoint_test.rs"]
mod tests;
