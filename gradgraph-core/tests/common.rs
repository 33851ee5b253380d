use gradgraph_core::{GradGraphError, Graph, Matrix, NodeId};

// Shared by several test crates; not every crate uses every helper.
#[allow(dead_code)]
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Sum of squared differences between `prediction` and a new target constant.
/// Returns `(target, loss)`.
#[allow(dead_code)]
pub fn squared_error(g: &mut Graph, prediction: NodeId) -> Result<(NodeId, NodeId), GradGraphError> {
    let (rows, cols) = g.shape_of(prediction)?;
    let target = g.new_constant(rows, cols)?;
    let diff = g.new_sub(target, prediction)?;
    let squared = g.new_mul(diff, diff)?;
    let loss = g.new_sum(squared)?;
    Ok((target, loss))
}

/// Feeds new leaf values, invalidates the cache and returns the scalar loss.
#[allow(dead_code)]
pub fn evaluate(
    g: &mut Graph,
    feeds: Vec<(NodeId, Matrix)>,
    loss: NodeId,
) -> Result<f64, GradGraphError> {
    for (id, value) in feeds {
        g.set_value(id, value)?;
    }
    g.recache();
    Ok(g.forward(loss)?.get(0, 0))
}
