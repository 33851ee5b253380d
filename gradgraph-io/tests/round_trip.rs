use approx::assert_relative_eq;
use gradgraph_core::optim::{Optimizer, Sgd};
use gradgraph_core::{GradGraphError, Graph, Matrix, NodeId};
use gradgraph_io::{load_checkpoint, save_checkpoint, SerializationError, WeightExchange};
use std::io::Cursor;

/// A small two-layer network; returns the graph, its input and its output.
fn network(seed: u64) -> Result<(Graph, NodeId, NodeId), GradGraphError> {
    let mut g = Graph::with_seed(seed);
    let x = g.new_constant(3, 4)?;
    let hidden = g.new_linear(x, 4, 6, true)?;
    let activated = g.new_tanh(hidden.output)?;
    let out = g.new_linear(activated, 6, 2, true)?;
    Ok((g, x, out.output))
}

fn train_steps(g: &mut Graph, x: NodeId, y: NodeId, steps: usize) -> Result<(), GradGraphError> {
    let loss = g.new_sum(y)?;
    let mut sgd = Sgd::new(g.variables().to_vec(), 0.01)?;
    let input = g.random().uniform_matrix(3, 4, -1.0, 1.0);
    g.set_value(x, input)?;
    for _ in 0..steps {
        g.zero_grad();
        g.recache();
        g.backward(loss, &Matrix::scalar(1.0))?;
        sgd.update(g)?;
    }
    g.recache();
    Ok(())
}

#[test]
fn test_checkpoint_reproduces_outputs() -> Result<(), SerializationError> {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mut trained, x, y) = network(1)?;
    train_steps(&mut trained, x, y, 5)?;

    let mut buffer = Vec::new();
    save_checkpoint(&trained, &mut buffer)?;

    let (mut restored, x2, y2) = network(2)?;
    load_checkpoint(&mut restored, &mut Cursor::new(buffer))?;

    let input = Matrix::from_fn(3, 4, |r, c| (r as f64 - c as f64) * 0.3);
    trained.set_value(x, input.clone())?;
    restored.set_value(x2, input)?;
    trained.recache();
    restored.recache();
    let expected = trained.forward(y)?.clone();
    assert_relative_eq!(restored.forward(y2)?, &expected, epsilon = 1e-15);
    Ok(())
}

#[test]
fn test_deltas_from_two_workers_accumulate() -> Result<(), SerializationError> {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mut leader, _, _) = network(3)?;
    let mut leader_sync = WeightExchange::new(&leader)?;
    let start: Vec<Matrix> = leader
        .variables()
        .iter()
        .map(|&id| leader.value(id).cloned())
        .collect::<Result<_, _>>()?;

    let mut deltas = Vec::new();
    for seed in [4, 5] {
        let (mut worker, x, y) = network(seed)?;
        let mut sync = WeightExchange::new(&worker)?;

        let mut weights = Vec::new();
        leader_sync.encode_weights(&leader, &mut weights)?;
        sync.apply_weights(&mut worker, &mut Cursor::new(weights))?;

        train_steps(&mut worker, x, y, 3)?;
        let mut delta = Vec::new();
        sync.encode_delta(&worker, &mut delta)?;
        deltas.push(delta);
    }
    for delta in &deltas {
        leader_sync.apply_delta(&mut leader, &mut Cursor::new(delta.as_slice()))?;
    }

    let variables = leader.variables().to_vec();
    let moved = variables
        .iter()
        .zip(&start)
        .any(|(&id, before)| leader.value(id).map(|now| now != before).unwrap_or(false));
    assert!(moved, "leader weights did not change");
    Ok(())
}
