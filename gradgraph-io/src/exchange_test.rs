use super::*;
use approx::assert_relative_eq;
use std::io::Cursor;

fn model(seed: u64) -> Result<(Graph, NodeId, NodeId), GradGraphError> {
    let mut g = Graph::with_seed(seed);
    let w = g.new_variable(2, 2)?;
    let b = g.new_variable(1, 2)?;
    Ok((g, w, b))
}

#[test]
fn test_weights_synchronize_replicas() -> Result<(), SerializationError> {
    let (leader, w, b) = model(1)?;
    let (mut follower, w2, b2) = model(2)?;
    let mut sender = WeightExchange::new(&leader)?;
    let mut receiver = WeightExchange::new(&follower)?;

    let mut buffer = Vec::new();
    sender.encode_weights(&leader, &mut buffer)?;
    receiver.apply_weights(&mut follower, &mut Cursor::new(buffer))?;
    assert_eq!(follower.value(w2)?, leader.value(w)?);
    assert_eq!(follower.value(b2)?, leader.value(b)?);

    // nothing changed since the sync, so the delta is all zeros
    let mut delta = Vec::new();
    receiver.encode_delta(&follower, &mut delta)?;
    let zeros = read_matrices(&mut Cursor::new(delta))?;
    assert_eq!(zeros, vec![Matrix::zeros(2, 2), Matrix::zeros(1, 2)]);
    Ok(())
}

fn decode(buffer: Vec<u8>) -> Result<Vec<Matrix>, SerializationError> {
    read_matrices(&mut Cursor::new(buffer))
}

#[test]
fn test_delta_carries_local_progress() -> Result<(), SerializationError> {
    let (mut worker, w, _) = model(3)?;
    let (mut leader, lw, _) = model(3)?;
    let worker_sync = WeightExchange::new(&worker)?;
    let leader_sync = WeightExchange::new(&leader)?;
    let start = leader.value(lw)?.clone();

    worker.value_mut(w)?.add_assign(&Matrix::filled(2, 2, 0.25))?;
    let mut buffer = Vec::new();
    worker_sync.encode_delta(&worker, &mut buffer)?;
    leader_sync.apply_delta(&mut leader, &mut Cursor::new(buffer))?;
    assert_relative_eq!(leader.value(lw)?, &start.map(|v| v + 0.25), epsilon = 1e-12);
    Ok(())
}

#[test]
fn test_delta_is_measured_from_last_weight_sync() -> Result<(), SerializationError> {
    let (mut worker, w, _) = model(5)?;
    let mut sync = WeightExchange::new(&worker)?;

    worker.value_mut(w)?.add_assign(&Matrix::filled(2, 2, 1.0))?;
    let mut first = Vec::new();
    sync.encode_delta(&worker, &mut first)?;
    let mut second = Vec::new();
    sync.encode_delta(&worker, &mut second)?;
    assert_eq!(first, second);

    // more local training: the delta covers both steps
    worker.value_mut(w)?.add_assign(&Matrix::filled(2, 2, 0.5))?;
    let mut third = Vec::new();
    sync.encode_delta(&worker, &mut third)?;
    assert_relative_eq!(&decode(third)?[0], &Matrix::filled(2, 2, 1.5), epsilon = 1e-12);

    // an applied delta also counts as local change
    let mut incoming = Vec::new();
    write_matrices(&mut incoming, &[Matrix::filled(2, 2, 2.0), Matrix::zeros(1, 2)])?;
    sync.apply_delta(&mut worker, &mut Cursor::new(incoming))?;
    let mut fourth = Vec::new();
    sync.encode_delta(&worker, &mut fourth)?;
    assert_relative_eq!(&decode(fourth)?[0], &Matrix::filled(2, 2, 3.5), epsilon = 1e-12);

    // a full sync resets the reference point
    sync.encode_weights(&worker, &mut Vec::new())?;
    let mut fifth = Vec::new();
    sync.encode_delta(&worker, &mut fifth)?;
    assert!(decode(fifth)?.iter().all(|d| d.as_slice().iter().all(|&v| v == 0.0)));
    Ok(())
}

#[test]
fn test_mismatched_streams_are_rejected() -> Result<(), SerializationError> {
    let (mut g, w, b) = model(4)?;
    let before = g.value(w)?.clone();
    let mut exchange = WeightExchange::for_variables(&g, vec![w, b])?;

    let mut short = Vec::new();
    write_matrices(&mut short, &[Matrix::zeros(2, 2)])?;
    assert!(matches!(
        exchange.apply_delta(&mut g, &mut Cursor::new(short)),
        Err(SerializationError::CountMismatch { expected: 2, found: 1 })
    ));

    let mut misshaped = Vec::new();
    write_matrices(&mut misshaped, &[Matrix::ones(2, 2), Matrix::ones(2, 1)])?;
    assert!(matches!(
        exchange.apply_weights(&mut g, &mut Cursor::new(misshaped)),
        Err(SerializationError::Graph(GradGraphError::ShapeMismatch { .. }))
    ));
    // validation happens before any write
    assert_eq!(g.value(w)?, &before);
    Ok(())
}
