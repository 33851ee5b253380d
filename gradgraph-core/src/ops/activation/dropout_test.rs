use super::*;

#[test]
fn test_dropout_rejects_bad_rate() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(1);
    let x = g.new_constant(2, 2)?;
    assert!(matches!(
        g.new_dropout(x, 1.0),
        Err(GradGraphError::InvalidArgument(_))
    ));
    assert!(g.new_dropout(x, -0.1).is_err());
    assert!(g.new_dropout(x, Scalar::NAN).is_err());
    Ok(())
}

#[test]
fn test_dropout_rate_and_gradient() -> Result<(), GradGraphError> {
    let (rows, cols) = (100, 100);
    let rate = 0.3;
    let mut g = Graph::with_seed(11);
    let x = g.new_variable_with(Matrix::ones(rows, cols))?;
    let y = g.new_dropout(x, rate)?;

    let value = g.forward(y)?.clone();
    let dropped = value.as_slice().iter().filter(|&&v| v == 0.0).count();
    let measured = dropped as Scalar / (rows * cols) as Scalar;
    assert!((measured - rate).abs() < 0.02, "measured rate {}", measured);
    // kept entries are not rescaled
    assert!(value.as_slice().iter().all(|&v| v == 0.0 || v == 1.0));

    g.backward(y, &Matrix::ones(rows, cols))?;
    assert_eq!(g.gradient(x)?, value);
    Ok(())
}

#[test]
fn test_dropout_zero_rate_is_identity() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(2);
    let x = g.new_variable(4, 4)?;
    let y = g.new_dropout(x, 0.0)?;
    let expected = g.value(x)?.clone();
    assert_eq!(g.forward(y)?, &expected);
    Ok(())
}
