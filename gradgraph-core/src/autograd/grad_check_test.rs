use super::*;
use approx::assert_relative_eq;

#[test]
fn test_dfdx_of_square() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(1);
    let x = g.new_variable_with(Matrix::row_vector(vec![1.0, -2.0, 0.5]))?;
    let y = g.new_mul(x, x)?;
    let numerical = g.dfdx(y, x)?;
    assert_relative_eq!(
        numerical,
        Matrix::row_vector(vec![2.0, -4.0, 1.0]),
        max_relative = 1e-6
    );
    // value and cache are restored
    assert_eq!(g.value(x)?, &Matrix::row_vector(vec![1.0, -2.0, 0.5]));
    assert_eq!(g.forward(y)?, &Matrix::row_vector(vec![1.0, 4.0, 0.25]));
    Ok(())
}

#[test]
fn test_dfdx_seeded_and_entry() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(1);
    let a = g.new_variable_with(Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]])?)?;
    let b = g.new_constant_with(Matrix::from_rows(&[[5.0, 6.0], [7.0, 8.0]])?)?;
    let y = g.new_product(a, b)?;

    // dy[0,1]/da[0,1] = b[1,1]
    let entry = g.dfdx_entry(y, a, 0, 1, 0, 1)?;
    assert_relative_eq!(entry, 8.0, max_relative = 1e-6);
    assert_relative_eq!(g.dfdx_entry(y, a, 1, 0, 0, 1)?, 0.0, epsilon = 1e-6);
    assert!(matches!(
        g.dfdx_entry(y, a, 2, 0, 0, 0),
        Err(GradGraphError::IndexOutOfBounds { .. })
    ));

    let seed = Matrix::from_rows(&[[1.0, 0.0], [0.0, 2.0]])?;
    let numerical = g.dfdx_seeded(y, a, &seed)?;
    // seed * b^T
    let expected = Matrix::from_rows(&[[5.0, 7.0], [12.0, 16.0]])?;
    assert_relative_eq!(numerical, expected, max_relative = 1e-6);

    assert!(g.dfdx_seeded(y, a, &Matrix::ones(1, 2)).is_err());
    Ok(())
}

#[test]
fn test_dfdx_holds_dropout_mask() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(4);
    let x = g.new_variable(5, 5)?;
    let y = g.new_dropout(x, 0.5)?;
    let before = g.forward(y)?.clone();

    let numerical = g.dfdx(y, x)?;
    let mask = before.zip_map(g.value(x)?, "mask", |d, v| if d == v { 1.0 } else { 0.0 })?;
    assert_relative_eq!(numerical, mask, epsilon = 1e-6);
    assert_eq!(g.forward(y)?, &before);
    Ok(())
}

#[test]
fn test_check_gradients_passes_and_reports_mismatch() -> Result<(), GradCheckError> {
    let mut g = Graph::with_seed(2);
    let x = g.new_variable(3, 4)?;
    let y = g.new_tanh(x)?;
    check_gradients(&mut g, y, &[x], None, &GradCheckConfig::elementwise())?;

    // a wildly wrong tolerance-free comparison must fail
    let accepts_nothing = GradCheckConfig {
        step: 1e-1,
        rtol: 1e-12,
        atol: 1e-12,
    };
    let result = check_gradients(&mut g, y, &[x], None, &accepts_nothing);
    assert!(matches!(result, Err(GradCheckError::GradientMismatch { .. })));
    Ok(())
}

#[test]
fn test_config_validation_and_tolerance() {
    assert!(GradCheckConfig::new(1e-6, 1e-2, 1e-6).is_ok());
    assert!(matches!(
        GradCheckConfig::new(0.0, 1e-2, 1e-6),
        Err(GradGraphError::ConfigurationError(_))
    ));
    assert!(GradCheckConfig::new(1e-6, Scalar::NAN, 1e-6).is_err());

    let config = GradCheckConfig::default();
    assert!(config.accepts(1.0, 1.005));
    assert!(!config.accepts(1.0, 1.1));
    assert!(config.accepts(Scalar::INFINITY, Scalar::INFINITY));
    assert!(!config.accepts(Scalar::INFINITY, Scalar::NEG_INFINITY));
    assert!(config.with_rtol(0.2).accepts(1.0, 1.1));
}
