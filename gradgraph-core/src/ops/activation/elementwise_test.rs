use super::*;
use crate::autograd::{check_gradients, GradCheckConfig, GradCheckError};
use crate::matrix::Matrix;
use approx::{assert_abs_diff_eq, assert_relative_eq};

fn row(values: &[Scalar]) -> Matrix {
    Matrix::row_vector(values.to_vec())
}

#[test]
fn test_erf_values() {
    assert_relative_eq!(erf(1.0), 0.842_700_792_95, epsilon = 1e-10);
    assert_eq!(erf(0.0), 0.0);
    assert_relative_eq!(erf(-3.0), -0.999_977_909_5, epsilon = 1e-10);
    assert_relative_eq!(erf(4.0), 0.999_999_984_58, epsilon = 1e-10);
    // both branches agree at the switch point
    assert_abs_diff_eq!(erf(2.999_999_999), erf(3.0), epsilon = 1e-12);
    assert!(erf(Scalar::NAN).is_nan());
    assert_eq!(erf(40.0), 1.0);
}

#[test]
fn test_erf_node_backward() -> Result<(), GradCheckError> {
    let mut g = Graph::with_seed(1);
    let x = g.new_variable_with(row(&[1.0, 0.0, -3.0, 4.0, 0.3]))?;
    let y = g.new_erf(x)?;
    check_gradients(&mut g, y, &[x], None, &GradCheckConfig::elementwise())
}

#[test]
fn test_gelu_forward_backward() -> Result<(), GradCheckError> {
    let mut g = Graph::with_seed(1);
    let x = g.new_variable_with(row(&[-2.0, -1.0, -0.5, 0.0, 0.5, -3.0, 4.0]))?;
    let y = g.new_gelu(x)?;
    let expected = row(&[
        -0.045_500_3,
        -0.158_655_3,
        -0.154_268_8,
        0.0,
        0.345_731_2,
        -0.004_049_7,
        3.999_873_3,
    ]);
    assert_abs_diff_eq!(g.forward(y)?, &expected, epsilon = 1e-6);

    g.backward(y, &Matrix::ones(1, 7))?;
    let expected_grad = row(&[
        -0.085_231_8,
        -0.083_315_5,
        0.132_504_9,
        0.5,
        0.867_495_1,
        -0.011_945_6,
        1.000_503_6,
    ]);
    assert_abs_diff_eq!(g.gradient(x)?, expected_grad, epsilon = 1e-6);
    check_gradients(&mut g, y, &[x], None, &GradCheckConfig::elementwise())
}

#[test]
fn test_softplus_is_stable() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(1);
    let x = g.new_variable_with(row(&[-100.0, -1.0, 0.0, -3.0, 4.0, 100.0]))?;
    let y = g.new_softplus(x)?;
    let expected = row(&[
        0.0,
        0.313_261_688,
        0.693_147_181,
        0.048_587_351_6,
        4.018_149_93,
        100.0,
    ]);
    assert_abs_diff_eq!(g.forward(y)?, &expected, epsilon = 1e-8);

    g.backward(y, &Matrix::ones(1, 6))?;
    let grad = g.gradient(x)?;
    assert_relative_eq!(grad.get(0, 0), 3.720_075_976e-44, max_relative = 1e-6);
    let expected_grad = row(&[0.0, 0.268_941_421, 0.5, 0.047_425_873_2, 0.982_013_79, 1.0]);
    assert_abs_diff_eq!(grad, expected_grad, epsilon = 1e-8);
    Ok(())
}

#[test]
fn test_smooth_activations_backward() -> Result<(), GradCheckError> {
    let mut g = Graph::with_seed(4);
    let x = g.new_variable(4, 5)?;
    let t = g.new_tanh(x)?;
    let s = g.new_sigmoid(t)?;
    let p = g.new_softplus(s)?;
    let l = g.new_log(p)?;
    check_gradients(&mut g, l, &[x], None, &GradCheckConfig::elementwise())
}

#[test]
fn test_relu() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(1);
    let x = g.new_variable_with(row(&[-2.0, -1.0, 0.0, 1.0, 2.0]))?;
    let y = g.new_relu(x)?;
    assert_eq!(g.forward(y)?, &row(&[0.0, 0.0, 0.0, 1.0, 2.0]));
    g.backward(y, &Matrix::ones(1, 5))?;
    assert_eq!(g.gradient(x)?, row(&[0.0, 0.0, 0.0, 1.0, 1.0]));
    Ok(())
}

#[test]
fn test_log_of_zero_propagates_infinity() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(1);
    let x = g.new_variable_with(row(&[0.0, 1.0]))?;
    let y = g.new_log(x)?;
    assert_eq!(g.forward(y)?.get(0, 0), Scalar::NEG_INFINITY);
    g.backward(y, &Matrix::ones(1, 2))?;
    assert_eq!(g.gradient(x)?.get(0, 0), Scalar::INFINITY);
    Ok(())
}
