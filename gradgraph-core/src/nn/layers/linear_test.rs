use super::*;
use crate::autograd::{check_gradients, GradCheckConfig, GradCheckError};
use approx::assert_relative_eq;

#[test]
fn test_linear_forward() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(1);
    let x = g.new_constant_with(Matrix::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])?)?;
    let layer = g.new_linear(x, 3, 4, true)?;
    let bias = layer.bias.ok_or(GradGraphError::NotFound("bias".into()))?;

    assert_eq!(g.value(layer.weight)?.shape(), (4, 3));
    assert_eq!(g.value(bias)?, &Matrix::zeros(1, 4));

    g.set_value(
        layer.weight,
        Matrix::from_rows(&[
            [0.5210, -0.3797, 0.2674],
            [-0.5357, -0.1399, 0.0647],
            [0.3203, 0.0407, -0.3343],
            [0.2107, -0.1692, 0.5243],
        ])?,
    )?;
    g.set_value(bias, Matrix::row_vector(vec![0.3992, 0.3767, 0.5552, -0.2610]))?;

    let expected = Matrix::from_rows(&[
        [0.9630, -0.2447, -0.0460, 1.1842],
        [2.1891, -2.0774, 0.0341, 2.8816],
    ])?;
    assert_relative_eq!(g.forward(layer.output)?, &expected, epsilon = 1e-12);
    Ok(())
}

#[test]
fn test_linear_without_bias() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(2);
    let x = g.new_constant_with(Matrix::row_vector(vec![1.0, -1.0]))?;
    let layer = g.new_linear(x, 2, 3, false)?;
    assert!(layer.bias.is_none());
    assert_eq!(g.variables(), &[layer.weight]);
    assert_eq!(g.forward(layer.output)?.shape(), (1, 3));

    assert!(matches!(
        g.new_linear(x, 0, 3, true),
        Err(GradGraphError::InvalidArgument(_))
    ));
    Ok(())
}

#[test]
fn test_linear_backward() -> Result<(), GradCheckError> {
    let mut g = Graph::with_seed(3);
    let x = g.new_variable(5, 4)?;
    let layer = g.new_linear(x, 4, 3, true)?;
    let bias = layer.bias.ok_or(GradGraphError::NotFound("bias".into()))?;
    g.set_value(bias, Matrix::row_vector(vec![0.1, -0.2, 0.3]))?;
    let seed = g.random().uniform_matrix(5, 3, -1.0, 1.0);
    check_gradients(
        &mut g,
        layer.output,
        &[x, layer.weight, bias],
        Some(&seed),
        &GradCheckConfig::default(),
    )
}
