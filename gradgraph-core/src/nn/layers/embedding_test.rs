use super::*;
use crate::autograd::{check_gradients, GradCheckConfig, GradCheckError};

#[test]
fn test_embedding_forward() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(1);
    let tokens = g.new_constant_with(Matrix::column_vector(vec![1.0, 3.0]))?;
    let embedding = g.new_embedding(tokens, 10, 5)?;

    let table = g.value(embedding.table)?.clone();
    let y = g.forward(embedding.output)?;
    assert_eq!(y.shape(), (2, 5));
    assert_eq!(y.row(0), table.row(1));
    assert_eq!(y.row(1), table.row(3));
    Ok(())
}

#[test]
fn test_embedding_backward() -> Result<(), GradCheckError> {
    let mut g = Graph::with_seed(1);
    let tokens = g.new_constant_with(Matrix::column_vector(vec![2.0, 3.0]))?;
    let embedding = g.new_embedding(tokens, 10, 5)?;
    g.backward(embedding.output, &Matrix::ones(2, 5))?;

    let mut expected = Matrix::zeros(10, 5);
    expected.row_mut(2).fill(1.0);
    expected.row_mut(3).fill(1.0);
    assert_eq!(g.gradient(embedding.table)?, expected);
    assert_eq!(g.gradient(tokens)?, Matrix::zeros(2, 1));

    check_gradients(&mut g, embedding.output, &[embedding.table], None, &GradCheckConfig::default())
}

#[test]
fn test_embedding_repeated_tokens_accumulate() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(2);
    let tokens = g.new_constant_with(Matrix::from_rows(&[[4.0, 0.0], [4.0, 4.0]])?)?;
    let embedding = g.new_embedding(tokens, 6, 3)?;
    assert_eq!(g.forward(embedding.output)?.shape(), (4, 3));

    g.backward(embedding.output, &Matrix::ones(4, 3))?;
    let grad = g.gradient(embedding.table)?;
    assert_eq!(grad.row(4), &[3.0, 3.0, 3.0]);
    assert_eq!(grad.row(0), &[1.0, 1.0, 1.0]);
    assert_eq!(grad.row(1), &[0.0, 0.0, 0.0]);
    Ok(())
}

#[test]
fn test_embedding_rejects_bad_tokens() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(3);
    let tokens = g.new_constant_with(Matrix::column_vector(vec![10.0]))?;
    let embedding = g.new_embedding(tokens, 10, 2)?;
    assert!(matches!(
        g.forward(embedding.output),
        Err(GradGraphError::IndexOutOfBounds { index: 10, bound: 10, .. })
    ));

    g.set_value(tokens, Matrix::column_vector(vec![1.5]))?;
    g.recache();
    assert!(matches!(
        g.forward(embedding.output),
        Err(GradGraphError::InvalidArgument(_))
    ));
    Ok(())
}
