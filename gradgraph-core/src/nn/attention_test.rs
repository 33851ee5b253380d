use super::*;
use crate::autograd::{check_gradients, GradCheckConfig, GradCheckError};
use approx::assert_relative_eq;

struct Inputs {
    q: NodeId,
    k: NodeId,
    v: NodeId,
    mask: NodeId,
}

fn small_inputs(g: &mut Graph) -> Result<Inputs, GradGraphError> {
    Ok(Inputs {
        q: g.new_variable_with(Matrix::from_rows(&[[1.0, 0.0], [0.0, 1.0]])?)?,
        k: g.new_variable_with(Matrix::from_rows(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]])?)?,
        v: g.new_variable_with(Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]])?)?,
        mask: g.new_constant_with(Matrix::from_rows(&[[1.0, 1.0, 0.0], [1.0, 1.0, 1.0]])?)?,
    })
}

#[test]
fn test_mask_bias() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(1);
    let inputs = small_inputs(&mut g)?;
    let bias = g.new_attention_mask_bias(inputs.q, inputs.k, Some(inputs.mask))?;
    let expected = Matrix::from_rows(&[[0.0, 0.0, Scalar::NEG_INFINITY], [0.0, 0.0, 0.0]])?;
    assert_eq!(g.forward(bias)?, &expected);

    let open = g.new_attention_mask_bias(inputs.q, inputs.k, None)?;
    assert_eq!(g.forward(open)?, &Matrix::zeros(2, 3));

    let wrong = g.new_constant(3, 2)?;
    let bad = g.new_attention_mask_bias(inputs.q, inputs.k, Some(wrong))?;
    assert!(matches!(
        g.forward(bad),
        Err(GradGraphError::ShapeMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_scaled_dot_product_attention_forward() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(1);
    let inputs = small_inputs(&mut g)?;
    let y = g.new_scaled_dot_product_attention(inputs.q, inputs.k, inputs.v, Some(inputs.mask), 2, 0.0)?;
    let expected = Matrix::from_rows(&[
        [1.660_476_901_346_686_2, 2.660_476_901_346_686_2],
        [3.406_672_556_078_715_4, 4.406_672_556_078_716],
    ])?;
    assert_relative_eq!(g.forward(y)?, &expected, max_relative = 1e-12);

    assert!(matches!(
        g.new_scaled_dot_product_attention(inputs.q, inputs.k, inputs.v, None, 0, 0.0),
        Err(GradGraphError::InvalidArgument(_))
    ));
    Ok(())
}

#[test]
fn test_scaled_dot_product_attention_backward() -> Result<(), GradCheckError> {
    let mut g = Graph::with_seed(2);
    let inputs = small_inputs(&mut g)?;
    let masked = g.new_scaled_dot_product_attention(inputs.q, inputs.k, inputs.v, Some(inputs.mask), 2, 0.0)?;
    let wrt = [inputs.q, inputs.k, inputs.v];
    let seed = g.random().uniform_matrix(2, 2, -1.0, 1.0);
    check_gradients(&mut g, masked, &wrt, Some(&seed), &GradCheckConfig::default())?;

    let q = g.new_variable(4, 3)?;
    let k = g.new_variable(5, 3)?;
    let v = g.new_variable(5, 3)?;
    let open = g.new_scaled_dot_product_attention(q, k, v, None, 3, 0.0)?;
    let seed = g.random().uniform_matrix(4, 3, -1.0, 1.0);
    check_gradients(&mut g, open, &[q, k, v], Some(&seed), &GradCheckConfig::default())
}

#[test]
fn test_attention_dropout_is_held_within_epoch() -> Result<(), GradCheckError> {
    let mut g = Graph::with_seed(3);
    let q = g.new_variable(6, 4)?;
    let k = g.new_variable(6, 4)?;
    let v = g.new_variable(6, 4)?;
    let y = g.new_scaled_dot_product_attention(q, k, v, None, 4, 0.5)?;
    let first = g.forward(y)?.clone();
    assert_eq!(g.forward(y)?, &first);
    check_gradients(&mut g, y, &[q, k, v], None, &GradCheckConfig::default())?;
    assert_eq!(g.forward(y)?, &first);
    Ok(())
}

#[test]
fn test_attention_config_validation() {
    assert!(AttentionConfig::new(8, 2).validate().is_ok());
    assert_eq!(AttentionConfig::new(8, 2).head_size(), 4);
    assert!(matches!(
        AttentionConfig::new(6, 4).validate(),
        Err(GradGraphError::ConfigurationError(_))
    ));
    assert!(AttentionConfig::new(0, 1).validate().is_err());
    assert!(AttentionConfig::new(4, 0).validate().is_err());
    assert!(AttentionConfig::new(4, 2).with_dropout(1.0).validate().is_err());
}

#[test]
fn test_multi_head_attention_splits_heads() -> Result<(), GradGraphError> {
    let (l, s, e) = (2, 3, 4);
    let mut g = Graph::with_seed(4);
    let q_value = g.random().uniform_matrix(l, e, -1.0, 1.0);
    let kv_value = g.random().uniform_matrix(s, e, -1.0, 1.0);
    let q = g.new_constant_with(q_value)?;
    let kv = g.new_constant_with(kv_value)?;
    let config = AttentionConfig::new(e, 2).with_bias(false);
    let mha = g.new_multi_head_attention(q, kv, kv, None, l, s, &config)?;
    assert_eq!(mha.parameters().len(), 4);
    for w in mha.parameters() {
        g.set_value(w, Matrix::from_fn(e, e, |r, c| if r == c { 1.0 } else { 0.0 }))?;
    }
    let y = g.forward(mha.output)?.clone();
    assert_eq!(y.shape(), (l, e));

    // with identity projections every head attends over its own column pair
    for head in 0..2 {
        let qh = g.new_split(q, 0, head * 2, l, 2)?;
        let kh = g.new_split(kv, 0, head * 2, s, 2)?;
        let single = g.new_scaled_dot_product_attention(qh, kh, kh, None, 2, 0.0)?;
        let expected = g.forward(single)?.clone();
        assert_relative_eq!(y.block(0, head * 2, l, 2)?, expected, epsilon = 1e-12);
    }
    Ok(())
}

#[test]
fn test_multi_head_attention_backward() -> Result<(), GradCheckError> {
    let (l, s, e) = (3, 4, 4);
    let mut g = Graph::with_seed(5);
    let q = g.new_variable(l, e)?;
    let k = g.new_variable(s, e)?;
    let v = g.new_variable(s, e)?;
    let mask = g.new_constant_with(Matrix::from_fn(l, s, |r, c| if c <= r + 1 { 1.0 } else { 0.0 }))?;
    let mha = g.new_multi_head_attention(q, k, v, Some(mask), l, s, &AttentionConfig::new(e, 2))?;
    assert_eq!(mha.parameters().len(), 8);
    for b in [mha.bq, mha.bk, mha.bv, mha.bo].into_iter().flatten() {
        let noise = g.random().uniform_matrix(1, e, -0.5, 0.5);
        g.set_value(b, noise)?;
    }
    g.recache();

    let mut wrt = vec![q, k, v];
    wrt.extend(mha.parameters());
    let seed = g.random().uniform_matrix(l, e, -1.0, 1.0);
    check_gradients(&mut g, mha.output, &wrt, Some(&seed), &GradCheckConfig::default())
}

#[test]
fn test_multi_head_attention_names_projections() -> Result<(), GradGraphError> {
    let mut g = Graph::with_seed(6);
    let x = g.new_constant(3, 4)?;
    let mha = g.new_multi_head_attention(x, x, x, None, 3, 3, &AttentionConfig::new(4, 2))?;

    let named = g.named_variables();
    assert_eq!(named.len(), 8);
    assert_eq!(named.get("MHA.Wq"), Some(&mha.wq));
    assert_eq!(named.get("MHA.Wo"), Some(&mha.wo));
    assert_eq!(named.get("MHA.bk").copied(), mha.bk);
    assert_eq!(g.function("MHA.bo").ok(), mha.bo);

    let config = AttentionConfig::new(4, 2).with_bias(false);
    let unbiased = g.new_multi_head_attention(x, x, x, None, 3, 3, &config)?;
    assert_eq!(g.function("MHA.Wv")?, unbiased.wv);
    assert_eq!(g.function("MHA.bv")?, mha.bv.ok_or(GradGraphError::NotFound("bv".into()))?);
    Ok(())
}
