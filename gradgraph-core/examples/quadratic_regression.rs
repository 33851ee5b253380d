//! # Fitting a Quadratic Map with Adam
//!
//! Builds `y = (x * x) A + x B^T + c` on a [`Graph`], draws random targets from a
//! hidden quadratic map and trains the variables with [`Adam`] on mini-batches of
//! accumulated gradients.
//!
//! ## Steps shown
//! 1. Constants for the input and target, variables for the parameters.
//! 2. A squared-error loss assembled from graph operators.
//! 3. Per sample: set the constants, `recache`, `backward`.
//! 4. Per batch: `update` then `zero_grad`.
//!
//! ## Running
//! `RUST_LOG=info cargo run --example quadratic_regression`

use gradgraph_core::optim::{Adam, Optimizer};
use gradgraph_core::{GradGraphError, Graph, Matrix, Rng};
use log::info;

const SIZE: usize = 5;
const BATCH: usize = 4;
const MAX_STEPS: usize = 20_000;
const TARGET_LOSS: f64 = 1e-3;

fn main() -> Result<(), GradGraphError> {
    env_logger::init();

    let mut g = Graph::with_seed(42);
    let mut data = Rng::seeded(7);

    let x = g.new_constant(1, SIZE)?;
    let xx = g.new_mul(x, x)?;
    let a = g.new_named_variable(SIZE, SIZE, "A")?;
    let quadratic = g.new_product(xx, a)?;
    let linear = g.new_linear(x, SIZE, SIZE, true)?;
    let y = g.new_add(quadratic, linear.output)?;

    let target = g.new_constant(1, SIZE)?;
    let diff = g.new_sub(target, y)?;
    let squared = g.new_mul(diff, diff)?;
    let loss = g.new_sum(squared)?;

    let true_a = data.uniform_matrix(SIZE, SIZE, -1.0, 1.0);
    let true_b = data.uniform_matrix(SIZE, SIZE, -1.0, 1.0);
    let true_c = data.uniform_matrix(1, SIZE, -1.0, 1.0);

    let mut adam = Adam::new(g.variables().to_vec(), 0.01)?;
    let mut step = 0;
    let mut last = f64::INFINITY;
    'training: while step < MAX_STEPS {
        for _ in 0..BATCH {
            step += 1;
            let tx = data.uniform_matrix(1, SIZE, -1.0, 1.0);
            let ty = tx
                .hadamard(&tx)?
                .matmul(&true_a)?
                .add(&tx.matmul(&true_b)?)?
                .add(&true_c)?;

            g.recache();
            g.set_value(x, tx)?;
            g.set_value(target, ty)?;
            last = g.forward(loss)?.get(0, 0);
            if last < TARGET_LOSS {
                break 'training;
            }
            g.backward(loss, &Matrix::scalar(1.0))?;
        }
        adam.update(&mut g)?;
        g.zero_grad();

        if step % 2000 == 0 {
            info!("step {:>6}: loss {:.6}", step, last);
        }
    }

    info!("stopped after {} samples with loss {:.6}", step, last);
    println!("samples: {}, final loss: {:.6}", step, last);
    println!("learned A:\n{:?}", g.value(a)?);
    println!("true A:\n{:?}", true_a);
    Ok(())
}
