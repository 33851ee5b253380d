use crate::autograd::graph::check_dims;
use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::Matrix;
use crate::ops::activation::elementwise::sigmoid;

/// Handle of a gated recurrent unit cell and its nine parameters.
///
/// `W*` are `in x out`, `U*` are `out x out` and `b*` are `1 x out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gru {
    pub output: NodeId,
    pub wz: NodeId,
    pub uz: NodeId,
    pub bz: NodeId,
    pub wr: NodeId,
    pub ur: NodeId,
    pub br: NodeId,
    pub wh: NodeId,
    pub uh: NodeId,
    pub bh: NodeId,
}

impl Gru {
    /// Parameters in wiring order: `Wz, Uz, bz, Wr, Ur, br, Wh, Uh, bh`.
    pub fn parameters(&self) -> [NodeId; 9] {
        [
            self.wz, self.uz, self.bz, self.wr, self.ur, self.br, self.wh, self.uh, self.bh,
        ]
    }
}

/// Inputs: `x, h, Wz, Uz, bz, Wr, Ur, br, Wh, Uh, bh`.
///
/// ```text
/// z  = σ(x Wz + h Uz + bz)
/// r  = σ(x Wr + h Ur + br)
/// c  = tanh(x Wh + (r∘h) Uh + bh)
/// h' = (1 - z)∘h + z∘c
/// ```
#[derive(Debug)]
struct GruCell;

/// `x W + h U + b`, with `b` added to every row.
fn gate_input(x: &Matrix, w: &Matrix, h: &Matrix, u: &Matrix, b: &Matrix) -> Result<Matrix, GradGraphError> {
    let mut a = x.matmul(w)?.add(&h.matmul(u)?)?;
    if b.shape() != (1, a.cols()) {
        return Err(GradGraphError::shape((1, a.cols()), b.shape(), "gru"));
    }
    for r in 0..a.rows() {
        for (v, &bias) in a.row_mut(r).iter_mut().zip(b.as_slice()) {
            *v += bias;
        }
    }
    Ok(a)
}

impl Operation for GruCell {
    fn name(&self) -> &'static str {
        "gru"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        let p = &ctx.inputs;
        let (x, h) = (p[0], p[1]);
        let z = gate_input(x, p[2], h, p[3], p[4])?.map(sigmoid);
        let r = gate_input(x, p[5], h, p[6], p[7])?.map(sigmoid);
        let rh = r.hadamard(h)?;
        let c = gate_input(x, p[8], &rh, p[9], p[10])?.map(f64::tanh);

        let mut y = Matrix::zeros_like(h);
        for i in 0..y.len() {
            let zi = z.as_slice()[i];
            y.as_mut_slice()[i] = (1.0 - zi) * h.as_slice()[i] + zi * c.as_slice()[i];
        }
        Ok(Evaluation::with_saved(y, vec![z, r, c]))
    }

    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let p = &ctx.inputs;
        let (x, h, g) = (p[0], p[1], ctx.grad);
        let (wz, uz, wr, ur, wh, uh) = (p[2], p[3], p[5], p[6], p[8], p[9]);
        let z = ctx.saved(0, "gru")?;
        let r = ctx.saved(1, "gru")?;
        let c = ctx.saved(2, "gru")?;
        let (xt, ht) = (x.transpose(), h.transpose());

        // blend
        let mut dh = g.zip_map(z, "gru", |gi, zi| gi * (1.0 - zi))?;
        let dz = g.hadamard(&c.sub(h)?)?;
        let dc = g.hadamard(z)?;

        // candidate
        let dac = dc.zip_map(c, "gru", |d, ci| d * (1.0 - ci * ci))?;
        let rh = r.hadamard(h)?;
        let dwh = xt.matmul(&dac)?;
        let duh = rh.transpose().matmul(&dac)?;
        let dbh = dac.column_sums();
        let mut dx = dac.matmul(&wh.transpose())?;
        let drh = dac.matmul(&uh.transpose())?;
        dh.add_assign(&drh.hadamard(r)?)?;
        let dr = drh.hadamard(h)?;

        // update gate
        let daz = dz.zip_map(z, "gru", |d, zi| d * zi * (1.0 - zi))?;
        let dwz = xt.matmul(&daz)?;
        let duz = ht.matmul(&daz)?;
        let dbz = daz.column_sums();
        dx.add_assign(&daz.matmul(&wz.transpose())?)?;
        dh.add_assign(&daz.matmul(&uz.transpose())?)?;

        // reset gate
        let dar = dr.zip_map(r, "gru", |d, ri| d * ri * (1.0 - ri))?;
        let dwr = xt.matmul(&dar)?;
        let dur = ht.matmul(&dar)?;
        let dbr = dar.column_sums();
        dx.add_assign(&dar.matmul(&wr.transpose())?)?;
        dh.add_assign(&dar.matmul(&ur.transpose())?)?;

        Ok(vec![
            Some(dx),
            Some(dh),
            Some(dwz),
            Some(duz),
            Some(dbz),
            Some(dwr),
            Some(dur),
            Some(dbr),
            Some(dwh),
            Some(duh),
            Some(dbh),
        ])
    }
}

impl Graph {
    /// GRU cell over the rows of `x` (`n x in_size`) and the previous state
    /// `h` (`n x out_size`). Rows are independent batch entries.
    pub fn new_gru(
        &mut self,
        x: NodeId,
        h: NodeId,
        in_size: usize,
        out_size: usize,
    ) -> Result<Gru, GradGraphError> {
        check_dims(in_size, out_size, "new_gru")?;
        let gate = |g: &mut Graph| -> Result<(NodeId, NodeId, NodeId), GradGraphError> {
            let w = g.new_variable(in_size, out_size)?;
            let u = g.new_variable(out_size, out_size)?;
            let b = g.new_variable_with(Matrix::zeros(1, out_size))?;
            Ok((w, u, b))
        };
        let (wz, uz, bz) = gate(self)?;
        let (wr, ur, br) = gate(self)?;
        let (wh, uh, bh) = gate(self)?;
        let output = self.push_function(GruCell, &[x, h, wz, uz, bz, wr, ur, br, wh, uh, bh])?;
        Ok(Gru {
            output,
            wz,
            uz,
            bz,
            wr,
            ur,
            br,
            wh,
            uh,
            bh,
        })
    }
}

#[cfg(test)]
#[path = "gru_test.rs"]
mod tests;
