use crate::autograd::operation::{BackwardContext, Evaluation, ForwardContext, Operation};
use crate::autograd::{Graph, NodeId};
use crate::error::GradGraphError;
use crate::matrix::Matrix;

/// Geometry of a 2-D convolution.
///
/// Images travel as matrix rows: one row holds `in_channels` images of
/// `in_rows x in_cols`, channel-major then row-major. Several rows form a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2dConfig {
    pub in_rows: usize,
    pub in_cols: usize,
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_rows: usize,
    pub kernel_cols: usize,
    pub stride: usize,
    pub padding: usize,
    pub dilation: usize,
}

impl Conv2dConfig {
    /// Stride 1, no padding, no dilation.
    pub fn new(
        in_rows: usize,
        in_cols: usize,
        in_channels: usize,
        out_channels: usize,
        kernel_rows: usize,
        kernel_cols: usize,
    ) -> Self {
        Conv2dConfig {
            in_rows,
            in_cols,
            in_channels,
            out_channels,
            kernel_rows,
            kernel_cols,
            stride: 1,
            padding: 0,
            dilation: 1,
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_dilation(mut self, dilation: usize) -> Self {
        self.dilation = dilation;
        self
    }

    /// Checks that every size is positive and that the kernel fits the padded input.
    pub fn validate(&self) -> Result<(), GradGraphError> {
        let sizes = [
            ("in_rows", self.in_rows),
            ("in_cols", self.in_cols),
            ("in_channels", self.in_channels),
            ("out_channels", self.out_channels),
            ("kernel_rows", self.kernel_rows),
            ("kernel_cols", self.kernel_cols),
            ("stride", self.stride),
            ("dilation", self.dilation),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(GradGraphError::InvalidArgument(format!(
                    "conv2d: {} must be at least 1",
                    name
                )));
            }
        }
        self.out_extent(self.in_rows, self.kernel_rows)?;
        self.out_extent(self.in_cols, self.kernel_cols)?;
        Ok(())
    }

    fn out_extent(&self, input: usize, kernel: usize) -> Result<usize, GradGraphError> {
        let span = self.dilation * (kernel - 1) + 1;
        let padded = input + 2 * self.padding;
        if span > padded {
            return Err(GradGraphError::InvalidArgument(format!(
                "conv2d: dilated kernel extent {} exceeds padded input {}",
                span, padded
            )));
        }
        Ok((padded - span) / self.stride + 1)
    }

    /// `(in_rows + 2p - d(k_rows - 1) - 1) / s + 1`.
    pub fn out_rows(&self) -> Result<usize, GradGraphError> {
        self.validate()?;
        self.out_extent(self.in_rows, self.kernel_rows)
    }

    pub fn out_cols(&self) -> Result<usize, GradGraphError> {
        self.validate()?;
        self.out_extent(self.in_cols, self.kernel_cols)
    }

    /// Width of one input row: `in_channels * in_rows * in_cols`.
    pub fn in_features(&self) -> usize {
        self.in_channels * self.in_rows * self.in_cols
    }

    /// Shape of the kernel variable: `[out_channels * kernel_rows, in_channels * kernel_cols]`.
    pub fn kernel_shape(&self) -> (usize, usize) {
        (
            self.out_channels * self.kernel_rows,
            self.in_channels * self.kernel_cols,
        )
    }
}

/// Handle of a convolution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2d {
    pub output: NodeId,
    pub kernel: NodeId,
}

/// Cross-correlation with zero padding. Inputs: `x, K`.
#[derive(Debug)]
struct Convolution {
    config: Conv2dConfig,
    out_rows: usize,
    out_cols: usize,
}

impl Convolution {
    fn out_features(&self) -> usize {
        self.config.out_channels * self.out_rows * self.out_cols
    }

    /// Visits every (output, input, kernel) triple that lands inside the image,
    /// as flat column indices `(y_col, x_col)` plus the kernel entry `(k_row, k_col)`.
    fn for_each_tap<F: FnMut(usize, usize, usize, usize)>(&self, mut visit: F) {
        let c = &self.config;
        let in_plane = c.in_rows * c.in_cols;
        let out_plane = self.out_rows * self.out_cols;
        for o in 0..c.out_channels {
            for orow in 0..self.out_rows {
                for ocol in 0..self.out_cols {
                    let y_col = o * out_plane + orow * self.out_cols + ocol;
                    for i in 0..c.in_channels {
                        for kr in 0..c.kernel_rows {
                            let ir = (orow * c.stride + kr * c.dilation) as isize - c.padding as isize;
                            if ir < 0 || ir >= c.in_rows as isize {
                                continue;
                            }
                            for kc in 0..c.kernel_cols {
                                let ic = (ocol * c.stride + kc * c.dilation) as isize - c.padding as isize;
                                if ic < 0 || ic >= c.in_cols as isize {
                                    continue;
                                }
                                let x_col = i * in_plane + ir as usize * c.in_cols + ic as usize;
                                visit(
                                    y_col,
                                    x_col,
                                    o * c.kernel_rows + kr,
                                    i * c.kernel_cols + kc,
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    fn check_inputs(&self, x: &Matrix, kernel: &Matrix) -> Result<(), GradGraphError> {
        if x.cols() != self.config.in_features() {
            return Err(GradGraphError::shape(
                (x.rows(), self.config.in_features()),
                x.shape(),
                "conv2d",
            ));
        }
        if kernel.shape() != self.config.kernel_shape() {
            return Err(GradGraphError::shape(
                self.config.kernel_shape(),
                kernel.shape(),
                "conv2d",
            ));
        }
        Ok(())
    }
}

impl Operation for Convolution {
    fn name(&self) -> &'static str {
        "conv2d"
    }

    fn forward(&self, ctx: &mut ForwardContext<'_>) -> Result<Evaluation, GradGraphError> {
        let (x, kernel) = (ctx.inputs[0], ctx.inputs[1]);
        self.check_inputs(x, kernel)?;
        let mut y = Matrix::zeros(x.rows(), self.out_features());
        for b in 0..x.rows() {
            let (xb, yb) = (x.row(b), y.row_mut(b));
            self.for_each_tap(|y_col, x_col, kr, kc| {
                yb[y_col] += xb[x_col] * kernel.get(kr, kc);
            });
        }
        Ok(Evaluation::value(y))
    }

    fn backward(&self, ctx: &BackwardContext<'_>) -> Result<Vec<Option<Matrix>>, GradGraphError> {
        let (x, kernel, g) = (ctx.inputs[0], ctx.inputs[1], ctx.grad);
        let mut dx = Matrix::zeros_like(x);
        let mut dk = Matrix::zeros_like(kernel);
        for b in 0..x.rows() {
            let (xb, gb, dxb) = (x.row(b), g.row(b), dx.row_mut(b));
            self.for_each_tap(|y_col, x_col, kr, kc| {
                dxb[x_col] += gb[y_col] * kernel.get(kr, kc);
                let k_entry = dk.get(kr, kc) + gb[y_col] * xb[x_col];
                dk.set(kr, kc, k_entry);
            });
        }
        Ok(vec![Some(dx), Some(dk)])
    }
}

impl Graph {
    /// 2-D convolution layer with a kernel drawn from `N(0, 1/(in_channels * kernel_cols))`.
    pub fn new_conv2d(&mut self, x: NodeId, config: Conv2dConfig) -> Result<Conv2d, GradGraphError> {
        let out_rows = config.out_rows()?;
        let out_cols = config.out_cols()?;
        let (k_rows, k_cols) = config.kernel_shape();
        let kernel = self.new_variable(k_rows, k_cols)?;
        let op = Convolution {
            config,
            out_rows,
            out_cols,
        };
        let output = self.push_function(op, &[x, kernel])?;
        Ok(Conv2d { output, kernel })
    }
}

#[cfg(test)]
#[path = "conv2d_test.rs"]
mod tests;
