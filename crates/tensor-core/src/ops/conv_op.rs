// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! 2-D convolution over `NCHW` activations.

use crate::shape::conv_out_dim;
use crate::{Shape, Tensor, TensorError};

/// Window geometry of a 2-D convolution, `(height, width)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Conv2dParams {
    pub strides: (usize, usize),
    pub padding: (usize, usize),
    pub dilation: (usize, usize),
}

impl Default for Conv2dParams {
    fn default() -> Self {
        Self {
            strides: (1, 1),
            padding: (0, 0),
            dilation: (1, 1),
        }
    }
}

impl Conv2dParams {
    /// Output shape for an `[n, c, h, w]` input and `[o, c, kh, kw]` weight.
    ///
    /// # Errors
    /// Returns an error when ranks or channel counts disagree, or the window
    /// does not fit the padded input.
    pub fn output_shape(&self, input: &Shape, weight: &Shape) -> Result<Shape, TensorError> {
        let (n, c, h, w) = input.as_nchw().ok_or_else(|| TensorError::Rank {
            op: "conv2d",
            expected: 4,
            actual: input.clone(),
        })?;
        let (o, wc, kh, kw) = weight.as_nchw().ok_or_else(|| TensorError::Rank {
            op: "conv2d (weight)",
            expected: 4,
            actual: weight.clone(),
        })?;
        if wc != c {
            return Err(TensorError::ShapeMismatch {
                op: "conv2d",
                lhs: input.clone(),
                rhs: weight.clone(),
            });
        }
        let oh = conv_out_dim(h, kh, self.strides.0, self.padding.0, self.dilation.0);
        let ow = conv_out_dim(w, kw, self.strides.1, self.padding.1, self.dilation.1);
        match (oh, ow) {
            (Some(oh), Some(ow)) => Ok(Shape::nchw(n, o, oh, ow)),
            _ => Err(TensorError::InvalidAttrs {
                op: "conv2d",
                detail: format!("window {kh}x{kw} with {self:?} does not fit input {input}"),
            }),
        }
    }
}

/// Direct convolution: `output[n, o, y, x] = bias[o] + Σ input · weight`.
///
/// Zero padding is implicit; taps that fall outside the input contribute
/// nothing.
pub fn conv2d(
    input: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    params: &Conv2dParams,
    output: &mut Tensor,
) -> Result<(), TensorError> {
    let expected = params.output_shape(input.shape(), weight.shape())?;
    super::check_output("conv2d", output, &expected)?;

    let (n, c, h, w) = super::nchw_of("conv2d", input)?;
    let (o, _, kh, kw) = super::nchw_of("conv2d", weight)?;
    let (_, _, oh, ow) = super::nchw_of("conv2d", output)?;

    if let Some(b) = bias {
        if b.num_elements() != o {
            return Err(TensorError::ShapeMismatch {
                op: "conv2d (bias)",
                lhs: Shape::vector(o),
                rhs: b.shape().clone(),
            });
        }
    }

    let (sh, sw) = params.strides;
    let (ph, pw) = params.padding;
    let (dh, dw) = params.dilation;

    let x = input.as_slice();
    let k = weight.as_slice();
    let b = bias.map(|b| b.as_slice());
    let y = output.as_mut_slice();

    for batch in 0..n {
        let x_batch = &x[batch * c * h * w..(batch + 1) * c * h * w];
        for oc in 0..o {
            let y_plane = &mut y[(batch * o + oc) * oh * ow..(batch * o + oc + 1) * oh * ow];
            y_plane.fill(b.map_or(0.0, |b| b[oc]));

            for ic in 0..c {
                let x_plane = &x_batch[ic * h * w..(ic + 1) * h * w];
                let k_plane = &k[(oc * c + ic) * kh * kw..(oc * c + ic + 1) * kh * kw];

                for ky in 0..kh {
                    for kx in 0..kw {
                        let tap = k_plane[ky * kw + kx];
                        if tap == 0.0 {
                            continue;
                        }
                        for oy in 0..oh {
                            let iy = (oy * sh + ky * dh) as isize - ph as isize;
                            if iy < 0 || iy >= h as isize {
                                continue;
                            }
                            let x_row = &x_plane[iy as usize * w..(iy as usize + 1) * w];
                            let y_row = &mut y_plane[oy * ow..(oy + 1) * ow];
                            for (ox, out) in y_row.iter_mut().enumerate() {
                                let ix = (ox * sw + kx * dw) as isize - pw as isize;
                                if ix >= 0 && ix < w as isize {
                                    *out += tap * x_row[ix as usize];
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(())
}
