// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Spatial pooling over `NCHW` activations.

use crate::shape::conv_out_dim;
use crate::{Shape, Tensor, TensorError};

/// Window geometry of a 2-D pooling, `(height, width)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Pool2dParams {
    pub pool_size: (usize, usize),
    pub strides: (usize, usize),
    pub padding: (usize, usize),
}

impl Pool2dParams {
    /// Output shape for an `[n, c, h, w]` input.
    pub fn output_shape(&self, input: &Shape) -> Result<Shape, TensorError> {
        let (n, c, h, w) = input.as_nchw().ok_or_else(|| TensorError::Rank {
            op: "pool2d",
            expected: 4,
            actual: input.clone(),
        })?;
        let oh = conv_out_dim(h, self.pool_size.0, self.strides.0, self.padding.0, 1);
        let ow = conv_out_dim(w, self.pool_size.1, self.strides.1, self.padding.1, 1);
        match (oh, ow) {
            (Some(oh), Some(ow)) => Ok(Shape::nchw(n, c, oh, ow)),
            _ => Err(TensorError::InvalidAttrs {
                op: "pool2d",
                detail: format!("window {self:?} does not fit input {input}"),
            }),
        }
    }
}

/// Max pooling. Padded positions never win.
pub fn max_pool2d(
    input: &Tensor,
    params: &Pool2dParams,
    output: &mut Tensor,
) -> Result<(), TensorError> {
    pool2d(input, params, output, PoolKind::Max)
}

/// Average pooling. Padded positions count towards the divisor.
pub fn avg_pool2d(
    input: &Tensor,
    params: &Pool2dParams,
    output: &mut Tensor,
) -> Result<(), TensorError> {
    pool2d(input, params, output, PoolKind::Avg)
}

/// Averages each channel plane down to a single value: `[n, c, h, w] → [n, c, 1, 1]`.
pub fn global_avg_pool2d(input: &Tensor, output: &mut Tensor) -> Result<(), TensorError> {
    let (n, c, h, w) = super::nchw_of("global_avg_pool2d", input)?;
    super::check_output("global_avg_pool2d", output, &Shape::nchw(n, c, 1, 1))?;

    let plane = h * w;
    if plane == 0 {
        output.as_mut_slice().fill(0.0);
        return Ok(());
    }
    let inv = 1.0 / plane as f32;
    for (dst, src) in output
        .as_mut_slice()
        .iter_mut()
        .zip(input.as_slice().chunks_exact(plane))
    {
        *dst = src.iter().sum::<f32>() * inv;
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum PoolKind {
    Max,
    Avg,
}

fn pool2d(
    input: &Tensor,
    params: &Pool2dParams,
    output: &mut Tensor,
    kind: PoolKind,
) -> Result<(), TensorError> {
    let expected = params.output_shape(input.shape())?;
    super::check_output("pool2d", output, &expected)?;

    let (n, c, h, w) = super::nchw_of("pool2d", input)?;
    let (_, _, oh, ow) = super::nchw_of("pool2d", output)?;
    let (kh, kw) = params.pool_size;
    let (sh, sw) = params.strides;
    let (ph, pw) = params.padding;
    let divisor = (kh * kw) as f32;

    let x = input.as_slice();
    let y = output.as_mut_slice();

    for plane in 0..n * c {
        let x_plane = &x[plane * h * w..(plane + 1) * h * w];
        let y_plane = &mut y[plane * oh * ow..(plane + 1) * oh * ow];
        for oy in 0..oh {
            for ox in 0..ow {
                let mut acc = match kind {
                    PoolKind::Max => f32::NEG_INFINITY,
                    PoolKind::Avg => 0.0,
                };
                for ky in 0..kh {
                    let iy = (oy * sh + ky) as isize - ph as isize;
                    if iy < 0 || iy >= h as isize {
                        continue;
                    }
                    for kx in 0..kw {
                        let ix = (ox * sw + kx) as isize - pw as isize;
                        if ix < 0 || ix >= w as isize {
                            continue;
                        }
                        let v = x_plane[iy as usize * w + ix as usize];
                        acc = match kind {
                            PoolKind::Max => acc.max(v),
                            PoolKind::Avg => acc + v,
                        };
                    }
                }
                y_plane[oy * ow + ox] = match kind {
                    PoolKind::Max => acc,
                    PoolKind::Avg => acc / divisor,
                };
            }
        }
    }
    Ok(())
}
