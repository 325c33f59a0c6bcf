// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-channel affine kernels: inference-mode batch normalisation and the
//! scale/shift it is simplified into.

use crate::{Shape, Tensor, TensorError};

/// Applies `output = input * scale[c] + shift[c]` along axis 1.
///
/// Works for any input of rank ≥ 2 (`[n, c, ...]`).
pub fn scale_shift(
    input: &Tensor,
    scale: &Tensor,
    shift: &Tensor,
    output: &mut Tensor,
) -> Result<(), TensorError> {
    let (channels, inner) = channel_layout("scale_shift", input.shape())?;
    check_channel_vec("scale_shift (scale)", scale, channels)?;
    check_channel_vec("scale_shift (shift)", shift, channels)?;
    super::check_output("scale_shift", output, input.shape())?;

    let s = scale.as_slice();
    let t = shift.as_slice();
    for (block_idx, (dst, src)) in output
        .as_mut_slice()
        .chunks_exact_mut(inner.max(1))
        .zip(input.as_slice().chunks_exact(inner.max(1)))
        .enumerate()
    {
        let ch = block_idx % channels;
        for (d, &v) in dst.iter_mut().zip(src) {
            *d = v * s[ch] + t[ch];
        }
    }
    Ok(())
}

/// Inference-mode batch normalisation along axis 1:
/// `output = gamma * (input - mean) / sqrt(var + epsilon) + beta`.
pub fn batch_norm_inference(
    input: &Tensor,
    gamma: &Tensor,
    beta: &Tensor,
    moving_mean: &Tensor,
    moving_var: &Tensor,
    epsilon: f32,
    output: &mut Tensor,
) -> Result<(), TensorError> {
    let (channels, _) = channel_layout("batch_norm", input.shape())?;
    for (op, t) in [
        ("batch_norm (gamma)", gamma),
        ("batch_norm (beta)", beta),
        ("batch_norm (mean)", moving_mean),
        ("batch_norm (var)", moving_var),
    ] {
        check_channel_vec(op, t, channels)?;
    }

    let mut scale = Vec::with_capacity(channels);
    let mut shift = Vec::with_capacity(channels);
    for c in 0..channels {
        let s = gamma.as_slice()[c] / (moving_var.as_slice()[c] + epsilon).sqrt();
        scale.push(s);
        shift.push(beta.as_slice()[c] - moving_mean.as_slice()[c] * s);
    }
    let scale = Tensor::from_vec(Shape::vector(channels), scale)?;
    let shift = Tensor::from_vec(Shape::vector(channels), shift)?;
    scale_shift(input, &scale, &shift, output)
}

/// Returns `(channels, elements per channel block)` for a `[n, c, ...]` shape.
fn channel_layout(op: &'static str, shape: &Shape) -> Result<(usize, usize), TensorError> {
    if shape.rank() < 2 {
        return Err(TensorError::Rank {
            op,
            expected: 2,
            actual: shape.clone(),
        });
    }
    let channels = shape.dims()[1];
    let inner = shape.dims()[2..].iter().product();
    Ok((channels, inner))
}

fn check_channel_vec(op: &'static str, t: &Tensor, channels: usize) -> Result<(), TensorError> {
    if t.num_elements() != channels {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: Shape::vector(channels),
            rhs: t.shape().clone(),
        });
    }
    Ok(())
}
