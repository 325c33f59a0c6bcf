// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Fully connected layer.

use crate::{Shape, Tensor, TensorError};

/// Computes `output = input · weightᵀ + bias`.
///
/// `input` is `[batch, in_features]`, `weight` is `[units, in_features]`,
/// `bias` (optional) is `[units]` and `output` must be `[batch, units]`.
///
/// # Errors
/// Returns [`TensorError::Rank`] or [`TensorError::ShapeMismatch`] when
/// operands disagree.
pub fn dense(
    input: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    output: &mut Tensor,
) -> Result<(), TensorError> {
    let (batch, in_features) = matrix_dims(input)?;
    let (units, w_in) = matrix_dims(weight)?;
    if w_in != in_features {
        return Err(TensorError::ShapeMismatch {
            op: "dense",
            lhs: input.shape().clone(),
            rhs: weight.shape().clone(),
        });
    }
    if let Some(b) = bias {
        if b.shape() != &Shape::vector(units) {
            return Err(TensorError::ShapeMismatch {
                op: "dense (bias)",
                lhs: Shape::vector(units),
                rhs: b.shape().clone(),
            });
        }
    }
    super::check_output("dense", output, &Shape::matrix(batch, units))?;

    let x = input.as_slice();
    let w = weight.as_slice();
    let b = bias.map(|b| b.as_slice());
    let y = output.as_mut_slice();

    for i in 0..batch {
        let row = &x[i * in_features..(i + 1) * in_features];
        for u in 0..units {
            let w_row = &w[u * in_features..(u + 1) * in_features];
            let dot: f32 = row.iter().zip(w_row).map(|(a, b)| a * b).sum();
            y[i * units + u] = dot + b.map_or(0.0, |b| b[u]);
        }
    }

    Ok(())
}

fn matrix_dims(t: &Tensor) -> Result<(usize, usize), TensorError> {
    match t.shape().dims() {
        &[rows, cols] => Ok((rows, cols)),
        _ => Err(TensorError::Rank {
            op: "dense",
            expected: 2,
            actual: t.shape().clone(),
        }),
    }
}
