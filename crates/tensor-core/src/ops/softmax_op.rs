// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Softmax along the innermost axis.

use crate::{Tensor, TensorError};

/// Computes `output[i] = exp(x[i] - max) / sum(exp(x - max))` row by row,
/// where a row is the innermost dimension.
///
/// The maximum is subtracted before exponentiation so large class scores do
/// not overflow.
///
/// # Errors
/// Returns [`TensorError::ShapeMismatch`] if input and output shapes differ.
pub fn softmax(input: &Tensor, output: &mut Tensor) -> Result<(), TensorError> {
    super::check_output("softmax", output, input.shape())?;

    let row_len = input.shape().last_dim();
    if row_len == 0 || input.num_elements() == 0 {
        return Ok(());
    }

    let src = input.as_slice();
    let dst = output.as_mut_slice();

    for (row_src, row_dst) in src.chunks_exact(row_len).zip(dst.chunks_exact_mut(row_len)) {
        let max_val = row_src.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        let mut sum = 0.0f32;
        for (d, &s) in row_dst.iter_mut().zip(row_src) {
            let e = (s - max_val).exp();
            *d = e;
            sum += e;
        }

        if sum > 0.0 {
            let inv = 1.0 / sum;
            row_dst.iter_mut().for_each(|d| *d *= inv);
        }
    }

    Ok(())
}
