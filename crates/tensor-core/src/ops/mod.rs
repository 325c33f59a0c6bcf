// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Numeric kernels.
//!
//! Each kernel validates its operands and writes into a pre-allocated
//! output tensor, so the executor can reuse storage between nodes.

mod conv_op;
mod dense_op;
mod elementwise_op;
mod norm_op;
mod pool_op;
mod softmax_op;

pub use conv_op::{conv2d, Conv2dParams};
pub use dense_op::dense;
pub use elementwise_op::{add, relu};
pub use norm_op::{batch_norm_inference, scale_shift};
pub use pool_op::{avg_pool2d, global_avg_pool2d, max_pool2d, Pool2dParams};
pub use softmax_op::softmax;

use crate::{Shape, Tensor, TensorError};

/// Checks that `output` has exactly `expected` shape.
fn check_output(op: &'static str, output: &Tensor, expected: &Shape) -> Result<(), TensorError> {
    if output.shape() != expected {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: expected.clone(),
            rhs: output.shape().clone(),
        });
    }
    Ok(())
}

/// Splits a rank-4 operand into `(n, c, h, w)` or reports a rank error.
fn nchw_of(op: &'static str, t: &Tensor) -> Result<(usize, usize, usize, usize), TensorError> {
    t.shape().as_nchw().ok_or_else(|| TensorError::Rank {
        op,
        expected: 4,
        actual: t.shape().clone(),
    })
}
