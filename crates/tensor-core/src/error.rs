// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor construction and kernels.

use crate::Shape;

/// Errors that can occur while building tensors or running kernels.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The number of values does not match the shape's element count.
    #[error("element count mismatch: shape {shape} needs {expected} values, got {actual}")]
    ElementCount {
        shape: Shape,
        expected: usize,
        actual: usize,
    },

    /// A raw byte buffer is not a whole number of elements.
    #[error("byte length {len} is not a multiple of the element width {width}")]
    ByteLength { len: usize, width: usize },

    /// Two operands have incompatible shapes for the requested kernel.
    #[error("incompatible shapes for {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// An operand has the wrong rank for the requested kernel.
    #[error("{op} expects a rank-{expected} tensor, got shape {actual}")]
    Rank {
        op: &'static str,
        expected: usize,
        actual: Shape,
    },

    /// Kernel attributes are invalid (zero stride, window larger than input, ...).
    #[error("invalid attributes for {op}: {detail}")]
    InvalidAttrs { op: &'static str, detail: String },
}
