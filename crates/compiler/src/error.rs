// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for target resolution and compilation.

use tensor_core::Shape;

/// Errors that can occur while resolving a target or building a graph.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The target identifier is not in the target table.
    #[error("unknown target '{0}'")]
    UnknownTarget(String),

    /// The optimisation level is outside `0..=3`.
    #[error("invalid optimisation level {0} (supported: 0..=3)")]
    InvalidOptLevel(u8),

    /// The shape table names something that is not a graph input.
    #[error("shape given for '{0}', which is not an input of the graph")]
    UnknownInput(String),

    /// A graph input has no entry in the shape table.
    #[error("no shape given for input '{0}'")]
    MissingInputShape(String),

    /// A parameter variable has no value.
    #[error("missing parameter '{0}'")]
    MissingParam(String),

    /// A shape-table entry disagrees with the parameter bound to the same name.
    #[error("shape of '{name}' is {actual}, expected {expected}")]
    ShapeMismatch {
        name: String,
        expected: Shape,
        actual: Shape,
    },

    #[error(transparent)]
    Graph(#[from] graph_ir::GraphError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
