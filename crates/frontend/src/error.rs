// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for model construction, checkpoints and graph conversion.

use tensor_core::Shape;

/// Errors that can occur in the frontend.
#[derive(Debug, thiserror::Error)]
pub enum FrontendError {
    /// The model zoo has no model by this name.
    #[error("unknown model '{0}'")]
    UnknownModel(String),

    /// A symbol node uses an operator the converter cannot map.
    #[error("unsupported operator '{op}' at node '{node}'")]
    UnsupportedOperator { op: String, node: String },

    /// A symbol node carries an attribute the converter cannot interpret.
    #[error("invalid attribute '{key}' on node '{node}': {detail}")]
    InvalidAttr {
        node: String,
        key: String,
        detail: String,
    },

    /// A weight operand has no value in the supplied parameters.
    #[error("missing parameter '{0}'")]
    MissingParam(String),

    /// A loaded parameter does not fit the layer it is assigned to.
    #[error("parameter '{name}' has shape {actual}, layer expects {expected}")]
    ParamShape {
        name: String,
        expected: Shape,
        actual: Shape,
    },

    /// A symbol document is structurally broken.
    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    /// A checkpoint weight file is malformed.
    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error(transparent)]
    Graph(#[from] graph_ir::GraphError),

    #[error(transparent)]
    Tensor(#[from] tensor_core::TensorError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("symbol parse error: {0}")]
    Json(#[from] serde_json::Error),
}
