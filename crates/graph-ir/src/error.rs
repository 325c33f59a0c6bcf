// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for graph construction, parameter blobs and graph descriptions.

/// Errors that can occur when working with graphs and parameter tables.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The graph as a whole is malformed (no outputs, dangling heads, ...).
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// A single node is malformed.
    #[error("invalid node '{node}': {detail}")]
    InvalidNode { node: String, detail: String },

    /// A variable has no bound value (neither an input nor a parameter).
    #[error("unbound variable '{0}'")]
    UnboundVariable(String),

    /// A tensor kernel or shape rule rejected a node's operands.
    #[error("tensor error at node '{node}': {source}")]
    Tensor {
        node: String,
        #[source]
        source: tensor_core::TensorError,
    },

    /// A parameter blob could not be encoded or decoded.
    #[error("parameter blob error: {0}")]
    ParamBlob(String),

    /// A parameter uses an element type kernels cannot compute in.
    #[error("parameter '{name}' has unsupported dtype {dtype}")]
    UnsupportedDType { name: String, dtype: String },

    /// A module container is malformed or from an unsupported format version.
    #[error("module container error: {0}")]
    ModuleFormat(String),

    /// Reading or writing a file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A graph description is not valid JSON for the expected schema.
    #[error("graph description parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    /// Wraps a tensor error with the name of the node that raised it.
    pub fn at(node: &str, source: tensor_core::TensorError) -> Self {
        GraphError::Tensor {
            node: node.to_string(),
            source,
        }
    }
}
