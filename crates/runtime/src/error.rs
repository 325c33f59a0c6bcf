// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for module loading and graph execution.

use graph_ir::DeviceKind;
use tensor_core::Shape;

/// Errors that can occur while loading a module or executing a graph.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The device context cannot execute kernels in this build.
    #[error("device {kind}({id}) is not available for execution")]
    DeviceUnavailable { kind: DeviceKind, id: usize },

    /// The module was linked for another platform.
    #[error("module for '{target}' was cross-compiled and cannot be loaded in-process")]
    CrossCompiledModule { target: String },

    /// A fused node names a function the module does not contain.
    #[error("node '{node}' calls unknown function '{func}'")]
    MissingFunction { node: String, func: String },

    /// `set_input` named something that is not an argument of the graph.
    #[error("'{0}' is not an input or parameter of the graph")]
    UnknownInput(String),

    /// A bound tensor does not have the shape the graph declares.
    #[error("'{name}' has shape {actual}, graph expects {expected}")]
    InputShape {
        name: String,
        expected: Shape,
        actual: Shape,
    },

    /// An argument was never bound before `run`.
    #[error("argument '{0}' has no value")]
    UnboundArgument(String),

    /// A node or output index is out of range.
    #[error("{what} index {index} out of range (have {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// Outputs were requested before the first `run`.
    #[error("graph has not been run")]
    NotRun,

    /// A fused function failed.
    #[error("execution error in node '{node}': {source}")]
    ExecutionError {
        node: String,
        #[source]
        source: graph_ir::GraphError,
    },

    /// The graph description, module container or parameter blob is malformed.
    #[error("invalid artifact: {0}")]
    Artifact(#[from] graph_ir::GraphError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
