// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # graph-ir
//!
//! A portable, target-agnostic computational-graph representation.
//!
//! Frontends convert framework models into this IR; the compiler lowers it
//! into fused functions for a target; the runtime only ever sees the
//! compiled description. The crate provides:
//!
//! - [`OpKind`]: the closed operator set, with shape inference and a
//!   reference evaluation for each operator.
//! - [`Graph`]: a DAG of named [`Node`]s in topological order, with a
//!   **type-state pattern** (`Unchecked` → `Validated`).
//! - [`ParamTable`]: parameter name → weight tensor, serialised as a
//!   SafeTensors blob.
//! - [`CompiledGraph`]: the JSON graph description emitted by the compiler
//!   and consumed by the runtime.
//! - [`lowered`]: fused functions and the binary module container.
//! - [`DeviceKind`]: the device families a target can execute on.
//!
//! # Example
//! ```
//! use graph_ir::{Graph, Node, OpKind};
//!
//! let graph = Graph::new(
//!     "tiny".into(),
//!     vec![Node::variable("data"), Node::new("relu0", OpKind::Relu, vec![0])],
//!     vec![1],
//! )
//! .validate()
//! .unwrap()
//! .append_softmax();
//! assert_eq!(graph.num_nodes(), 3);
//! ```

pub mod compiled;
mod device;
mod error;
pub mod graph;
mod interpret;
pub mod lowered;
mod op;
mod params;

pub use compiled::{CompiledGraph, FuncAttrs, GraphAttrs, GraphNode, NodeEntry};
pub use device::DeviceKind;
pub use error::GraphError;
pub use graph::{Graph, Node, Unchecked, Validated};
pub use interpret::interpret;
pub use lowered::{LinkMode, LinkOptions, LoweredFunc, ModuleImage};
pub use op::OpKind;
pub use params::ParamTable;

/// Name of the graph input that carries the image batch.
pub const DATA_INPUT: &str = "data";
