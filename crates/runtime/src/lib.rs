// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # runtime
//!
//! The in-process side of deployment: loads what the compiler exported and
//! executes it on a device context.
//!
//! The runtime takes:
//! - A [`graph_ir::CompiledGraph`] (the JSON graph description).
//! - A [`Module`] loaded from an exported library container.
//! - A parameter blob, bound by name onto the graph's arguments.
//!
//! and runs the fused nodes in order, one storage slot per planned
//! `storage_id`, with optional per-node timing.
//!
//! Only CPU contexts execute in this build; other device kinds are
//! accepted at construction and refused at [`GraphExecutor::run`].
//! Modules linked as shared objects for another platform are refused at
//! load time.

mod device;
mod error;
mod executor;
mod metrics;
mod module;

pub use device::DeviceContext;
pub use error::RuntimeError;
pub use executor::GraphExecutor;
pub use metrics::{ExecutionMetrics, NodeMetrics};
pub use module::Module;
