// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # compiler
//!
//! Lowers a validated portable graph into a compiled graph description and
//! a module of fused functions for one target.
//!
//! - [`TargetSpec`]: target resolution against [`TARGET_TABLE`],
//!   including the cross-compilation flag.
//! - [`BuildConfig`]: optimisation level `0..=3`.
//! - [`pass`]: graph rewrites (inference simplification, scale folding,
//!   constant precomputation and parameter pruning).
//! - [`build`]: the full pipeline: bind, optimise, fuse, plan storage,
//!   emit.
//! - [`CompiledModule`]: the fused functions, exported with
//!   [`CompiledModule::export_library`].
//!
//! # Example
//! ```no_run
//! use compiler::{build, BuildConfig, TargetSpec};
//! use std::collections::HashMap;
//! use tensor_core::Shape;
//!
//! let block = frontend::zoo::get_model("resnet18_v1", 1000).unwrap();
//! let (graph, params) = frontend::from_block(&block).unwrap();
//! let target = TargetSpec::resolve("llvm", None).unwrap();
//! let shapes = HashMap::from([("data".to_string(), Shape::nchw(1, 3, 224, 224))]);
//! let (graph_json, module, params) =
//!     build(&graph, &target, &shapes, &params, &BuildConfig::default()).unwrap();
//! ```

mod codegen;
mod config;
mod driver;
mod error;
mod fuse;
pub mod ir;
mod module;
pub mod pass;
mod storage;
mod target;

#[cfg(test)]
mod fixtures;

pub use config::{BuildConfig, MAX_OPT_LEVEL};
pub use driver::build;
pub use error::CompileError;
pub use graph_ir::LinkOptions;
pub use module::CompiledModule;
pub use target::{target_ids, TargetEntry, TargetSpec, CROSS_COMPILE_MARKER, TARGET_TABLE};
