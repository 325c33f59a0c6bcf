// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # frontend
//!
//! The source-framework side of the toolchain:
//!
//! - [`Block`]: live models made of [`Layer`]s with owned parameters.
//! - [`Symbol`]: the framework's static graph, as stored in checkpoints.
//! - [`zoo`]: ResNet v1 classifiers with deterministic initialisation.
//! - [`checkpoint`]: `{prefix}-symbol.json` + `{prefix}-{epoch:04}.params`.
//! - [`from_block`] / [`from_symbol`]: conversion into a validated
//!   [`graph_ir::Graph`] plus its [`graph_ir::ParamTable`].
//!
//! # Example
//! ```no_run
//! let block = frontend::zoo::get_model("resnet18_v1", 1000).unwrap();
//! let (graph, params) = frontend::from_block(&block).unwrap();
//! println!("{} ({} parameters)", graph.summary(), params.len());
//! ```

mod block;
pub mod checkpoint;
mod convert;
mod error;
pub mod symbol;
pub mod zoo;

pub use block::{Block, Layer, ParamKind, Parameter};
pub use checkpoint::{block_to_checkpoint, load_checkpoint, save_checkpoint};
pub use convert::{from_block, from_symbol};
pub use error::FrontendError;
pub use symbol::{Symbol, SymbolNode};
