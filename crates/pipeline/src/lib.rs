// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # pipeline
//!
//! End-to-end sequencing of the deployment flow: fetch a model's assets,
//! normalise the sample image, convert and compile the model for a
//! resolved target, write the artifact set and, unless cross-compiling,
//! execute it in-process and report the top-1 class.
//!
//! - [`PipelineConfig`]: every input of a run except the target, loadable
//!   from TOML.
//! - [`fetch`]: idempotent downloads.
//! - [`normalize`]: image → `[1, 3, 224, 224]` tensor.
//! - [`LabelMap`]: class index → label.
//! - [`ArtifactSet`]: the four written files.
//! - [`Pipeline`]: the stages in order.
//!
//! # Example
//! ```no_run
//! # async fn demo() -> Result<(), pipeline::PipelineError> {
//! use compiler::TargetSpec;
//! use pipeline::{Pipeline, PipelineConfig, PipelineOutcome};
//!
//! let target = TargetSpec::resolve("llvm", None)?;
//! match Pipeline::new(PipelineConfig::default()).run(&target).await? {
//!     PipelineOutcome::Executed { prediction, .. } => {
//!         println!("top-1: {} {}", prediction.class_index, prediction.label)
//!     }
//!     PipelineOutcome::CrossCompiled { .. } => {}
//! }
//! # Ok(())
//! # }
//! ```

mod artifacts;
mod config;
mod error;
pub mod fetch;
mod labels;
pub mod normalize;
mod run;

pub use artifacts::ArtifactSet;
pub use config::{ArtifactNames, PipelineConfig, DEFAULT_IMAGE_URL, DEFAULT_SYNSET_URL};
pub use error::PipelineError;
pub use fetch::FetchOutcome;
pub use labels::LabelMap;
pub use run::{top1, Pipeline, PipelineOutcome, Prediction};
