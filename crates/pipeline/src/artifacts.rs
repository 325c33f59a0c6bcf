// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Artifact serialisation.
//!
//! Four files are written, each overwriting whatever was there before:
//!
//! | File | Content |
//! |---|---|
//! | params | parameter blob (SafeTensors) |
//! | graph | compiled graph description (JSON) |
//! | input | normalised input tensor, raw little-endian f32 |
//! | library | module container, native or linked for the device |
//!
//! Writes are not atomic; a crash mid-write leaves a truncated file.

use crate::{PipelineConfig, PipelineError};
use compiler::{CompiledModule, TargetSpec};
use graph_ir::{CompiledGraph, LinkMode, ParamTable};
use std::path::{Path, PathBuf};
use tensor_core::Tensor;

/// Paths of one written artifact set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    pub params: PathBuf,
    pub graph: PathBuf,
    pub input: PathBuf,
    pub library: PathBuf,
    /// How the library was linked.
    pub link_mode: LinkMode,
}

impl ArtifactSet {
    /// Writes every artifact under `config.output_dir`.
    ///
    /// The library is linked with the device toolchain flags when `target`
    /// cross-compiles, natively otherwise.
    pub fn write(
        config: &PipelineConfig,
        target: &TargetSpec,
        graph: &CompiledGraph,
        module: &CompiledModule,
        params: &ParamTable,
        input: &Tensor,
    ) -> Result<Self, PipelineError> {
        std::fs::create_dir_all(&config.output_dir)?;
        let names = &config.files;

        let params_path = config.path(&names.params);
        std::fs::write(&params_path, params.to_blob()?)?;
        tracing::info!(
            "wrote {} ({} parameters, {:.2} MB)",
            params_path.display(),
            params.len(),
            params.total_bytes() as f64 / (1024.0 * 1024.0)
        );

        let graph_path = config.path(&names.graph);
        graph.save(&graph_path)?;
        tracing::info!("wrote {} ({} nodes)", graph_path.display(), graph.num_nodes());

        let input_path = config.path(&names.input);
        std::fs::write(&input_path, input.to_le_bytes())?;
        tracing::info!("wrote {} ({})", input_path.display(), input.shape());

        let library_path = config.path(&names.library);
        let link = CompiledModule::link_options_for(target);
        module.export_library(&library_path, &link)?;

        Ok(Self {
            params: params_path,
            graph: graph_path,
            input: input_path,
            library: library_path,
            link_mode: link.mode,
        })
    }

    /// All written paths, in write order.
    pub fn paths(&self) -> [&Path; 4] {
        [
            self.params.as_path(),
            self.graph.as_path(),
            self.input.as_path(),
            self.library.as_path(),
        ]
    }
}
