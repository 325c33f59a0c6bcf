// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Stage sequencing.
//!
//! ```text
//! fetch assets ─► normalise image ─► convert model ─► append softmax
//!      ─► build (opt 3) ─► write artifacts ─┬─► cross-compile: stop
//!                                           └─► load module, run, top-1
//! ```
//!
//! Stages run strictly one after another. A failing stage aborts the run;
//! files already written are left in place.

use crate::fetch::download_if_missing;
use crate::{normalize, ArtifactSet, LabelMap, PipelineConfig, PipelineError};
use compiler::{build, BuildConfig, TargetSpec, MAX_OPT_LEVEL};
use frontend::Block;
use graph_ir::{CompiledGraph, ParamTable, DATA_INPUT};
use runtime::{DeviceContext, GraphExecutor, Module};
use std::collections::HashMap;
use tensor_core::Tensor;

/// Top-1 result of the local run.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Always a valid index into the label map.
    pub class_index: usize,
    pub label: String,
    /// Softmax probability of the class.
    pub score: f32,
}

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// The target cross-compiles; artifacts were written and nothing ran.
    CrossCompiled { artifacts: ArtifactSet },
    /// Artifacts were written and the module was executed in-process.
    Executed {
        artifacts: ArtifactSet,
        prediction: Prediction,
    },
}

impl PipelineOutcome {
    pub fn artifacts(&self) -> &ArtifactSet {
        match self {
            PipelineOutcome::CrossCompiled { artifacts }
            | PipelineOutcome::Executed { artifacts, .. } => artifacts,
        }
    }
}

/// The end-to-end conversion, compilation and deployment run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    model: Option<Block>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            model: None,
        }
    }

    /// Uses `block` instead of building `config.model` from the zoo.
    pub fn with_model(mut self, block: Block) -> Self {
        self.model = Some(block);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs every stage for `target`.
    pub async fn run(&self, target: &TargetSpec) -> Result<PipelineOutcome, PipelineError> {
        let config = &self.config;
        tracing::info!("pipeline for target {target}");

        // Assets.
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PipelineError::Config(format!("cannot create HTTP client: {e}")))?;
        let image_path = config.path(&config.files.image);
        let synset_path = config.path(&config.files.synset);
        download_if_missing(&client, &config.image_url, &image_path).await?;
        download_if_missing(&client, &config.synset_url, &synset_path).await?;
        let weights_path = match &config.weights_url {
            Some(url) => {
                let path = config.path(&config.files.weights);
                download_if_missing(&client, url, &path).await?;
                Some(path)
            }
            None => None,
        };
        let labels = LabelMap::load(&synset_path)?;

        // Input.
        let x = normalize::transform_image(&normalize::load_image(&image_path)?)?;
        tracing::info!("input tensor {}", x.shape());

        // Conversion.
        let mut block = match &self.model {
            Some(block) => block.clone(),
            None => frontend::zoo::get_model(&config.model, config.classes)?,
        };
        match &weights_path {
            Some(path) => block.load_parameters(path)?,
            None => tracing::warn!(
                "no weights_url configured; '{}' keeps its seeded weights and \
                 predictions are not meaningful",
                block.name()
            ),
        }
        let (graph, params) = frontend::from_block(&block)?;
        let graph = graph.append_softmax();
        tracing::info!("converted {}", graph.summary());

        // Compilation.
        let shape_dict = HashMap::from([(DATA_INPUT.to_string(), x.shape().clone())]);
        let build_config = BuildConfig::new(MAX_OPT_LEVEL)?;
        let (compiled, module, params) =
            build(&graph, target, &shape_dict, &params, &build_config)?;

        // Serialisation.
        let artifacts = ArtifactSet::write(config, target, &compiled, &module, &params, &x)?;
        if target.is_cross_compile() {
            tracing::info!(
                "cross-compiled for {}; skipping local execution",
                target.target()
            );
            return Ok(PipelineOutcome::CrossCompiled { artifacts });
        }

        // Local execution.
        let ctx = DeviceContext::new(target.device(), 0);
        let prediction = execute(compiled, &artifacts, ctx, &params, x, &labels)?;
        tracing::info!(
            "prediction top-1: {} '{}' ({:.4})",
            prediction.class_index,
            prediction.label,
            prediction.score
        );
        Ok(PipelineOutcome::Executed {
            artifacts,
            prediction,
        })
    }
}

/// Loads the exported library, runs one forward pass and ranks the output.
fn execute(
    graph: CompiledGraph,
    artifacts: &ArtifactSet,
    ctx: DeviceContext,
    params: &ParamTable,
    x: Tensor,
    labels: &LabelMap,
) -> Result<Prediction, PipelineError> {
    let module = Module::load_from_file(&artifacts.library)?;
    let mut exec = GraphExecutor::create(graph, module, ctx)?;
    exec.set_input(DATA_INPUT, x)?;
    exec.set_params(params)?;
    exec.run()?;
    top1(exec.get_output(0)?, labels)
}

/// Highest-scoring class of `output` with its label.
pub fn top1(output: &Tensor, labels: &LabelMap) -> Result<Prediction, PipelineError> {
    let class_index = output.argmax().ok_or(PipelineError::EmptyOutput)?;
    let label = labels
        .get(class_index)
        .ok_or(PipelineError::LabelOutOfRange {
            index: class_index,
            len: labels.len(),
        })?;
    Ok(Prediction {
        class_index,
        label: label.to_string(),
        score: output.as_slice()[class_index],
    })
}
