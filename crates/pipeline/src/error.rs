// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for the end-to-end pipeline.

/// Errors raised by pipeline stages.
///
/// Failures of the frontend, compiler and runtime are carried unchanged.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    /// The HTTP request for `url` failed.
    #[error("download of '{url}' failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The label file could not be parsed.
    #[error("label map error: {0}")]
    Labels(String),

    /// The predicted class has no entry in the label map.
    #[error("class index {index} is outside the label map ({len} labels)")]
    LabelOutOfRange { index: usize, len: usize },

    /// The model produced no output to rank.
    #[error("model output is empty")]
    EmptyOutput,

    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Tensor(#[from] tensor_core::TensorError),

    #[error(transparent)]
    Graph(#[from] graph_ir::GraphError),

    #[error(transparent)]
    Frontend(#[from] frontend::FrontendError),

    #[error(transparent)]
    Compile(#[from] compiler::CompileError),

    #[error(transparent)]
    Runtime(#[from] runtime::RuntimeError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
