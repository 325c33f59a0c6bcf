// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model zoo: ImageNet classifiers built as [`Block`]s.
//!
//! Only the v1 ResNets with basic residual units are provided. Weights are
//! initialised from [`INIT_SEED`]; pretrained values are loaded on top with
//! [`Block::load_parameters`].

use crate::{Block, FrontendError, Layer};
use tensor_core::{Conv2dParams, Pool2dParams};

/// Seed used for the deterministic initialisation of zoo models.
pub const INIT_SEED: u64 = 0x5eed;

/// Names accepted by [`get_model`].
pub const MODEL_NAMES: [&str; 2] = ["resnet18_v1", "resnet34_v1"];

/// Builds a zoo model with `classes` outputs.
///
/// # Errors
/// [`FrontendError::UnknownModel`] for a name not in [`MODEL_NAMES`].
pub fn get_model(name: &str, classes: usize) -> Result<Block, FrontendError> {
    let units: [usize; 4] = match name {
        "resnet18_v1" => [2, 2, 2, 2],
        "resnet34_v1" => [3, 4, 6, 3],
        other => return Err(FrontendError::UnknownModel(other.to_string())),
    };
    let mut block = resnet_v1(name, units, classes);
    block.initialize(INIT_SEED);
    tracing::info!(
        "built '{}' ({:.1}M parameters, seeded init)",
        name,
        block.num_params() as f64 / 1e6
    );
    Ok(block)
}

fn conv3x3(prefix: String, in_channels: usize, channels: usize, stride: usize) -> Layer {
    Layer::conv2d(
        prefix,
        in_channels,
        channels,
        (3, 3),
        Conv2dParams {
            strides: (stride, stride),
            padding: (1, 1),
            dilation: (1, 1),
        },
        false,
    )
}

/// A basic residual unit: two 3x3 convolutions plus an optional 1x1
/// projection when the shape changes.
fn basic_unit(
    stage: &str,
    index: usize,
    in_channels: usize,
    channels: usize,
    stride: usize,
) -> Layer {
    let p = |layer: &str| format!("{stage}unit{index}_{layer}_");
    let body = Layer::Sequential(vec![
        conv3x3(p("conv0"), in_channels, channels, stride),
        Layer::batch_norm(p("batchnorm0"), channels),
        Layer::Relu {
            prefix: p("relu0"),
        },
        conv3x3(p("conv1"), channels, channels, 1),
        Layer::batch_norm(p("batchnorm1"), channels),
    ]);
    let downsample = (stride != 1 || in_channels != channels).then(|| {
        Box::new(Layer::Sequential(vec![
            Layer::conv2d(
                p("conv2"),
                in_channels,
                channels,
                (1, 1),
                Conv2dParams {
                    strides: (stride, stride),
                    ..Default::default()
                },
                false,
            ),
            Layer::batch_norm(p("batchnorm2"), channels),
        ]))
    });
    Layer::Residual {
        prefix: format!("{stage}unit{index}_"),
        body: Box::new(body),
        downsample,
    }
}

fn resnet_v1(name: &str, units: [usize; 4], classes: usize) -> Block {
    let root = "resnetv10_";
    let mut layers = vec![
        Layer::conv2d(
            format!("{root}conv0_"),
            3,
            64,
            (7, 7),
            Conv2dParams {
                strides: (2, 2),
                padding: (3, 3),
                dilation: (1, 1),
            },
            false,
        ),
        Layer::batch_norm(format!("{root}batchnorm0_"), 64),
        Layer::Relu {
            prefix: format!("{root}relu0_"),
        },
        Layer::MaxPool2d {
            prefix: format!("{root}pool0_"),
            pool: Pool2dParams {
                pool_size: (3, 3),
                strides: (2, 2),
                padding: (1, 1),
            },
        },
    ];

    let channels = [64, 128, 256, 512];
    let mut in_channels = 64;
    for (s, (&n, &c)) in units.iter().zip(&channels).enumerate() {
        let stage = format!("{root}stage{}_", s + 1);
        let stride = if s == 0 { 1 } else { 2 };
        for u in 0..n {
            let unit_stride = if u == 0 { stride } else { 1 };
            layers.push(basic_unit(&stage, u, in_channels, c, unit_stride));
            in_channels = c;
        }
    }

    layers.push(Layer::GlobalAvgPool2d {
        prefix: format!("{root}pool1_"),
    });
    layers.push(Layer::dense(format!("{root}dense0_"), in_channels, classes, true));
    Block::new(name, layers)
}
