// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Live model blocks.
//!
//! A [`Block`] is an in-memory model: a tree of [`Layer`]s, each owning its
//! [`Parameter`]s. Tracing a block over a `data` variable yields the
//! equivalent [`Symbol`]; parameter names are the layer prefix plus the
//! parameter role (`resnetv10_conv0_weight`).

use crate::symbol::{bool_attr, pair_attr, Symbol, SymbolBuilder};
use crate::FrontendError;
use graph_ir::{ParamTable, DATA_INPUT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use tensor_core::{Conv2dParams, Pool2dParams, Shape, Tensor};

/// Whether a parameter is learned or a running statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Arg,
    Aux,
}

/// A named parameter owned by a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub data: Tensor,
}

impl Parameter {
    fn new(name: String, kind: ParamKind, shape: Shape) -> Self {
        Self {
            name,
            kind,
            data: Tensor::zeros(shape),
        }
    }

    /// Replaces the value, keeping the declared shape.
    pub fn set_data(&mut self, value: Tensor) -> Result<(), FrontendError> {
        if value.shape() != self.data.shape() {
            return Err(FrontendError::ParamShape {
                name: self.name.clone(),
                expected: self.data.shape().clone(),
                actual: value.shape().clone(),
            });
        }
        self.data = value;
        Ok(())
    }
}

/// One layer of a block. Container variants nest other layers.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Conv2d {
        prefix: String,
        channels: usize,
        kernel: (usize, usize),
        conv: Conv2dParams,
        weight: Parameter,
        bias: Option<Parameter>,
    },
    BatchNorm {
        prefix: String,
        epsilon: f32,
        gamma: Parameter,
        beta: Parameter,
        running_mean: Parameter,
        running_var: Parameter,
    },
    Relu { prefix: String },
    MaxPool2d { prefix: String, pool: Pool2dParams },
    AvgPool2d { prefix: String, pool: Pool2dParams },
    GlobalAvgPool2d { prefix: String },
    Flatten { prefix: String },
    Dense {
        prefix: String,
        units: usize,
        weight: Parameter,
        bias: Option<Parameter>,
    },
    Dropout { prefix: String, rate: f32 },
    Softmax { prefix: String },
    Sequential(Vec<Layer>),
    /// `relu(body(x) + downsample(x))`, or `relu(body(x) + x)` without a
    /// downsample branch.
    Residual {
        prefix: String,
        body: Box<Layer>,
        downsample: Option<Box<Layer>>,
    },
}

impl Layer {
    pub fn conv2d(
        prefix: impl Into<String>,
        in_channels: usize,
        channels: usize,
        kernel: (usize, usize),
        conv: Conv2dParams,
        use_bias: bool,
    ) -> Self {
        let prefix = prefix.into();
        let weight = Parameter::new(
            format!("{prefix}weight"),
            ParamKind::Arg,
            Shape::nchw(channels, in_channels, kernel.0, kernel.1),
        );
        let bias = use_bias.then(|| {
            Parameter::new(format!("{prefix}bias"), ParamKind::Arg, Shape::vector(channels))
        });
        Layer::Conv2d {
            prefix,
            channels,
            kernel,
            conv,
            weight,
            bias,
        }
    }

    pub fn batch_norm(prefix: impl Into<String>, channels: usize) -> Self {
        let prefix = prefix.into();
        let p = |role: &str, kind| {
            Parameter::new(format!("{prefix}{role}"), kind, Shape::vector(channels))
        };
        Layer::BatchNorm {
            epsilon: 1e-5,
            gamma: p("gamma", ParamKind::Arg),
            beta: p("beta", ParamKind::Arg),
            running_mean: p("running_mean", ParamKind::Aux),
            running_var: p("running_var", ParamKind::Aux),
            prefix,
        }
    }

    pub fn dense(prefix: impl Into<String>, in_units: usize, units: usize, use_bias: bool) -> Self {
        let prefix = prefix.into();
        let weight = Parameter::new(
            format!("{prefix}weight"),
            ParamKind::Arg,
            Shape::matrix(units, in_units),
        );
        let bias = use_bias
            .then(|| Parameter::new(format!("{prefix}bias"), ParamKind::Arg, Shape::vector(units)));
        Layer::Dense {
            prefix,
            units,
            weight,
            bias,
        }
    }

    /// Emits this layer's symbol nodes reading `x`; returns the output node.
    fn trace(&self, b: &mut SymbolBuilder, x: usize) -> usize {
        match self {
            Layer::Conv2d {
                prefix,
                channels,
                kernel,
                conv,
                weight,
                bias,
            } => {
                let mut inputs = vec![x, b.var(&weight.name)];
                if let Some(bias) = bias {
                    inputs.push(b.var(&bias.name));
                }
                b.op(
                    "Convolution",
                    format!("{prefix}fwd"),
                    vec![
                        ("kernel", pair_attr(*kernel)),
                        ("stride", pair_attr(conv.strides)),
                        ("pad", pair_attr(conv.padding)),
                        ("dilate", pair_attr(conv.dilation)),
                        ("num_filter", channels.to_string()),
                        ("num_group", "1".to_string()),
                        ("no_bias", bool_attr(bias.is_none())),
                    ],
                    &inputs,
                )
            }
            Layer::BatchNorm {
                prefix,
                epsilon,
                gamma,
                beta,
                running_mean,
                running_var,
            } => {
                let mut inputs = vec![x];
                for p in [gamma, beta, running_mean, running_var] {
                    inputs.push(b.var(&p.name));
                }
                b.op(
                    "BatchNorm",
                    format!("{prefix}fwd"),
                    vec![
                        ("eps", epsilon.to_string()),
                        ("momentum", "0.9".to_string()),
                        ("fix_gamma", bool_attr(false)),
                        ("use_global_stats", bool_attr(false)),
                        ("axis", "1".to_string()),
                    ],
                    &inputs,
                )
            }
            Layer::Relu { prefix } => b.op(
                "Activation",
                format!("{prefix}fwd"),
                vec![("act_type", "relu".to_string())],
                &[x],
            ),
            Layer::MaxPool2d { prefix, pool } => trace_pool(b, prefix, "max", pool, x),
            Layer::AvgPool2d { prefix, pool } => trace_pool(b, prefix, "avg", pool, x),
            Layer::GlobalAvgPool2d { prefix } => b.op(
                "Pooling",
                format!("{prefix}fwd"),
                vec![
                    ("kernel", pair_attr((1, 1))),
                    ("pool_type", "avg".to_string()),
                    ("global_pool", bool_attr(true)),
                ],
                &[x],
            ),
            Layer::Flatten { prefix } => b.op("Flatten", format!("{prefix}fwd"), vec![], &[x]),
            Layer::Dense {
                prefix,
                units,
                weight,
                bias,
            } => {
                let mut inputs = vec![x, b.var(&weight.name)];
                if let Some(bias) = bias {
                    inputs.push(b.var(&bias.name));
                }
                b.op(
                    "FullyConnected",
                    format!("{prefix}fwd"),
                    vec![
                        ("num_hidden", units.to_string()),
                        ("no_bias", bool_attr(bias.is_none())),
                        ("flatten", bool_attr(true)),
                    ],
                    &inputs,
                )
            }
            Layer::Dropout { prefix, rate } => b.op(
                "Dropout",
                format!("{prefix}fwd"),
                vec![("p", rate.to_string())],
                &[x],
            ),
            Layer::Softmax { prefix } => b.op(
                "softmax",
                format!("{prefix}fwd"),
                vec![("axis", "-1".to_string())],
                &[x],
            ),
            Layer::Sequential(layers) => layers.iter().fold(x, |acc, l| l.trace(b, acc)),
            Layer::Residual {
                prefix,
                body,
                downsample,
            } => {
                let y = body.trace(b, x);
                let residual = match downsample {
                    Some(d) => d.trace(b, x),
                    None => x,
                };
                let sum = b.op("elemwise_add", format!("{prefix}plus0"), vec![], &[y, residual]);
                b.op(
                    "Activation",
                    format!("{prefix}activation0_fwd"),
                    vec![("act_type", "relu".to_string())],
                    &[sum],
                )
            }
        }
    }

    /// Visits parameters in trace order.
    fn visit_params<'a>(&'a self, f: &mut impl FnMut(&'a Parameter)) {
        match self {
            Layer::Conv2d { weight, bias, .. } | Layer::Dense { weight, bias, .. } => {
                f(weight);
                if let Some(bias) = bias {
                    f(bias);
                }
            }
            Layer::BatchNorm {
                gamma,
                beta,
                running_mean,
                running_var,
                ..
            } => {
                for p in [gamma, beta, running_mean, running_var] {
                    f(p);
                }
            }
            Layer::Sequential(layers) => {
                for l in layers {
                    l.visit_params(f);
                }
            }
            Layer::Residual {
                body, downsample, ..
            } => {
                body.visit_params(f);
                if let Some(d) = downsample {
                    d.visit_params(f);
                }
            }
            _ => {}
        }
    }

    fn visit_params_mut(&mut self, f: &mut impl FnMut(&mut Parameter)) {
        match self {
            Layer::Conv2d { weight, bias, .. } | Layer::Dense { weight, bias, .. } => {
                f(weight);
                if let Some(bias) = bias {
                    f(bias);
                }
            }
            Layer::BatchNorm {
                gamma,
                beta,
                running_mean,
                running_var,
                ..
            } => {
                for p in [gamma, beta, running_mean, running_var] {
                    f(p);
                }
            }
            Layer::Sequential(layers) => {
                for l in layers {
                    l.visit_params_mut(f);
                }
            }
            Layer::Residual {
                body, downsample, ..
            } => {
                body.visit_params_mut(f);
                if let Some(d) = downsample {
                    d.visit_params_mut(f);
                }
            }
            _ => {}
        }
    }
}

fn trace_pool(
    b: &mut SymbolBuilder,
    prefix: &str,
    pool_type: &str,
    pool: &Pool2dParams,
    x: usize,
) -> usize {
    b.op(
        "Pooling",
        format!("{prefix}fwd"),
        vec![
            ("kernel", pair_attr(pool.pool_size)),
            ("stride", pair_attr(pool.strides)),
            ("pad", pair_attr(pool.padding)),
            ("pool_type", pool_type.to_string()),
            ("global_pool", bool_attr(false)),
            ("pooling_convention", "valid".to_string()),
        ],
        &[x],
    )
}

/// A live model: a named layer tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    name: String,
    root: Layer,
}

impl Block {
    pub fn new(name: impl Into<String>, layers: Vec<Layer>) -> Self {
        Self {
            name: name.into(),
            root: Layer::Sequential(layers),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Traces the block over a `data` variable.
    pub fn to_symbol(&self) -> Symbol {
        let mut b = SymbolBuilder::new();
        let data = b.var(DATA_INPUT);
        let head = self.root.trace(&mut b, data);
        b.finish(head)
    }

    /// Every parameter, in trace order.
    pub fn collect_params(&self) -> Vec<&Parameter> {
        let mut out = Vec::new();
        self.root.visit_params(&mut |p| out.push(p));
        out
    }

    /// Learned parameters and running statistics as two tables.
    pub fn param_tables(&self) -> (ParamTable, ParamTable) {
        let mut args = ParamTable::new();
        let mut auxs = ParamTable::new();
        for p in self.collect_params() {
            let table = match p.kind {
                ParamKind::Arg => &mut args,
                ParamKind::Aux => &mut auxs,
            };
            table.insert(p.name.clone(), p.data.clone());
        }
        (args, auxs)
    }

    pub fn num_params(&self) -> usize {
        self.collect_params()
            .iter()
            .map(|p| p.data.num_elements())
            .sum()
    }

    /// Fills every parameter deterministically from `seed`.
    ///
    /// Weights are Xavier-uniform. Normalisation statistics are drawn from
    /// narrow ranges around their neutral values so that batch-norm layers
    /// are not identities.
    pub fn initialize(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        self.root.visit_params_mut(&mut |p| {
            let dims = p.data.shape().dims().to_vec();
            let role = p.name.rsplit('_').next().unwrap_or_default();
            let (lo, hi) = match (role, dims.as_slice()) {
                ("weight", [out, inp, rest @ ..]) => {
                    let field: usize = rest.iter().product();
                    let bound = (6.0 / ((out + inp) * field) as f32).sqrt();
                    (-bound, bound)
                }
                ("gamma", _) | ("var", _) => (0.5, 1.5),
                ("beta", _) | ("mean", _) => (-0.1, 0.1),
                _ => (0.0, 0.0),
            };
            for v in p.data.as_mut_slice() {
                *v = if hi > lo { rng.gen_range(lo..hi) } else { lo };
            }
        });
    }

    /// Loads weights by name from a SafeTensors file.
    ///
    /// Every parameter must be present with its declared shape. Extra
    /// entries in the file are ignored.
    pub fn load_parameters(&mut self, path: &Path) -> Result<(), FrontendError> {
        let mut table = ParamTable::load(path)?;
        let mut result = Ok(());
        self.root.visit_params_mut(&mut |p| {
            if result.is_err() {
                return;
            }
            result = match table.remove(&p.name) {
                Some(value) => p.set_data(value),
                None => Err(FrontendError::MissingParam(p.name.clone())),
            };
        });
        result?;
        if !table.is_empty() {
            tracing::warn!(
                "{} unused entries in {} (first: '{}')",
                table.len(),
                path.display(),
                table.names().next().unwrap_or_default()
            );
        }
        tracing::info!("loaded parameters for '{}' from {}", self.name, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Block {
        Block::new(
            "small",
            vec![
                Layer::conv2d("small_conv0_", 3, 4, (3, 3), Conv2dParams::default(), false),
                Layer::batch_norm("small_batchnorm0_", 4),
                Layer::Relu {
                    prefix: "small_relu0_".into(),
                },
                Layer::GlobalAvgPool2d {
                    prefix: "small_pool0_".into(),
                },
                Layer::dense("small_dense0_", 4, 2, true),
            ],
        )
    }

    #[test]
    fn test_collect_params_order() {
        let names: Vec<_> = small()
            .collect_params()
            .iter()
            .map(|p| p.name.clone())
            .collect();
        assert_eq!(
            names,
            vec![
                "small_conv0_weight",
                "small_batchnorm0_gamma",
                "small_batchnorm0_beta",
                "small_batchnorm0_running_mean",
                "small_batchnorm0_running_var",
                "small_dense0_weight",
                "small_dense0_bias",
            ]
        );
    }

    #[test]
    fn test_param_tables_route_running_stats() {
        let (args, auxs) = small().param_tables();
        assert_eq!(args.len(), 5);
        assert_eq!(
            auxs.names().collect::<Vec<_>>(),
            vec!["small_batchnorm0_running_mean", "small_batchnorm0_running_var"]
        );
    }

    #[test]
    fn test_trace() {
        let sym = small().to_symbol();
        let ops: Vec<_> = sym
            .nodes
            .iter()
            .filter(|n| !n.is_variable())
            .map(|n| n.op.as_str())
            .collect();
        assert_eq!(
            ops,
            vec!["Convolution", "BatchNorm", "Activation", "Pooling", "FullyConnected"]
        );
        assert_eq!(sym.nodes[0].name, "data");
        assert_eq!(sym.name(), "small_dense0_fwd");
        assert_eq!(sym.list_auxiliary_states().len(), 2);
    }

    #[test]
    fn test_initialize_is_deterministic() {
        let mut a = small();
        let mut b = small();
        a.initialize(7);
        b.initialize(7);
        assert_eq!(a, b);
        let w = &a.collect_params()[0].data;
        assert!(w.as_slice().iter().any(|&v| v != 0.0));
        let bias = &a.collect_params()[6].data;
        assert!(bias.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_load_parameters() {
        let mut source = small();
        source.initialize(1);
        let (mut table, auxs) = source.param_tables();
        for (k, v) in auxs {
            table.insert(k, v);
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.safetensors");
        table.save(&path).unwrap();

        let mut target = small();
        target.load_parameters(&path).unwrap();
        assert_eq!(target, source);
    }

    #[test]
    fn test_load_parameters_missing_and_bad_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.safetensors");

        let mut table = ParamTable::new();
        table.insert("small_conv0_weight", Tensor::zeros(Shape::nchw(4, 3, 3, 3)));
        table.save(&path).unwrap();
        let err = small().load_parameters(&path).unwrap_err();
        assert!(matches!(err, FrontendError::MissingParam(ref n) if n == "small_batchnorm0_gamma"));

        table.insert("small_conv0_weight", Tensor::zeros(Shape::nchw(4, 3, 1, 1)));
        table.save(&path).unwrap();
        let err = small().load_parameters(&path).unwrap_err();
        assert!(matches!(err, FrontendError::ParamShape { .. }));
    }
}
