// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Inference-time simplification.
//!
//! - `BatchNorm` with constant statistics becomes `ScaleShift`:
//!   `scale = gamma / sqrt(var + eps)`, `shift = beta - mean * scale`.
//! - `Dropout` is removed; its uses read its operand directly.

use crate::ir::PassGraph;
use crate::pass::Pass;
use crate::CompileError;
use graph_ir::{OpKind, ParamTable};
use tensor_core::{Shape, Tensor};

#[derive(Debug, Clone, Copy, Default)]
pub struct SimplifyInference;

impl Pass for SimplifyInference {
    fn name(&self) -> &str {
        "simplify-inference"
    }

    fn min_opt_level(&self) -> u8 {
        0
    }

    fn run(&self, graph: &mut PassGraph, params: &mut ParamTable) -> Result<usize, CompileError> {
        let mut rewrites = 0;
        for i in 0..graph.nodes.len() {
            match graph.nodes[i].op {
                OpKind::Dropout { .. } => {
                    let source = graph.nodes[i].inputs[0];
                    graph.replace_uses(i, source);
                    rewrites += 1;
                }
                OpKind::BatchNorm { epsilon } => {
                    let Some((scale, shift)) = fold_batch_norm(graph, i, epsilon, params) else {
                        continue;
                    };
                    let name = graph.nodes[i].name.clone();
                    let scale = graph.add_param(format!("{name}_scale"), scale, params);
                    let shift = graph.add_param(format!("{name}_shift"), shift, params);
                    let node = &mut graph.nodes[i];
                    node.op = OpKind::ScaleShift;
                    node.inputs = vec![node.inputs[0], scale, shift];
                    rewrites += 1;
                }
                _ => {}
            }
        }
        Ok(rewrites)
    }
}

/// Per-channel `(scale, shift)` for a batch-norm node whose four statistics
/// are all bound parameters.
fn fold_batch_norm(
    graph: &PassGraph,
    index: usize,
    epsilon: f32,
    params: &ParamTable,
) -> Option<(Tensor, Tensor)> {
    let stats: Vec<&Tensor> = graph.nodes[index].inputs[1..]
        .iter()
        .map(|&j| graph.param(j, params))
        .collect::<Option<_>>()?;
    let (gamma, beta, mean, var) = (
        stats[0].as_slice(),
        stats[1].as_slice(),
        stats[2].as_slice(),
        stats[3].as_slice(),
    );
    let scale: Vec<f32> = gamma
        .iter()
        .zip(var)
        .map(|(g, v)| g / (v + epsilon).sqrt())
        .collect();
    let shift: Vec<f32> = beta
        .iter()
        .zip(mean)
        .zip(&scale)
        .map(|((b, m), s)| b - m * s)
        .collect();
    let channels = Shape::vector(scale.len());
    Some((
        Tensor::from_vec(channels.clone(), scale).ok()?,
        Tensor::from_vec(channels, shift).ok()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_batch_norm_becomes_scale_shift() {
        let (graph, mut params, shapes) = fixtures::conv_bn_relu();
        let mut g = PassGraph::new(&graph, &shapes, &params).unwrap();
        let rewrites = SimplifyInference.run(&mut g, &mut params).unwrap();
        g.compact();
        g.infer_shapes().unwrap();

        assert_eq!(rewrites, 2); // batch norm + dropout
        assert!(g.nodes.iter().all(|n| !matches!(
            n.op,
            OpKind::BatchNorm { .. } | OpKind::Dropout { .. }
        )));
        let scale = params.get("bn0_scale").unwrap();
        // gamma = 2, var = 3, eps = 1 → 2 / sqrt(4) = 1
        assert!((scale.as_slice()[0] - 1.0).abs() < 1e-6);
        let shift = params.get("bn0_shift").unwrap();
        // beta = 0.5, mean = 1 → 0.5 - 1 * 1 = -0.5
        assert!((shift.as_slice()[0] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_matches_reference_semantics() {
        let (graph, params, shapes) = fixtures::conv_bn_relu();
        let expected = fixtures::reference(&graph, &params);
        let mut p = params.clone();
        let mut g = PassGraph::new(&graph, &shapes, &p).unwrap();
        SimplifyInference.run(&mut g, &mut p).unwrap();
        g.compact();
        g.infer_shapes().unwrap();
        let actual = fixtures::evaluate(&g, &p);
        assert!(actual.max_abs_diff(&expected).unwrap() < 1e-5);
    }

    #[test]
    fn test_batch_norm_with_unbound_stats_is_kept() {
        let (graph, params, mut shapes) = fixtures::conv_bn_relu();
        let mut p = params.clone();
        p.remove("bn0_gamma");
        shapes.insert("bn0_gamma".into(), Shape::vector(3));
        let mut g = PassGraph::new(&graph, &shapes, &p).unwrap();
        SimplifyInference.run(&mut g, &mut p).unwrap();
        assert!(g
            .nodes
            .iter()
            .any(|n| matches!(n.op, OpKind::BatchNorm { .. })));
    }
}
