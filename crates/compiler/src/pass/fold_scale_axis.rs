// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Folds a per-channel `ScaleShift` into the convolution feeding it.
//!
//! ```text
//! w'[o, ..] = w[o, ..] * scale[o]
//! b'[o]     = b[o] * scale[o] + shift[o]     (b = 0 without a bias)
//! ```
//!
//! Applies only when the convolution has no other consumer and every
//! tensor involved is a bound parameter.

use crate::ir::PassGraph;
use crate::pass::Pass;
use crate::CompileError;
use graph_ir::{OpKind, ParamTable};
use tensor_core::{Shape, Tensor};

#[derive(Debug, Clone, Copy, Default)]
pub struct FoldScaleAxis;

impl Pass for FoldScaleAxis {
    fn name(&self) -> &str {
        "fold-scale-axis"
    }

    fn min_opt_level(&self) -> u8 {
        3
    }

    fn run(&self, graph: &mut PassGraph, params: &mut ParamTable) -> Result<usize, CompileError> {
        let uses = graph.use_counts();
        let mut rewrites = 0;
        for i in 0..graph.nodes.len() {
            if graph.nodes[i].op != OpKind::ScaleShift {
                continue;
            }
            let conv = graph.nodes[i].inputs[0];
            if uses[conv] != 1 || graph.is_output(conv) {
                continue;
            }
            let Some((weight, bias)) = fold(graph, i, conv, params) else {
                continue;
            };

            let name = graph.nodes[conv].name.clone();
            let weight = graph.add_param(format!("{name}_weight_scaled"), weight, params);
            let bias = graph.add_param(format!("{name}_bias_scaled"), bias, params);
            let node = &mut graph.nodes[conv];
            if let OpKind::Conv2d { use_bias, .. } = &mut node.op {
                *use_bias = true;
            }
            node.inputs = vec![node.inputs[0], weight, bias];
            graph.replace_uses(i, conv);
            rewrites += 1;
        }
        Ok(rewrites)
    }
}

fn fold(
    graph: &PassGraph,
    scale_shift: usize,
    conv: usize,
    params: &ParamTable,
) -> Option<(Tensor, Tensor)> {
    let conv_node = &graph.nodes[conv];
    let OpKind::Conv2d { use_bias, .. } = conv_node.op else {
        return None;
    };
    let weight = graph.param(conv_node.inputs[1], params)?;
    let bias = if use_bias {
        Some(graph.param(conv_node.inputs[2], params)?)
    } else {
        None
    };
    let ss = &graph.nodes[scale_shift];
    let scale = graph.param(ss.inputs[1], params)?.as_slice();
    let shift = graph.param(ss.inputs[2], params)?.as_slice();

    let out_channels = weight.shape().dim(0)?;
    if scale.len() != out_channels || shift.len() != out_channels {
        return None;
    }
    let per_channel = weight.num_elements() / out_channels;

    let mut w = weight.as_slice().to_vec();
    for (o, chunk) in w.chunks_mut(per_channel).enumerate() {
        chunk.iter_mut().for_each(|v| *v *= scale[o]);
    }
    let b: Vec<f32> = (0..out_channels)
        .map(|o| bias.map_or(0.0, |b| b.as_slice()[o]) * scale[o] + shift[o])
        .collect();

    Some((
        Tensor::from_vec(weight.shape().clone(), w).ok()?,
        Tensor::from_vec(Shape::vector(out_channels), b).ok()?,
    ))
}
