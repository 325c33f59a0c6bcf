// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Evaluates parameter-only subgraphs at build time and drops parameters
//! the graph no longer reads.

use crate::ir::PassGraph;
use crate::pass::Pass;
use crate::CompileError;
use graph_ir::{OpKind, ParamTable};
use std::collections::HashSet;
use tensor_core::Tensor;

#[derive(Debug, Clone, Copy, Default)]
pub struct PrecomputePrune;

impl Pass for PrecomputePrune {
    fn name(&self) -> &str {
        "precompute-prune"
    }

    fn min_opt_level(&self) -> u8 {
        2
    }

    fn run(&self, graph: &mut PassGraph, params: &mut ParamTable) -> Result<usize, CompileError> {
        let mut folded = 0;
        for i in 0..graph.nodes.len() {
            if graph.nodes[i].is_variable() {
                continue;
            }
            let Some(operands) = graph.nodes[i]
                .inputs
                .iter()
                .map(|&j| graph.param(j, params))
                .collect::<Option<Vec<&Tensor>>>()
            else {
                continue;
            };
            let node = &graph.nodes[i];
            let value = node.op.evaluate(&node.name, &operands)?;
            tracing::trace!("precomputed '{}' ({})", node.name, value.shape());
            params.insert(node.name.clone(), value);
            let node = &mut graph.nodes[i];
            node.op = OpKind::Variable;
            node.inputs.clear();
            folded += 1;
        }

        graph.compact();
        let live: HashSet<String> = (0..graph.nodes.len())
            .filter(|&i| graph.nodes[i].is_variable() && !graph.is_input(i))
            .map(|i| graph.nodes[i].name.clone())
            .collect();
        let before = params.len();
        params.retain(|name| live.contains(name));
        let pruned = before - params.len();
        if pruned > 0 {
            tracing::debug!("pruned {pruned} unused parameter(s)");
        }
        Ok(folded + pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::pass::SimplifyInference;
    use graph_ir::{Graph, Node, DATA_INPUT};
    use std::collections::HashMap;
    use tensor_core::Shape;

    #[test]
    fn test_prunes_stale_batch_norm_stats() {
        let (graph, mut params, shapes) = fixtures::conv_bn_relu();
        let mut g = PassGraph::new(&graph, &shapes, &params).unwrap();
        SimplifyInference.run(&mut g, &mut params).unwrap();
        g.compact();
        assert!(params.contains("bn0_gamma"));

        PrecomputePrune.run(&mut g, &mut params).unwrap();
        let mut names: Vec<_> = params.names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            vec!["bn0_scale", "bn0_shift", "conv0_bias", "conv0_weight"]
        );
    }

    #[test]
    fn test_folds_constant_subgraph() {
        // relu(w) is constant; data + relu(w) is not.
        let graph = Graph::new(
            "const".into(),
            vec![
                Node::variable(DATA_INPUT),
                Node::variable("w"),
                Node::new("relu_w", OpKind::Relu, vec![1]),
                Node::new("sum", OpKind::Add, vec![0, 2]),
            ],
            vec![3],
        )
        .validate()
        .unwrap();
        let mut params = ParamTable::new();
        params.insert(
            "w",
            Tensor::from_vec(Shape::vector(2), vec![-1.0, 2.0]).unwrap(),
        );
        let shapes = HashMap::from([(DATA_INPUT.to_string(), Shape::vector(2))]);
        let mut g = PassGraph::new(&graph, &shapes, &params).unwrap();

        let rewrites = PrecomputePrune.run(&mut g, &mut params).unwrap();
        assert_eq!(rewrites, 2); // one fold, one prune
        assert_eq!(g.num_ops(), 1);
        assert!(!params.contains("w"));
        assert_eq!(params.get("relu_w").unwrap().as_slice(), &[0.0, 2.0]);
    }
}
