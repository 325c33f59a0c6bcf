// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Reference evaluation of a portable graph.

use crate::{Graph, GraphError, ParamTable, Validated};
use std::collections::HashMap;
use tensor_core::Tensor;

/// Evaluates `graph` node by node and returns its outputs.
///
/// Variables are bound from `inputs` first, then from `params`. This is the
/// unoptimised meaning of the graph that compiled modules are checked against.
pub fn interpret(
    graph: &Graph<Validated>,
    inputs: &HashMap<String, Tensor>,
    params: &ParamTable,
) -> Result<Vec<Tensor>, GraphError> {
    let mut values: Vec<Option<Tensor>> = vec![None; graph.num_nodes()];

    for (i, node) in graph.nodes().iter().enumerate() {
        let value = if node.is_variable() {
            inputs
                .get(&node.name)
                .or_else(|| params.get(&node.name))
                .cloned()
                .ok_or_else(|| GraphError::UnboundVariable(node.name.clone()))?
        } else {
            let operands = node
                .inputs
                .iter()
                .map(|&j| values[j].as_ref())
                .collect::<Option<Vec<&Tensor>>>()
                .ok_or_else(|| GraphError::InvalidNode {
                    node: node.name.clone(),
                    detail: "operand evaluated out of order".into(),
                })?;
            node.op.evaluate(&node.name, &operands)?
        };
        values[i] = Some(value);
    }

    graph
        .outputs()
        .iter()
        .map(|&o| {
            values[o].take().ok_or_else(|| {
                GraphError::InvalidGraph(format!("output {o} listed more than once"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Node, OpKind};
    use tensor_core::Shape;

    #[test]
    fn test_interpret_scale_relu_softmax() {
        let graph = Graph::new(
            "affine".into(),
            vec![
                Node::variable("data"),
                Node::variable("gamma"),
                Node::variable("beta"),
                Node::new("affine0", OpKind::ScaleShift, vec![0, 1, 2]),
                Node::new("relu0", OpKind::Relu, vec![3]),
            ],
            vec![4],
        )
        .validate()
        .unwrap()
        .append_softmax();

        let mut params = ParamTable::new();
        params.insert("gamma", Tensor::full(Shape::vector(1), 2.0));
        params.insert("beta", Tensor::full(Shape::vector(1), -1.0));
        let x = Tensor::from_vec(Shape::nchw(1, 1, 1, 2), vec![1.0, 0.0]).unwrap();
        let inputs = HashMap::from([("data".to_string(), x)]);

        let out = interpret(&graph, &inputs, &params).unwrap();
        // relu(2*[1,0] - 1) = [1, 0]
        let e = std::f32::consts::E;
        let expected = [e / (e + 1.0), 1.0 / (e + 1.0)];
        for (a, b) in out[0].as_slice().iter().zip(expected) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_unbound_variable() {
        let graph = Graph::new(
            "g".into(),
            vec![Node::variable("data"), Node::new("r", OpKind::Relu, vec![0])],
            vec![1],
        )
        .validate()
        .unwrap();
        let err = interpret(&graph, &HashMap::new(), &ParamTable::new()).unwrap_err();
        assert!(matches!(err, GraphError::UnboundVariable(ref n) if n == "data"));
    }
}
