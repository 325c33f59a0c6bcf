// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The mutable graph that optimisation passes rewrite.
//!
//! Passes may append nodes at the end and rewire operands freely; after
//! each pass [`PassGraph::compact`] drops dead nodes and restores
//! topological order, and [`PassGraph::infer_shapes`] recomputes shapes.

use crate::CompileError;
use graph_ir::{Graph, Node, OpKind, ParamTable, Validated};
use std::collections::{HashMap, HashSet};
use tensor_core::{Shape, Tensor};

/// A graph under optimisation, with one inferred shape per node.
#[derive(Debug, Clone)]
pub struct PassGraph {
    pub name: String,
    pub nodes: Vec<Node>,
    pub outputs: Vec<usize>,
    pub shapes: Vec<Shape>,
    inputs: HashSet<String>,
}

impl PassGraph {
    /// Binds variables and infers every shape.
    ///
    /// Each variable is either a parameter (has a value in `params`) or an
    /// input (has an entry in `shape_dict`).
    pub fn new(
        graph: &Graph<Validated>,
        shape_dict: &HashMap<String, Shape>,
        params: &ParamTable,
    ) -> Result<Self, CompileError> {
        let variables: HashSet<&str> = graph.variables().collect();
        if let Some(unknown) = shape_dict.keys().find(|k| !variables.contains(k.as_str())) {
            return Err(CompileError::UnknownInput(unknown.clone()));
        }

        let weight_operands: HashSet<usize> = graph
            .nodes()
            .iter()
            .filter(|n| {
                matches!(
                    n.op,
                    OpKind::Conv2d { .. }
                        | OpKind::Dense { .. }
                        | OpKind::BatchNorm { .. }
                        | OpKind::ScaleShift
                )
            })
            .flat_map(|n| n.inputs[1..].iter().copied())
            .collect();

        let mut inputs = HashSet::new();
        let mut shapes = Vec::with_capacity(graph.num_nodes());
        for (i, node) in graph.nodes().iter().enumerate() {
            if !node.is_variable() {
                shapes.push(Shape::new(Vec::new()));
                continue;
            }
            let shape = match (params.get(&node.name), shape_dict.get(&node.name)) {
                (Some(value), Some(given)) if value.shape() != given => {
                    return Err(CompileError::ShapeMismatch {
                        name: node.name.clone(),
                        expected: value.shape().clone(),
                        actual: given.clone(),
                    });
                }
                (Some(value), _) => value.shape().clone(),
                (None, Some(given)) => {
                    inputs.insert(node.name.clone());
                    given.clone()
                }
                (None, None) if weight_operands.contains(&i) => {
                    return Err(CompileError::MissingParam(node.name.clone()));
                }
                (None, None) => return Err(CompileError::MissingInputShape(node.name.clone())),
            };
            shapes.push(shape);
        }

        let mut g = Self {
            name: graph.name.clone(),
            nodes: graph.nodes().to_vec(),
            outputs: graph.outputs().to_vec(),
            shapes,
            inputs,
        };
        g.infer_shapes()?;
        Ok(g)
    }

    /// Recomputes the shape of every operator node. Requires topological order.
    pub fn infer_shapes(&mut self) -> Result<(), CompileError> {
        for i in 0..self.nodes.len() {
            let node = &self.nodes[i];
            if node.is_variable() {
                continue;
            }
            let operands: Vec<&Shape> = node.inputs.iter().map(|&j| &self.shapes[j]).collect();
            let shape = node.op.infer_shape(&node.name, &operands)?;
            self.shapes[i] = shape;
        }
        Ok(())
    }

    /// `true` for a variable fed at run time rather than bound to a value.
    pub fn is_input(&self, index: usize) -> bool {
        self.nodes[index].is_variable() && self.inputs.contains(&self.nodes[index].name)
    }

    /// The value of a parameter node, if `index` is one.
    pub fn param<'p>(&self, index: usize, params: &'p ParamTable) -> Option<&'p Tensor> {
        let node = &self.nodes[index];
        if node.is_variable() && !self.inputs.contains(&node.name) {
            params.get(&node.name)
        } else {
            None
        }
    }

    /// Number of uses of each node, counting graph outputs as uses.
    pub fn use_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.nodes.len()];
        for node in &self.nodes {
            for &j in &node.inputs {
                counts[j] += 1;
            }
        }
        for &o in &self.outputs {
            counts[o] += 1;
        }
        counts
    }

    pub fn is_output(&self, index: usize) -> bool {
        self.outputs.contains(&index)
    }

    /// Appends a parameter variable holding `value`; returns its index.
    ///
    /// The name is made unique against existing nodes.
    pub fn add_param(&mut self, name: String, value: Tensor, params: &mut ParamTable) -> usize {
        let mut unique = name.clone();
        let mut k = 0;
        while self.nodes.iter().any(|n| n.name == unique) || params.contains(&unique) {
            k += 1;
            unique = format!("{name}{k}");
        }
        self.shapes.push(value.shape().clone());
        params.insert(unique.clone(), value);
        self.nodes.push(Node::variable(unique));
        self.nodes.len() - 1
    }

    /// Redirects every use of `old` (operands and outputs) to `new`.
    pub fn replace_uses(&mut self, old: usize, new: usize) {
        for node in &mut self.nodes {
            for j in &mut node.inputs {
                if *j == old {
                    *j = new;
                }
            }
        }
        for o in &mut self.outputs {
            if *o == old {
                *o = new;
            }
        }
    }

    /// Drops nodes the outputs do not depend on and re-sorts the rest
    /// topologically (depth-first, operands in order).
    pub fn compact(&mut self) {
        let n = self.nodes.len();
        let mut order = Vec::with_capacity(n);
        let mut state = vec![0u8; n]; // 0 = new, 1 = open, 2 = done
        for &root in &self.outputs {
            let mut stack = vec![(root, 0usize)];
            while let Some(&mut (node, ref mut next)) = stack.last_mut() {
                if state[node] == 2 {
                    stack.pop();
                    continue;
                }
                state[node] = 1;
                if let Some(&child) = self.nodes[node].inputs.get(*next) {
                    *next += 1;
                    if state[child] == 0 {
                        stack.push((child, 0));
                    }
                } else {
                    state[node] = 2;
                    order.push(node);
                    stack.pop();
                }
            }
        }

        let mut remap = vec![usize::MAX; n];
        for (new, &old) in order.iter().enumerate() {
            remap[old] = new;
        }
        let mut nodes: Vec<Option<Node>> = std::mem::take(&mut self.nodes)
            .into_iter()
            .map(Some)
            .collect();
        let mut shapes: Vec<Option<Shape>> = std::mem::take(&mut self.shapes)
            .into_iter()
            .map(Some)
            .collect();
        for &old in &order {
            if let (Some(mut node), Some(shape)) = (nodes[old].take(), shapes[old].take()) {
                node.inputs = node.inputs.iter().map(|&j| remap[j]).collect();
                self.nodes.push(node);
                self.shapes.push(shape);
            }
        }
        self.outputs = self.outputs.iter().map(|&o| remap[o]).collect();
    }

    pub fn num_ops(&self) -> usize {
        self.nodes.iter().filter(|n| !n.is_variable()).count()
    }
}
