// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Portable graph: a DAG of named operator nodes.
//!
//! # Type-State Pattern
//!
//! ```text
//! Graph<Unchecked>  ─ nodes assembled by a frontend, not yet checked.
//!       │  .validate()
//!       ▼
//! Graph<Validated>  ─ names unique, edges acyclic, arities correct.
//! ```
//!
//! The compiler only accepts `Graph<Validated>`. Nodes are stored in
//! topological order: every operand index points at an earlier node.

use crate::{GraphError, OpKind};
use std::collections::HashSet;
use std::fmt;

/// Marker: graph has been assembled but not validated.
#[derive(Debug, Clone)]
pub struct Unchecked;

/// Marker: graph has been validated and can be compiled or interpreted.
#[derive(Debug, Clone)]
pub struct Validated;

/// Sealed trait for graph states.
pub trait GraphState: fmt::Debug + Clone {}
impl GraphState for Unchecked {}
impl GraphState for Validated {}

/// One operator application (or a variable) in the graph.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Node {
    /// Unique node name. For variables this is the input or parameter name.
    pub name: String,
    pub op: OpKind,
    /// Indices of operand nodes, in the operator's operand order.
    pub inputs: Vec<usize>,
}

impl Node {
    pub fn new(name: impl Into<String>, op: OpKind, inputs: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            op,
            inputs,
        }
    }

    /// A variable node: a graph input or a parameter.
    pub fn variable(name: impl Into<String>) -> Self {
        Self::new(name, OpKind::Variable, Vec::new())
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.op, OpKind::Variable)
    }
}

/// A model as a DAG of nodes plus the list of output node indices.
#[derive(Debug, Clone)]
pub struct Graph<S: GraphState = Unchecked> {
    pub name: String,
    nodes: Vec<Node>,
    outputs: Vec<usize>,
    _state: std::marker::PhantomData<S>,
}

impl Graph<Unchecked> {
    pub fn new(name: String, nodes: Vec<Node>, outputs: Vec<usize>) -> Self {
        Self {
            name,
            nodes,
            outputs,
            _state: std::marker::PhantomData,
        }
    }

    /// Validates the graph and transitions to the `Validated` state.
    ///
    /// # Checks
    /// - At least one node and one output.
    /// - Node names are unique.
    /// - Every operand index refers to an earlier node (so the graph is
    ///   acyclic and topologically ordered).
    /// - Operand counts match each operator's arity.
    /// - Output indices are in range.
    pub fn validate(self) -> Result<Graph<Validated>, GraphError> {
        if self.nodes.is_empty() {
            return Err(GraphError::InvalidGraph(format!(
                "graph '{}' contains no nodes",
                self.name
            )));
        }
        if self.outputs.is_empty() {
            return Err(GraphError::InvalidGraph(format!(
                "graph '{}' has no outputs",
                self.name
            )));
        }

        let mut seen = HashSet::with_capacity(self.nodes.len());
        for (i, node) in self.nodes.iter().enumerate() {
            if !seen.insert(node.name.as_str()) {
                return Err(GraphError::InvalidNode {
                    node: node.name.clone(),
                    detail: "duplicate node name".into(),
                });
            }
            if node.inputs.len() != node.op.arity() {
                return Err(GraphError::InvalidNode {
                    node: node.name.clone(),
                    detail: format!(
                        "{} expects {} operands, got {}",
                        node.op,
                        node.op.arity(),
                        node.inputs.len()
                    ),
                });
            }
            if let Some(&bad) = node.inputs.iter().find(|&&j| j >= i) {
                return Err(GraphError::InvalidNode {
                    node: node.name.clone(),
                    detail: format!("operand {bad} is not an earlier node"),
                });
            }
        }

        if let Some(&bad) = self.outputs.iter().find(|&&o| o >= self.nodes.len()) {
            return Err(GraphError::InvalidGraph(format!(
                "output index {bad} out of range ({} nodes)",
                self.nodes.len()
            )));
        }

        Ok(Graph {
            name: self.name,
            nodes: self.nodes,
            outputs: self.outputs,
            _state: std::marker::PhantomData,
        })
    }
}

impl Graph<Validated> {
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes in topological order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn outputs(&self) -> &[usize] {
        &self.outputs
    }

    /// Index of the node with the given name.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// Names of all variable nodes, in graph order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(|n| n.is_variable())
            .map(|n| n.name.as_str())
    }

    /// Number of operator (non-variable) nodes.
    pub fn num_ops(&self) -> usize {
        self.nodes.iter().filter(|n| !n.is_variable()).count()
    }

    /// Appends a softmax over the first output, which becomes the sole output.
    ///
    /// A graph whose output already is a softmax gets a second one; the
    /// caller asked for it, so it is only reported.
    pub fn append_softmax(mut self) -> Self {
        let head = self.outputs[0];
        if matches!(self.nodes[head].op, OpKind::Softmax) {
            tracing::warn!(
                "graph '{}' already ends in softmax; appending another",
                self.name
            );
        }
        let mut name = String::from("softmax");
        let mut k = 0;
        while self.nodes.iter().any(|n| n.name == name) {
            k += 1;
            name = format!("softmax{k}");
        }
        self.nodes.push(Node::new(name, OpKind::Softmax, vec![head]));
        self.outputs = vec![self.nodes.len() - 1];
        self
    }

    /// Decomposes the graph into `(name, nodes, outputs)`.
    pub fn into_parts(self) -> (String, Vec<Node>, Vec<usize>) {
        (self.name, self.nodes, self.outputs)
    }

    /// One-line description of the graph.
    pub fn summary(&self) -> String {
        format!(
            "Graph '{}': {} nodes ({} operators, {} variables), {} output(s)",
            self.name,
            self.num_nodes(),
            self.num_ops(),
            self.num_nodes() - self.num_ops(),
            self.outputs.len(),
        )
    }
}

impl<S: GraphState> fmt::Display for Graph<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Graph '{}' ({} nodes):", self.name, self.nodes.len())?;
        for (i, node) in self.nodes.iter().filter(|n| !n.is_variable()).enumerate() {
            let operands: Vec<&str> = node
                .inputs
                .iter()
                .map(|&j| self.nodes[j].name.as_str())
                .collect();
            writeln!(f, "  [{i:3}] {} = {}({})", node.name, node.op, operands.join(", "))?;
        }
        Ok(())
    }
}
