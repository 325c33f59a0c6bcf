// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The compiled graph description.
//!
//! This is the JSON document the compiler emits next to the module and the
//! parameter blob. The runtime reads it to know which fused function each
//! node calls, how entries are wired, and how storage is shared:
//!
//! ```text
//! {
//!   "nodes": [ {"op": "null", "name": "data", "inputs": []},
//!              {"op": "fused_op", "name": "fused_conv2d_relu",
//!               "attrs": {"func_name": ..., "num_inputs": "3", ...},
//!               "inputs": [[0, 0, 0], [1, 0, 0], [2, 0, 0]]}, ... ],
//!   "arg_nodes": [0, 1, 2],
//!   "heads": [[7, 0, 0]],
//!   "node_row_ptr": [0, 1, 2, ...],
//!   "attrs": { "shape": ["list_shape", [...]],
//!              "dltype": ["list_str", [...]],
//!              "storage_id": ["list_int", [...]] }
//! }
//! ```

use crate::GraphError;
use std::path::Path;
use tensor_core::Shape;

/// `op` value of argument (input or parameter) nodes.
pub const NULL_OP: &str = "null";
/// `op` value of nodes that call a fused function.
pub const FUSED_OP: &str = "fused_op";

/// Reference to one output of a node: `[node, index, version]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeEntry(pub usize, pub usize, pub usize);

impl NodeEntry {
    pub fn node(&self) -> usize {
        self.0
    }

    pub fn index(&self) -> usize {
        self.1
    }
}

/// Attributes of a `fused_op` node. Counts are strings in the document.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FuncAttrs {
    pub func_name: String,
    pub num_inputs: String,
    pub num_outputs: String,
    pub flatten_data: String,
}

impl FuncAttrs {
    pub fn new(func_name: impl Into<String>, num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            func_name: func_name.into(),
            num_inputs: num_inputs.to_string(),
            num_outputs: num_outputs.to_string(),
            flatten_data: "0".into(),
        }
    }

    pub fn num_inputs(&self) -> Result<usize, GraphError> {
        parse_count(&self.func_name, "num_inputs", &self.num_inputs)
    }

    pub fn num_outputs(&self) -> Result<usize, GraphError> {
        parse_count(&self.func_name, "num_outputs", &self.num_outputs)
    }
}

fn parse_count(func: &str, key: &str, value: &str) -> Result<usize, GraphError> {
    value.parse().map_err(|_| GraphError::InvalidNode {
        node: func.to_string(),
        detail: format!("{key} is not a count: '{value}'"),
    })
}

/// One node of the compiled graph.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GraphNode {
    pub op: String,
    pub name: String,
    pub inputs: Vec<NodeEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<FuncAttrs>,
}

impl GraphNode {
    pub fn arg(name: impl Into<String>) -> Self {
        Self {
            op: NULL_OP.into(),
            name: name.into(),
            inputs: Vec::new(),
            attrs: None,
        }
    }

    pub fn fused(name: impl Into<String>, attrs: FuncAttrs, inputs: Vec<NodeEntry>) -> Self {
        Self {
            op: FUSED_OP.into(),
            name: name.into(),
            inputs,
            attrs: Some(attrs),
        }
    }

    pub fn is_arg(&self) -> bool {
        self.op == NULL_OP
    }
}

/// A list attribute tagged with its element kind, e.g. `["list_int", [...]]`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tagged<T>(pub String, pub Vec<T>);

impl<T> Tagged<T> {
    pub fn new(tag: &str, values: Vec<T>) -> Self {
        Self(tag.to_string(), values)
    }

    pub fn values(&self) -> &[T] {
        &self.1
    }
}

/// Per-entry attributes, indexed by entry id.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GraphAttrs {
    pub shape: Tagged<Vec<usize>>,
    pub dltype: Tagged<String>,
    pub storage_id: Tagged<usize>,
}

/// The compiled graph description document.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompiledGraph {
    pub nodes: Vec<GraphNode>,
    pub arg_nodes: Vec<usize>,
    pub heads: Vec<NodeEntry>,
    pub node_row_ptr: Vec<usize>,
    pub attrs: GraphAttrs,
}

impl CompiledGraph {
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of node outputs across the whole graph.
    pub fn num_entries(&self) -> usize {
        self.node_row_ptr.last().copied().unwrap_or(0)
    }

    /// Entry id of output `index` of `node`.
    pub fn entry_id(&self, node: usize, index: usize) -> usize {
        self.node_row_ptr[node] + index
    }

    pub fn entry_of(&self, entry: &NodeEntry) -> usize {
        self.entry_id(entry.node(), entry.index())
    }

    pub fn shape(&self, entry_id: usize) -> Shape {
        Shape::new(self.attrs.shape.values()[entry_id].clone())
    }

    pub fn storage_id(&self, entry_id: usize) -> usize {
        self.attrs.storage_id.values()[entry_id]
    }

    /// Number of distinct storage slots.
    pub fn num_storage(&self) -> usize {
        self.attrs
            .storage_id
            .values()
            .iter()
            .max()
            .map_or(0, |&m| m + 1)
    }

    /// Names of the argument nodes (inputs and parameters), in graph order.
    pub fn arg_names(&self) -> impl Iterator<Item = &str> {
        self.arg_nodes.iter().map(|&i| self.nodes[i].name.as_str())
    }

    /// Index of the node with the given name.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    /// Checks internal consistency: row pointers, attribute lengths, wiring.
    pub fn validate(&self) -> Result<(), GraphError> {
        let invalid = |msg: String| Err(GraphError::InvalidGraph(msg));

        if self.node_row_ptr.len() != self.nodes.len() + 1 || self.node_row_ptr.first() != Some(&0)
        {
            return invalid(format!(
                "node_row_ptr has {} entries for {} nodes",
                self.node_row_ptr.len(),
                self.nodes.len()
            ));
        }
        if self.node_row_ptr.windows(2).any(|w| w[1] < w[0]) {
            return invalid("node_row_ptr is not monotonic".into());
        }
        let entries = self.num_entries();
        for (tag, len) in [
            ("shape", self.attrs.shape.values().len()),
            ("dltype", self.attrs.dltype.values().len()),
            ("storage_id", self.attrs.storage_id.values().len()),
        ] {
            if len != entries {
                return invalid(format!("attrs.{tag} has {len} values for {entries} entries"));
            }
        }
        if let Some(dt) = self
            .attrs
            .dltype
            .values()
            .iter()
            .find(|d| tensor_core::DType::from_dltype(d).is_none())
        {
            return invalid(format!("unknown dltype '{dt}'"));
        }

        for &a in &self.arg_nodes {
            match self.nodes.get(a) {
                Some(n) if n.is_arg() => {}
                _ => return invalid(format!("arg node {a} is not a null op")),
            }
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if !node.is_arg() {
                let attrs = node.attrs.as_ref().ok_or_else(|| GraphError::InvalidNode {
                    node: node.name.clone(),
                    detail: "fused node without attrs".into(),
                })?;
                if attrs.num_inputs()? != node.inputs.len() {
                    return Err(GraphError::InvalidNode {
                        node: node.name.clone(),
                        detail: format!(
                            "declares {} inputs, wired to {}",
                            attrs.num_inputs,
                            node.inputs.len()
                        ),
                    });
                }
            }
            for e in &node.inputs {
                let earlier = e.node() < i
                    && e.index() < self.node_row_ptr[e.node() + 1] - self.node_row_ptr[e.node()];
                if !earlier {
                    return Err(GraphError::InvalidNode {
                        node: node.name.clone(),
                        detail: format!("input [{}, {}] does not name an earlier output", e.0, e.1),
                    });
                }
            }
        }

        if self.heads.is_empty() {
            return invalid("graph has no heads".into());
        }
        if let Some(h) = self.heads.iter().find(|h| h.node() >= self.nodes.len()) {
            return invalid(format!("head [{}, {}] out of range", h.0, h.1));
        }
        Ok(())
    }

    /// Pretty-printed JSON text.
    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and validates a JSON document.
    pub fn from_json(text: &str) -> Result<Self, GraphError> {
        let graph: Self = serde_json::from_str(text)?;
        graph.validate()?;
        Ok(graph)
    }

    pub fn save(&self, path: &Path) -> Result<(), GraphError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, GraphError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// data, weight → fused_dense → 1 head.
    fn tiny() -> CompiledGraph {
        CompiledGraph {
            nodes: vec![
                GraphNode::arg("data"),
                GraphNode::arg("fc_weight"),
                GraphNode::fused(
                    "fused_dense",
                    FuncAttrs::new("fused_dense", 2, 1),
                    vec![NodeEntry(0, 0, 0), NodeEntry(1, 0, 0)],
                ),
            ],
            arg_nodes: vec![0, 1],
            heads: vec![NodeEntry(2, 0, 0)],
            node_row_ptr: vec![0, 1, 2, 3],
            attrs: GraphAttrs {
                shape: Tagged::new("list_shape", vec![vec![1, 4], vec![2, 4], vec![1, 2]]),
                dltype: Tagged::new("list_str", vec!["float32".into(); 3]),
                storage_id: Tagged::new("list_int", vec![0, 1, 2]),
            },
        }
    }

    #[test]
    fn test_validate_ok() {
        let g = tiny();
        g.validate().unwrap();
        assert_eq!(g.num_entries(), 3);
        assert_eq!(g.num_storage(), 3);
        assert_eq!(g.shape(2), Shape::matrix(1, 2));
        assert_eq!(g.arg_names().collect::<Vec<_>>(), vec!["data", "fc_weight"]);
    }

    #[test]
    fn test_json_layout() {
        let text = tiny().to_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["nodes"][0]["op"], "null");
        assert!(v["nodes"][0].get("attrs").is_none());
        assert_eq!(v["nodes"][2]["op"], "fused_op");
        assert_eq!(v["nodes"][2]["attrs"]["num_inputs"], "2");
        assert_eq!(v["nodes"][2]["inputs"][1], serde_json::json!([1, 0, 0]));
        assert_eq!(v["attrs"]["storage_id"][0], "list_int");
        assert_eq!(v["attrs"]["shape"][1][0], serde_json::json!([1, 4]));
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.json");
        tiny().save(&path).unwrap();
        assert_eq!(CompiledGraph::load(&path).unwrap(), tiny());
    }

    #[test]
    fn test_rejects_attr_length_mismatch() {
        let mut g = tiny();
        g.attrs.storage_id.1.pop();
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_rejects_forward_input() {
        let mut g = tiny();
        g.nodes[2].inputs[0] = NodeEntry(2, 0, 0);
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_rejects_input_count_mismatch() {
        let mut g = tiny();
        g.nodes[2].inputs.pop();
        assert!(matches!(g.validate(), Err(GraphError::InvalidNode { .. })));
    }

    #[test]
    fn test_rejects_unknown_dltype() {
        let mut g = tiny();
        g.attrs.dltype.1[0] = "float128".into();
        assert!(g.validate().is_err());
    }
}
