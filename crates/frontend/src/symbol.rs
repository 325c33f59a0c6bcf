// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Framework symbol graphs.
//!
//! A [`Symbol`] is the framework's static graph: a list of nodes whose
//! attributes are all strings (`"(3, 3)"`, `"True"`, `"64"`), wired by
//! `[node, output, version]` triples. It is what a checkpoint stores in its
//! `-symbol.json` file.

use crate::FrontendError;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// One symbol node. Variables have `op == "null"`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SymbolNode {
    pub op: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    pub inputs: Vec<[usize; 3]>,
}

impl SymbolNode {
    pub fn is_variable(&self) -> bool {
        self.op == "null"
    }

    /// Raw attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    fn invalid(&self, key: &str, detail: impl Into<String>) -> FrontendError {
        FrontendError::InvalidAttr {
            node: self.name.clone(),
            key: key.to_string(),
            detail: detail.into(),
        }
    }

    /// Required integer attribute.
    pub fn attr_usize(&self, key: &str) -> Result<usize, FrontendError> {
        let raw = self
            .attr(key)
            .ok_or_else(|| self.invalid(key, "required attribute is missing"))?;
        raw.trim()
            .parse()
            .map_err(|_| self.invalid(key, format!("not an integer: '{raw}'")))
    }

    /// Float attribute with a default.
    pub fn attr_f32_or(&self, key: &str, default: f32) -> Result<f32, FrontendError> {
        match self.attr(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| self.invalid(key, format!("not a number: '{raw}'"))),
        }
    }

    /// Boolean attribute (`True`/`False`, `1`/`0`) with a default.
    pub fn attr_bool_or(&self, key: &str, default: bool) -> Result<bool, FrontendError> {
        match self.attr(key).map(str::trim) {
            None => Ok(default),
            Some("True" | "true" | "1") => Ok(true),
            Some("False" | "false" | "0") => Ok(false),
            Some(raw) => Err(self.invalid(key, format!("not a boolean: '{raw}'"))),
        }
    }

    /// Required pair attribute such as `"(3, 3)"`.
    pub fn attr_pair(&self, key: &str) -> Result<(usize, usize), FrontendError> {
        if self.attr(key).is_none() {
            return Err(self.invalid(key, "required attribute is missing"));
        }
        self.attr_pair_or(key, (0, 0))
    }

    /// Pair attribute such as `"(3, 3)"`, with a default when absent.
    pub fn attr_pair_or(
        &self,
        key: &str,
        default: (usize, usize),
    ) -> Result<(usize, usize), FrontendError> {
        let Some(raw) = self.attr(key) else {
            return Ok(default);
        };
        let values = parse_tuple(raw)
            .ok_or_else(|| self.invalid(key, format!("not a tuple: '{raw}'")))?;
        match values.as_slice() {
            [a, b] => Ok((*a, *b)),
            [a] => Ok((*a, *a)),
            _ => Err(self.invalid(key, format!("expected 2 values, got '{raw}'"))),
        }
    }
}

fn parse_tuple(raw: &str) -> Option<Vec<usize>> {
    let inner = raw.trim().strip_prefix('(')?.strip_suffix(')')?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}

/// Renders a pair the way symbol files spell it.
pub fn pair_attr((a, b): (usize, usize)) -> String {
    format!("({a}, {b})")
}

/// Renders a boolean the way symbol files spell it.
pub fn bool_attr(v: bool) -> String {
    if v { "True" } else { "False" }.to_string()
}

/// A framework symbol graph.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Symbol {
    pub nodes: Vec<SymbolNode>,
    pub arg_nodes: Vec<usize>,
    pub heads: Vec<[usize; 3]>,
}

impl Symbol {
    /// Name of the first head node.
    pub fn name(&self) -> &str {
        self.heads
            .first()
            .and_then(|h| self.nodes.get(h[0]))
            .map_or("symbol", |n| n.name.as_str())
    }

    /// Variables consumed as running statistics (operands 3 and 4 of a
    /// `BatchNorm`). These are auxiliary states, not arguments.
    pub fn list_auxiliary_states(&self) -> Vec<&str> {
        let aux: HashSet<usize> = self
            .nodes
            .iter()
            .filter(|n| n.op == "BatchNorm")
            .flat_map(|n| n.inputs.iter().skip(3).map(|e| e[0]))
            .collect();
        self.arg_nodes
            .iter()
            .filter(|&&i| aux.contains(&i))
            .map(|&i| self.nodes[i].name.as_str())
            .collect()
    }

    /// Variables that are not auxiliary states, in graph order.
    pub fn list_arguments(&self) -> Vec<&str> {
        let aux: HashSet<&str> = self.list_auxiliary_states().into_iter().collect();
        self.arg_nodes
            .iter()
            .map(|&i| self.nodes[i].name.as_str())
            .filter(|n| !aux.contains(n))
            .collect()
    }

    /// Checks wiring: inputs name earlier nodes, arg nodes are variables.
    pub fn validate(&self) -> Result<(), FrontendError> {
        for (i, node) in self.nodes.iter().enumerate() {
            if let Some(e) = node.inputs.iter().find(|e| e[0] >= i) {
                return Err(FrontendError::InvalidSymbol(format!(
                    "node '{}' reads node {} which is not earlier",
                    node.name, e[0]
                )));
            }
        }
        for &a in &self.arg_nodes {
            if !self.nodes.get(a).is_some_and(SymbolNode::is_variable) {
                return Err(FrontendError::InvalidSymbol(format!(
                    "arg node {a} is not a variable"
                )));
            }
        }
        if self.heads.is_empty() || self.heads.iter().any(|h| h[0] >= self.nodes.len()) {
            return Err(FrontendError::InvalidSymbol("missing or dangling heads".into()));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, FrontendError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, FrontendError> {
        let symbol: Self = serde_json::from_str(text)?;
        symbol.validate()?;
        Ok(symbol)
    }

    pub fn save(&self, path: &Path) -> Result<(), FrontendError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, FrontendError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

/// Incremental symbol construction, used when tracing a block.
#[derive(Debug, Default)]
pub struct SymbolBuilder {
    nodes: Vec<SymbolNode>,
    arg_nodes: Vec<usize>,
}

impl SymbolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a variable and returns its node index.
    pub fn var(&mut self, name: impl Into<String>) -> usize {
        self.nodes.push(SymbolNode {
            op: "null".into(),
            name: name.into(),
            attrs: BTreeMap::new(),
            inputs: Vec::new(),
        });
        let id = self.nodes.len() - 1;
        self.arg_nodes.push(id);
        id
    }

    /// Adds an operator node reading output 0 of each input.
    pub fn op(
        &mut self,
        op: &str,
        name: impl Into<String>,
        attrs: Vec<(&'static str, String)>,
        inputs: &[usize],
    ) -> usize {
        self.nodes.push(SymbolNode {
            op: op.to_string(),
            name: name.into(),
            attrs: attrs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            inputs: inputs.iter().map(|&i| [i, 0, 0]).collect(),
        });
        self.nodes.len() - 1
    }

    pub fn finish(self, head: usize) -> Symbol {
        Symbol {
            nodes: self.nodes,
            arg_nodes: self.arg_nodes,
            heads: vec![[head, 0, 0]],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv_bn() -> Symbol {
        let mut b = SymbolBuilder::new();
        let data = b.var("data");
        let w = b.var("conv0_weight");
        let conv = b.op(
            "Convolution",
            "conv0_fwd",
            vec![
                ("kernel", pair_attr((3, 3))),
                ("num_filter", "4".to_string()),
                ("no_bias", bool_attr(true)),
            ],
            &[data, w],
        );
        let gamma = b.var("bn0_gamma");
        let beta = b.var("bn0_beta");
        let mean = b.var("bn0_running_mean");
        let var = b.var("bn0_running_var");
        let bn = b.op("BatchNorm", "bn0_fwd", vec![], &[conv, gamma, beta, mean, var]);
        b.finish(bn)
    }

    #[test]
    fn test_arguments_and_aux() {
        let s = conv_bn();
        assert_eq!(
            s.list_arguments(),
            vec!["data", "conv0_weight", "bn0_gamma", "bn0_beta"]
        );
        assert_eq!(
            s.list_auxiliary_states(),
            vec!["bn0_running_mean", "bn0_running_var"]
        );
        assert_eq!(s.name(), "bn0_fwd");
    }

    #[test]
    fn test_attr_parsing() {
        let s = conv_bn();
        let conv = &s.nodes[2];
        assert_eq!(conv.attr_pair_or("kernel", (1, 1)).unwrap(), (3, 3));
        assert_eq!(conv.attr_pair_or("stride", (1, 1)).unwrap(), (1, 1));
        assert_eq!(conv.attr_usize("num_filter").unwrap(), 4);
        assert!(conv.attr_bool_or("no_bias", false).unwrap());
        assert!(conv.attr_usize("num_group").is_err());
    }

    #[test]
    fn test_parse_tuple_variants() {
        assert_eq!(parse_tuple("(2, 2)"), Some(vec![2, 2]));
        assert_eq!(parse_tuple("(7,)"), Some(vec![7]));
        assert_eq!(parse_tuple("2, 2"), None);
        assert_eq!(parse_tuple("(a, 2)"), None);
    }

    #[test]
    fn test_json_shape() {
        let text = conv_bn().to_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["nodes"][0]["op"], "null");
        assert!(v["nodes"][0].get("attrs").is_none());
        assert_eq!(v["nodes"][2]["attrs"]["kernel"], "(3, 3)");
        assert_eq!(v["heads"], serde_json::json!([[7, 0, 0]]));
        assert_eq!(Symbol::from_json(&text).unwrap(), conv_bn());
    }

    #[test]
    fn test_validate_rejects_forward_reference() {
        let mut s = conv_bn();
        s.nodes[2].inputs[0] = [5, 0, 0];
        assert!(matches!(s.validate(), Err(FrontendError::InvalidSymbol(_))));
    }
}
