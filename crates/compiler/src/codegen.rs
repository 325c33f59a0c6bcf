// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Lowering of fused groups to functions and emission of the compiled graph.

use crate::fuse::Group;
use crate::ir::PassGraph;
use crate::storage::plan_storage;
use graph_ir::compiled::Tagged;
use graph_ir::lowered::{Operand, Step};
use graph_ir::{CompiledGraph, FuncAttrs, GraphAttrs, GraphNode, LoweredFunc, NodeEntry};
use std::collections::HashMap;
use tensor_core::DType;

/// Emits the compiled graph and the deduplicated function set.
///
/// Variables become argument nodes; each group becomes one `fused_op` node
/// placed at its output's position and named after that output.
pub fn generate(graph: &PassGraph, groups: &[Group]) -> (CompiledGraph, Vec<LoweredFunc>) {
    let group_at: HashMap<usize, &Group> = groups.iter().map(|g| (g.output, g)).collect();
    let mut functions = FunctionTable::default();

    let mut nodes: Vec<GraphNode> = Vec::new();
    let mut shapes: Vec<Vec<usize>> = Vec::new();
    let mut compiled_index: Vec<Option<usize>> = vec![None; graph.nodes.len()];
    let mut arg_nodes = Vec::new();

    for (i, node) in graph.nodes.iter().enumerate() {
        let emitted = if node.is_variable() {
            arg_nodes.push(nodes.len());
            GraphNode::arg(node.name.clone())
        } else if let Some(group) = group_at.get(&i) {
            let (func, args) = lower_group(graph, group);
            let inputs = args
                .iter()
                .filter_map(|&a| compiled_index[a])
                .map(|n| NodeEntry(n, 0, 0))
                .collect::<Vec<_>>();
            let name = functions.intern(func);
            GraphNode::fused(node.name.clone(), FuncAttrs::new(name, inputs.len(), 1), inputs)
        } else {
            continue;
        };
        compiled_index[i] = Some(nodes.len());
        nodes.push(emitted);
        shapes.push(graph.shapes[i].dims().to_vec());
    }

    let heads: Vec<NodeEntry> = graph
        .outputs
        .iter()
        .filter_map(|&o| compiled_index[o])
        .map(|n| NodeEntry(n, 0, 0))
        .collect();
    let sizes: Vec<usize> = shapes.iter().map(|s| s.iter().product()).collect();
    let storage = plan_storage(&nodes, &sizes, &heads);
    let num_nodes = nodes.len();

    let compiled = CompiledGraph {
        nodes,
        arg_nodes,
        heads,
        node_row_ptr: (0..=num_nodes).collect(),
        attrs: GraphAttrs {
            shape: Tagged::new("list_shape", shapes),
            dltype: Tagged::new(
                "list_str",
                vec![DType::F32.as_dltype().to_string(); num_nodes],
            ),
            storage_id: Tagged::new("list_int", storage),
        },
    };
    (compiled, functions.into_functions())
}

/// Turns a group into a function; returns it with the graph nodes feeding
/// its arguments, in argument order.
fn lower_group(graph: &PassGraph, group: &Group) -> (LoweredFunc, Vec<usize>) {
    let mut args: Vec<usize> = Vec::new();
    let mut steps = Vec::with_capacity(group.nodes.len());
    for &member in &group.nodes {
        let node = &graph.nodes[member];
        let mut operands = Vec::with_capacity(node.inputs.len());
        for &j in &node.inputs {
            if let Some(s) = group.nodes.iter().position(|&m| m == j) {
                operands.push(Operand::Step(s));
                continue;
            }
            let a = match args.iter().position(|&x| x == j) {
                Some(a) => a,
                None => {
                    args.push(j);
                    args.len() - 1
                }
            };
            operands.push(Operand::Arg(a));
        }
        steps.push(Step {
            name: node.name.clone(),
            op: node.op.clone(),
            operands,
        });
    }
    let base = group
        .nodes
        .iter()
        .map(|&m| graph.nodes[m].op.as_str())
        .fold(String::from("fused"), |acc, op| acc + "_" + op);
    (
        LoweredFunc {
            name: base,
            num_args: args.len(),
            steps,
        },
        args,
    )
}

/// Functions keyed by name, shared between structurally identical groups.
#[derive(Default)]
struct FunctionTable {
    functions: Vec<LoweredFunc>,
    by_base: HashMap<String, Vec<usize>>,
}

impl FunctionTable {
    /// Returns the name under which `func` is stored, reusing an existing
    /// function with the same operators and wiring.
    fn intern(&mut self, func: LoweredFunc) -> String {
        let variants = self.by_base.entry(func.name.clone()).or_default();
        if let Some(&k) = variants
            .iter()
            .find(|&&k| same_structure(&self.functions[k], &func))
        {
            return self.functions[k].name.clone();
        }
        let name = match variants.len() {
            0 => func.name.clone(),
            n => format!("{}_{n}", func.name),
        };
        variants.push(self.functions.len());
        self.functions.push(LoweredFunc { name: name.clone(), ..func });
        name
    }

    fn into_functions(self) -> Vec<LoweredFunc> {
        self.functions
    }
}

fn same_structure(a: &LoweredFunc, b: &LoweredFunc) -> bool {
    a.num_args == b.num_args
        && a.steps.len() == b.steps.len()
        && a
            .steps
            .iter()
            .zip(&b.steps)
            .all(|(x, y)| x.op == y.op && x.operands == y.operands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::fuse::fuse_groups;
    use crate::pass::{default_passes, run_passes};
    use crate::BuildConfig;

    fn compiled(level: u8) -> (CompiledGraph, Vec<LoweredFunc>) {
        let (graph, mut params, shapes) = fixtures::residual();
        let mut g = PassGraph::new(&graph, &shapes, &params).unwrap();
        let config = BuildConfig::new(level).unwrap();
        run_passes(&default_passes(), &mut g, &mut params, &config).unwrap();
        let groups = fuse_groups(&g, config.fuse_ops());
        generate(&g, &groups)
    }

    #[test]
    fn test_emits_valid_document() {
        let (graph, functions) = compiled(3);
        graph.validate().unwrap();
        assert_eq!(graph.node_row_ptr.len(), graph.num_nodes() + 1);
        assert_eq!(graph.heads.len(), 1);
        assert_eq!(graph.nodes[graph.heads[0].node()].name, "softmax0");
        for node in graph.nodes.iter().filter(|n| !n.is_arg()) {
            let attrs = node.attrs.as_ref().unwrap();
            let func = functions
                .iter()
                .find(|f| f.name == attrs.func_name)
                .unwrap();
            assert_eq!(func.num_args, node.inputs.len());
        }
    }

    #[test]
    fn test_function_names() {
        let (_, functions) = compiled(3);
        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"fused_conv2d_relu"));
        assert!(names.contains(&"fused_conv2d_elemwise_add_relu"));
        assert!(names.contains(&"fused_global_avg_pool2d_flatten"));
        assert!(names.contains(&"fused_softmax"));
    }

    #[test]
    fn test_args_keep_dedicated_storage() {
        let (graph, _) = compiled(3);
        let arg_slots: Vec<usize> = graph
            .arg_nodes
            .iter()
            .map(|&a| graph.storage_id(graph.entry_id(a, 0)))
            .collect();
        for (i, node) in graph.nodes.iter().enumerate() {
            if !node.is_arg() {
                assert!(!arg_slots.contains(&graph.storage_id(graph.entry_id(i, 0))));
            }
        }
    }

    #[test]
    fn test_identical_groups_share_a_function() {
        // Two separate relu groups with no fusion share one function.
        let (graph, functions) = compiled(0);
        let relus = graph
            .nodes
            .iter()
            .filter(|n| n.attrs.as_ref().is_some_and(|a| a.func_name == "fused_relu"))
            .count();
        assert_eq!(relus, 2);
        assert_eq!(
            functions.iter().filter(|f| f.name.starts_with("fused_relu")).count(),
            1
        );
    }

    #[test]
    fn test_distinct_convs_get_suffixed_names() {
        let (_, functions) = compiled(0);
        // 3x3 and 1x1 convolutions differ structurally.
        let convs: Vec<_> = functions
            .iter()
            .filter(|f| f.name.starts_with("fused_conv2d"))
            .map(|f| f.name.as_str())
            .collect();
        assert!(convs.contains(&"fused_conv2d"));
        assert!(convs.contains(&"fused_conv2d_1"));
    }
}
