// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Operator fusion.
//!
//! An injective operator joins the group that produces its first operand
//! when that operand is the group's current output, has no other consumer
//! and is not a graph output. Every other operator starts a new group.

use crate::ir::PassGraph;

/// A run of operators executed as one function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Member nodes in topological order.
    pub nodes: Vec<usize>,
    /// The member whose value leaves the group.
    pub output: usize,
}

/// Partitions the operator nodes of `graph` into groups, in topological
/// order of their outputs. With `fuse` unset every operator is its own group.
pub fn fuse_groups(graph: &PassGraph, fuse: bool) -> Vec<Group> {
    let uses = graph.use_counts();
    let mut groups: Vec<Group> = Vec::new();
    let mut group_of: Vec<Option<usize>> = vec![None; graph.nodes.len()];

    for (i, node) in graph.nodes.iter().enumerate() {
        if node.is_variable() {
            continue;
        }
        let joinable = fuse && node.op.is_injective();
        let target = node
            .inputs
            .first()
            .and_then(|&p| group_of[p].map(|g| (p, g)))
            .filter(|&(p, g)| {
                joinable && groups[g].output == p && uses[p] == 1 && !graph.is_output(p)
            })
            .map(|(_, g)| g);

        let g = match target {
            Some(g) => {
                groups[g].nodes.push(i);
                groups[g].output = i;
                g
            }
            None => {
                groups.push(Group {
                    nodes: vec![i],
                    output: i,
                });
                groups.len() - 1
            }
        };
        group_of[i] = Some(g);
    }

    groups.sort_by_key(|g| g.output);
    groups
}
