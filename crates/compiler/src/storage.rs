// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Storage planning for compiled graph entries.
//!
//! Argument entries each get a dedicated slot. Intermediate entries share
//! slots once their last consumer has run. A node's output is allocated
//! before its inputs are released, so no node writes into a slot it reads.
//! Graph heads are never released.

use graph_ir::{GraphNode, NodeEntry};

/// Assigns a storage slot to every entry (one entry per node).
///
/// `sizes[i]` is the element count of node `i`'s output. Free slots are
/// reused best-fit; when none is large enough the largest free slot is
/// grown.
pub fn plan_storage(nodes: &[GraphNode], sizes: &[usize], heads: &[NodeEntry]) -> Vec<usize> {
    let mut refs = vec![0usize; nodes.len()];
    for node in nodes {
        for e in &node.inputs {
            refs[e.node()] += 1;
        }
    }
    let mut pinned = vec![false; nodes.len()];
    for h in heads {
        pinned[h.node()] = true;
    }

    let mut slot_size: Vec<usize> = Vec::new();
    let mut free: Vec<usize> = Vec::new();
    let mut storage = Vec::with_capacity(nodes.len());

    for (i, node) in nodes.iter().enumerate() {
        let need = sizes[i];
        let slot = if node.is_arg() {
            None
        } else {
            take_free(&mut free, &slot_size, need)
        };
        let slot = match slot {
            Some(s) => {
                slot_size[s] = slot_size[s].max(need);
                s
            }
            None => {
                slot_size.push(need);
                slot_size.len() - 1
            }
        };
        storage.push(slot);

        for e in &node.inputs {
            let j = e.node();
            refs[j] -= 1;
            if refs[j] == 0 && !nodes[j].is_arg() && !pinned[j] {
                free.push(storage[j]);
            }
        }
    }
    storage
}

fn take_free(free: &mut Vec<usize>, slot_size: &[usize], need: usize) -> Option<usize> {
    let best = free
        .iter()
        .enumerate()
        .filter(|&(_, &s)| slot_size[s] >= need)
        .min_by_key(|&(_, &s)| slot_size[s])
        .or_else(|| free.iter().enumerate().max_by_key(|&(_, &s)| slot_size[s]))
        .map(|(k, _)| k)?;
    Some(free.swap_remove(best))
}
