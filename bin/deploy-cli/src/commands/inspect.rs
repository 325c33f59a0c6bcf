// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `deploy-rt inspect` command: display a compiled graph description.
//!
//! Prints every node with its fused function, output shape and storage
//! slot, followed by the size of the storage plan.

use super::{header, truncate};
use graph_ir::CompiledGraph;
use std::path::PathBuf;
use tensor_core::DType;

pub async fn execute(graph_path: PathBuf) -> anyhow::Result<()> {
    header("Graph Inspector");

    let graph = CompiledGraph::load(&graph_path).map_err(|e| {
        anyhow::anyhow!("failed to load graph from '{}': {e}", graph_path.display())
    })?;
    graph.validate()?;

    // ── Summary ────────────────────────────────────────────────
    let fused = graph.nodes.iter().filter(|n| !n.is_arg()).count();
    let slot_bytes = storage_bytes(&graph);
    println!("  Graph: {}", graph_path.display());
    println!("  Nodes: {} ({} arguments, {fused} fused)", graph.num_nodes(), graph.arg_nodes.len());
    println!("  Outputs: {}", graph.heads.len());
    println!(
        "  Storage: {} slots, {:.2} MB",
        slot_bytes.len(),
        slot_bytes.iter().sum::<usize>() as f64 / (1024.0 * 1024.0)
    );
    println!();

    // ── Per-Node Detail ────────────────────────────────────────
    println!(
        "  {:<4} {:<32} {:<28} {:<18} {:>7}",
        "Idx", "Name", "Function", "Shape", "Storage",
    );
    println!("  {}", "-".repeat(93));

    for (i, node) in graph.nodes.iter().enumerate() {
        let entry = graph.entry_id(i, 0);
        let func = node
            .attrs
            .as_ref()
            .map_or("(argument)", |a| a.func_name.as_str());
        println!(
            "  {:<4} {:<32} {:<28} {:<18} {:>7}",
            i,
            truncate(&node.name, 32),
            truncate(func, 28),
            graph.shape(entry).to_string(),
            graph.storage_id(entry),
        );
    }
    println!();
    Ok(())
}

/// Bytes needed by each storage slot: the largest entry assigned to it.
fn storage_bytes(graph: &CompiledGraph) -> Vec<usize> {
    let mut slots = vec![0usize; graph.num_storage()];
    for entry in 0..graph.num_entries() {
        let bytes = graph.shape(entry).num_elements() * DType::F32.size_bytes();
        let slot = &mut slots[graph.storage_id(entry)];
        *slot = (*slot).max(bytes);
    }
    slots
}
