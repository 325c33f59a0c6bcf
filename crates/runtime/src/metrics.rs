// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Execution profiling metrics.
//!
//! [`ExecutionMetrics`] collects per-node and aggregate timing for one
//! graph run, plus the activation storage the run touched.

use std::time::Duration;

/// Metrics for a single fused node.
#[derive(Debug, Clone, serde::Serialize)]
pub struct NodeMetrics {
    /// Node name in the compiled graph.
    pub node_name: String,
    /// Function the node called.
    pub func_name: String,
    /// Time spent in the function.
    pub compute_duration: Duration,
    /// Size of the node's output in bytes.
    pub output_bytes: usize,
}

/// Aggregate metrics for a complete run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionMetrics {
    /// Total wall-clock time for the run.
    pub total_duration: Duration,
    /// Total time spent inside functions.
    pub total_compute_duration: Duration,
    /// Bytes held by intermediate storage slots at the end of the run.
    pub storage_bytes: usize,
    /// Per-node metrics, in execution order.
    pub node_metrics: Vec<NodeMetrics>,
    /// Number of distinct storage slots in the plan.
    pub num_storage: usize,
}

impl ExecutionMetrics {
    /// Creates an empty metrics container.
    pub fn new(num_storage: usize) -> Self {
        Self {
            total_duration: Duration::ZERO,
            total_compute_duration: Duration::ZERO,
            storage_bytes: 0,
            node_metrics: Vec::new(),
            num_storage,
        }
    }

    /// Records metrics for a single node.
    pub fn record_node(
        &mut self,
        node_name: String,
        func_name: String,
        compute: Duration,
        output_bytes: usize,
    ) {
        self.total_compute_duration += compute;
        self.node_metrics.push(NodeMetrics {
            node_name,
            func_name,
            compute_duration: compute,
            output_bytes,
        });
    }

    /// Finalises metrics with the total wall-clock time and storage size.
    pub fn finalise(&mut self, total: Duration, storage_bytes: usize) {
        self.total_duration = total;
        self.storage_bytes = storage_bytes;
    }

    /// The `n` slowest nodes, slowest first.
    pub fn slowest(&self, n: usize) -> Vec<&NodeMetrics> {
        let mut sorted: Vec<&NodeMetrics> = self.node_metrics.iter().collect();
        sorted.sort_by(|a, b| b.compute_duration.cmp(&a.compute_duration));
        sorted.truncate(n);
        sorted
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let storage_mb = self.storage_bytes as f64 / (1024.0 * 1024.0);
        let compute_pct = if self.total_duration.as_secs_f64() > 0.0 {
            (self.total_compute_duration.as_secs_f64() / self.total_duration.as_secs_f64())
                * 100.0
        } else {
            0.0
        };

        format!(
            "Run: {:.2}ms total, {} nodes, {:.2}ms compute ({:.0}%), \
             {} storage slots ({:.2} MB)",
            self.total_duration.as_secs_f64() * 1000.0,
            self.node_metrics.len(),
            self.total_compute_duration.as_secs_f64() * 1000.0,
            compute_pct,
            self.num_storage,
            storage_mb,
        )
    }
}
