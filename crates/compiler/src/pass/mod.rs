// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The [`Pass`] trait and the graph-level optimisation passes.

pub mod fold_scale_axis;
pub mod precompute_prune;
pub mod simplify_inference;

pub use fold_scale_axis::FoldScaleAxis;
pub use precompute_prune::PrecomputePrune;
pub use simplify_inference::SimplifyInference;

use crate::ir::PassGraph;
use crate::{BuildConfig, CompileError};
use graph_ir::ParamTable;

/// A graph-to-graph rewrite.
///
/// Passes operate on a [`PassGraph`] and may add or drop parameters. They
/// perform no I/O and are unit-testable in isolation.
pub trait Pass: Send + Sync {
    /// Human-readable name, used in logs.
    fn name(&self) -> &str;

    /// Lowest optimisation level at which the pass runs.
    fn min_opt_level(&self) -> u8;

    /// Rewrites `graph` in place and returns the number of rewrites made.
    fn run(&self, graph: &mut PassGraph, params: &mut ParamTable) -> Result<usize, CompileError>;
}

/// Passes in the order the driver applies them.
pub fn default_passes() -> Vec<Box<dyn Pass>> {
    vec![
        Box::new(SimplifyInference),
        Box::new(FoldScaleAxis),
        Box::new(PrecomputePrune),
    ]
}

/// Runs every pass enabled at `config`'s level, restoring topological order
/// and shapes after each one.
pub fn run_passes(
    passes: &[Box<dyn Pass>],
    graph: &mut PassGraph,
    params: &mut ParamTable,
    config: &BuildConfig,
) -> Result<(), CompileError> {
    for pass in passes {
        if config.opt_level() < pass.min_opt_level() {
            tracing::debug!(
                "skipping pass '{}' (needs opt_level {})",
                pass.name(),
                pass.min_opt_level()
            );
            continue;
        }
        let before = graph.num_ops();
        let rewrites = pass.run(graph, params)?;
        graph.compact();
        graph.infer_shapes()?;
        tracing::debug!(
            "pass '{}': {} rewrite(s), {} → {} operators",
            pass.name(),
            rewrites,
            before,
            graph.num_ops()
        );
    }
    Ok(())
}
