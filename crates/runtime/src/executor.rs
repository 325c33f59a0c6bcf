// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The graph executor.
//!
//! ```text
//! GraphExecutor::create(graph, module, ctx)
//!     │  .set_input("data", x) / .load_params(blob)
//!     ▼
//!   .run()
//!     │
//!     ▼
//!   .get_output(0)
//! ```
//!
//! Every entry lives in the storage slot named by `attrs.storage_id`.
//! Argument slots are dedicated, so bound inputs and parameters survive
//! across runs; intermediate slots are overwritten as the plan reuses them.

use crate::{DeviceContext, ExecutionMetrics, Module, RuntimeError};
use graph_ir::{CompiledGraph, LoweredFunc, ParamTable};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tensor_core::{Shape, Tensor};

/// Executes a compiled graph with the functions of a loaded module.
pub struct GraphExecutor {
    graph: CompiledGraph,
    module: Module,
    ctx: DeviceContext,
    /// Function index per node; `None` for argument nodes.
    funcs: Vec<Option<usize>>,
    storage: Vec<Option<Tensor>>,
    profiling: bool,
    metrics: Option<ExecutionMetrics>,
    has_run: bool,
}

impl GraphExecutor {
    /// Binds `graph` to `module` on `ctx`.
    ///
    /// # Errors
    /// [`RuntimeError::MissingFunction`] when a node calls a function the
    /// module lacks; [`RuntimeError::Artifact`] when the graph is malformed.
    pub fn create(
        graph: CompiledGraph,
        module: Module,
        ctx: DeviceContext,
    ) -> Result<Self, RuntimeError> {
        graph.validate()?;
        let mut funcs = Vec::with_capacity(graph.num_nodes());
        for node in &graph.nodes {
            let Some(attrs) = &node.attrs else {
                funcs.push(None);
                continue;
            };
            let index = module
                .functions()
                .iter()
                .position(|f| f.name == attrs.func_name)
                .ok_or_else(|| RuntimeError::MissingFunction {
                    node: node.name.clone(),
                    func: attrs.func_name.clone(),
                })?;
            funcs.push(Some(index));
        }
        let num_storage = graph.num_storage();
        tracing::info!(
            "executor ready on {}: {} nodes, {} storage slots",
            ctx,
            graph.num_nodes(),
            num_storage
        );
        Ok(Self {
            graph,
            module,
            ctx,
            funcs,
            storage: vec![None; num_storage],
            profiling: false,
            metrics: None,
            has_run: false,
        })
    }

    /// Enables per-node timing for subsequent runs.
    pub fn set_profiling(&mut self, enabled: bool) {
        self.profiling = enabled;
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    pub fn context(&self) -> DeviceContext {
        self.ctx
    }

    /// Binds an input or parameter by name.
    ///
    /// # Errors
    /// [`RuntimeError::UnknownInput`] when `name` is not an argument node,
    /// [`RuntimeError::InputShape`] when the shape disagrees with the graph.
    pub fn set_input(&mut self, name: &str, value: Tensor) -> Result<(), RuntimeError> {
        let node = self
            .graph
            .arg_nodes
            .iter()
            .copied()
            .find(|&a| self.graph.nodes[a].name == name)
            .ok_or_else(|| RuntimeError::UnknownInput(name.to_string()))?;
        let entry = self.graph.entry_id(node, 0);
        let expected = self.graph.shape(entry);
        if value.shape() != &expected {
            return Err(RuntimeError::InputShape {
                name: name.to_string(),
                expected,
                actual: value.shape().clone(),
            });
        }
        self.storage[self.graph.storage_id(entry)] = Some(value);
        Ok(())
    }

    /// Binds every parameter of `params` the graph reads; others are skipped.
    pub fn set_params(&mut self, params: &ParamTable) -> Result<(), RuntimeError> {
        let mut bound = 0;
        for (name, value) in params.iter() {
            match self.set_input(name, value.clone()) {
                Ok(()) => bound += 1,
                Err(RuntimeError::UnknownInput(_)) => {
                    tracing::warn!("parameter '{name}' is not read by the graph; skipped");
                }
                Err(e) => return Err(e),
            }
        }
        tracing::debug!("bound {bound} of {} parameter(s)", params.len());
        Ok(())
    }

    /// Decodes a parameter blob and binds it with [`GraphExecutor::set_params`].
    pub fn load_params(&mut self, blob: &[u8]) -> Result<(), RuntimeError> {
        let params = ParamTable::from_blob(blob)?;
        self.set_params(&params)
    }

    /// Reads a parameter blob from disk (memory-mapped) and binds it.
    pub fn load_params_file(&mut self, path: &Path) -> Result<(), RuntimeError> {
        let params = ParamTable::load(path)?;
        self.set_params(&params)
    }

    /// Executes every node in order.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        self.execute(None, |_, _| Ok(()))?;
        self.has_run = true;
        Ok(())
    }

    /// Executes every node, handing each node's value to `observe` as soon
    /// as it is available (arguments included).
    pub fn run_observed(
        &mut self,
        mut observe: impl FnMut(usize, &Tensor) -> Result<(), RuntimeError>,
    ) -> Result<(), RuntimeError> {
        self.execute(None, &mut observe)?;
        self.has_run = true;
        Ok(())
    }

    pub fn num_outputs(&self) -> usize {
        self.graph.heads.len()
    }

    /// Output `index` of the last run.
    pub fn get_output(&self, index: usize) -> Result<&Tensor, RuntimeError> {
        if !self.has_run {
            return Err(RuntimeError::NotRun);
        }
        let head = self
            .graph
            .heads
            .get(index)
            .ok_or(RuntimeError::IndexOutOfRange {
                what: "output",
                index,
                len: self.graph.heads.len(),
            })?;
        let slot = self.graph.storage_id(self.graph.entry_of(head));
        self.storage[slot].as_ref().ok_or(RuntimeError::NotRun)
    }

    /// Value of node `index`, recomputed by running the graph up to it.
    ///
    /// Intermediate slots are shared, so a finished run no longer holds
    /// every node's value; this re-executes the prefix instead. The prefix
    /// may overwrite output slots, so [`get_output`](Self::get_output)
    /// reports [`RuntimeError::NotRun`] until the next full run.
    pub fn get_node_output(&mut self, index: usize) -> Result<Tensor, RuntimeError> {
        if index >= self.graph.num_nodes() {
            return Err(RuntimeError::IndexOutOfRange {
                what: "node",
                index,
                len: self.graph.num_nodes(),
            });
        }
        let mut value = None;
        self.execute(Some(index), |i, t| {
            if i == index {
                value = Some(t.clone());
            }
            Ok(())
        })?;
        value.ok_or(RuntimeError::NotRun)
    }

    /// Metrics of the last profiled run.
    pub fn metrics(&self) -> Option<&ExecutionMetrics> {
        self.metrics.as_ref()
    }

    /// Runs the graph once and writes every node's value to
    /// `dir/node_{index:04}_{name}.txt`, one `value[i, j] = {d0, d1} = v`
    /// line per element. Returns the written paths.
    pub fn dump_layer_outputs(&mut self, dir: &Path) -> Result<Vec<PathBuf>, RuntimeError> {
        std::fs::create_dir_all(dir)?;
        let names: Vec<String> = self.graph.nodes.iter().map(|n| n.name.clone()).collect();
        let mut written = Vec::with_capacity(names.len());
        self.run_observed(|i, t| {
            let path = dir.join(format!("node_{i:04}_{}.txt", names[i]));
            std::fs::write(&path, format_values(t))?;
            written.push(path);
            Ok(())
        })?;
        tracing::info!("dumped {} node output(s) to {}", written.len(), dir.display());
        Ok(written)
    }

    fn execute(
        &mut self,
        stop_after: Option<usize>,
        mut observe: impl FnMut(usize, &Tensor) -> Result<(), RuntimeError>,
    ) -> Result<(), RuntimeError> {
        self.ctx.ensure_executable()?;
        // Slots are about to be overwritten; outputs are valid again only
        // after a complete run.
        self.has_run = false;
        let run_start = Instant::now();
        let mut metrics = self
            .profiling
            .then(|| ExecutionMetrics::new(self.graph.num_storage()));
        let last = stop_after.unwrap_or(self.graph.num_nodes().saturating_sub(1));

        for i in 0..=last {
            let entry = self.graph.entry_id(i, 0);
            let slot = self.graph.storage_id(entry);
            let node = &self.graph.nodes[i];

            let Some(func_index) = self.funcs[i] else {
                let value = self.storage[slot]
                    .as_ref()
                    .ok_or_else(|| RuntimeError::UnboundArgument(node.name.clone()))?;
                observe(i, value)?;
                continue;
            };
            let func: &LoweredFunc = &self.module.functions()[func_index];

            let start = Instant::now();
            let output = {
                let args = node
                    .inputs
                    .iter()
                    .map(|e| {
                        self.storage[self.graph.storage_id(self.graph.entry_of(e))]
                            .as_ref()
                            .ok_or_else(|| {
                                let name = self.graph.nodes[e.node()].name.clone();
                                RuntimeError::UnboundArgument(name)
                            })
                    })
                    .collect::<Result<Vec<&Tensor>, _>>()?;
                func.call(&args)
                    .map_err(|source| RuntimeError::ExecutionError {
                        node: node.name.clone(),
                        source,
                    })?
            };
            let elapsed = start.elapsed();

            let expected = self.graph.shape(entry);
            if output.shape() != &expected {
                return Err(RuntimeError::ExecutionError {
                    node: node.name.clone(),
                    source: graph_ir::GraphError::InvalidNode {
                        node: node.name.clone(),
                        detail: format!("produced {}, graph declares {expected}", output.shape()),
                    },
                });
            }
            tracing::trace!("{} ({}) → {} in {:?}", node.name, func.name, expected, elapsed);
            if let Some(m) = metrics.as_mut() {
                m.record_node(node.name.clone(), func.name.clone(), elapsed, output.size_bytes());
            }
            observe(i, &output)?;
            self.storage[slot] = Some(output);
        }

        if let Some(mut m) = metrics {
            let bytes = self.storage.iter().flatten().map(Tensor::size_bytes).sum();
            m.finalise(run_start.elapsed(), bytes);
            tracing::debug!("{}", m.summary());
            self.metrics = Some(m);
        }
        Ok(())
    }
}

impl std::fmt::Debug for GraphExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphExecutor")
            .field("ctx", &self.ctx)
            .field("target", &self.module.target())
            .field("nodes", &self.graph.num_nodes())
            .field("storage", &self.storage.len())
            .field("has_run", &self.has_run)
            .finish()
    }
}

/// Renders a tensor as `value[i, j, ...] = {d0, d1, ...} = v` lines.
fn format_values(t: &Tensor) -> String {
    let shape: &Shape = t.shape();
    let dims = join(shape.dims());
    let mut out = String::with_capacity(t.num_elements() * 32);
    for (k, v) in t.as_slice().iter().enumerate() {
        let _ = writeln!(out, "value[{}] = {{{dims}}} = {v}", join(&shape.unravel(k)));
    }
    out
}

fn join(values: &[usize]) -> String {
    values
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
