// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `deploy-rt deploy` command: run saved artifacts the way a device would.
//!
//! Loads the module container, graph description, parameter blob and raw
//! input written by `compile`, runs the graph `iterations` times and
//! reports the average latency of the runs after `warmup`.

use super::header;
use graph_ir::{CompiledGraph, DeviceKind, DATA_INPUT};
use pipeline::LabelMap;
use runtime::{DeviceContext, GraphExecutor, Module};
use std::path::PathBuf;
use std::time::Instant;
use tensor_core::Tensor;

/// Number of classes listed after the run.
const TOP_K: usize = 5;

/// Resolved arguments of the command.
pub struct DeployArgs {
    pub module: PathBuf,
    pub graph: PathBuf,
    pub params: PathBuf,
    pub input: PathBuf,
    pub labels: Option<PathBuf>,
    pub device: DeviceKind,
    pub expect: Option<usize>,
    pub iterations: usize,
    pub warmup: usize,
    pub dump_layers: Option<PathBuf>,
}

/// Parses a lower-case device name.
pub fn parse_device(s: &str) -> Result<DeviceKind, String> {
    DeviceKind::ALL
        .into_iter()
        .find(|d| d.name() == s)
        .ok_or_else(|| {
            let names: Vec<&str> = DeviceKind::ALL.iter().map(|d| d.name()).collect();
            format!("unknown device '{s}' (expected one of: {})", names.join(", "))
        })
}

pub async fn execute(args: DeployArgs) -> anyhow::Result<()> {
    header("Deployment Runner");

    if args.iterations == 0 {
        anyhow::bail!("--iterations must be at least 1");
    }

    println!("  Artifacts:");
    println!("   Module: {}", args.module.display());
    println!("   Graph:  {}", args.graph.display());
    println!("   Params: {}", args.params.display());
    println!("   Input:  {}", args.input.display());
    println!("   Device: {}(0)", args.device);
    println!();

    // ── Load ───────────────────────────────────────────────────
    println!("  [1/3] Loading module, graph and parameters...");
    let module = Module::load_from_file(&args.module)?;
    let graph = CompiledGraph::load(&args.graph)?;
    let data_node = graph
        .find(DATA_INPUT)
        .ok_or_else(|| anyhow::anyhow!("graph has no '{DATA_INPUT}' input"))?;
    let input_shape = graph.shape(graph.entry_id(data_node, 0));
    let mut exec = GraphExecutor::create(graph, module, DeviceContext::new(args.device, 0))?;
    exec.load_params(&std::fs::read(&args.params)?)?;
    let x = Tensor::from_le_bytes(input_shape, &std::fs::read(&args.input)?)?;
    println!("        Input {}", x.shape());
    println!();

    // ── Run ────────────────────────────────────────────────────
    println!(
        "  [2/3] Running {} iteration(s), {} warmup...",
        args.iterations, args.warmup
    );
    exec.set_profiling(true);
    let mut timed = 0usize;
    let mut total = 0.0f64;
    for i in 0..args.iterations {
        exec.set_input(DATA_INPUT, x.clone())?;
        let tic = Instant::now();
        exec.run()?;
        let elapsed = tic.elapsed().as_secs_f64();
        if i >= args.warmup {
            timed += 1;
            total += elapsed;
            tracing::info!("iteration {i}: {:.2} ms", elapsed * 1000.0);
        }
    }
    if timed > 0 {
        println!(
            "        Average: {:.2} ms over {timed} run(s)",
            total / timed as f64 * 1000.0
        );
    } else {
        println!("        No timed runs (warmup covers every iteration).");
    }
    if let Some(metrics) = exec.metrics() {
        println!("        {}", metrics.summary());
        for node in metrics.slowest(3) {
            println!(
                "         {:<32} {:>8.2} ms",
                node.node_name,
                node.compute_duration.as_secs_f64() * 1000.0
            );
        }
    }
    println!();

    // ── Results ────────────────────────────────────────────────
    println!("  [3/3] Results");
    let output = exec.get_output(0)?.clone();
    let labels = match &args.labels {
        Some(path) => Some(LabelMap::load(path)?),
        None => None,
    };
    for (rank, (index, score)) in top_k(&output, TOP_K).into_iter().enumerate() {
        let label = labels
            .as_ref()
            .and_then(|l| l.get(index))
            .unwrap_or("");
        println!("   #{} score[{index}] = {score:.6}  {label}", rank + 1);
    }
    let top1 = output
        .argmax()
        .ok_or_else(|| anyhow::anyhow!("model output is empty"))?;
    println!("   The maximum position in output vector is: {top1}");
    println!();

    if let Some(dir) = &args.dump_layers {
        let files = exec.dump_layer_outputs(dir)?;
        println!("  Dumped {} layer output(s) to {}", files.len(), dir.display());
        println!();
    }

    if let Some(expected) = args.expect {
        if top1 != expected {
            anyhow::bail!("expected class {expected} but got {top1}");
        }
        println!("  Top-1 matches expected class {expected}.");
    }
    Ok(())
}

/// The `k` highest scores with their indices, best first.
fn top_k(output: &Tensor, k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = output.as_slice().iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use tensor_core::Shape;

    #[test]
    fn test_parse_device() {
        assert_eq!(parse_device("cpu"), Ok(DeviceKind::Cpu));
        assert_eq!(parse_device("opengl"), Ok(DeviceKind::OpenGl));
        assert!(parse_device("tpu").unwrap_err().contains("cpu, cuda"));
    }

    #[test]
    fn test_top_k() {
        let t = Tensor::from_vec(Shape::matrix(1, 5), vec![0.1, 0.4, 0.05, 0.4, 0.05]).unwrap();
        assert_eq!(top_k(&t, 3), vec![(1, 0.4), (3, 0.4), (0, 0.1)]);
        assert_eq!(top_k(&t, 10).len(), 5);
    }
}
