// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `deploy-rt compile` command: the full conversion pipeline.
//!
//! ```text
//! fetch → normalise → convert → build → serialise → (run locally)
//! ```

use super::header;
use compiler::TargetSpec;
use pipeline::{Pipeline, PipelineConfig, PipelineOutcome};
use std::path::PathBuf;
use std::time::Instant;

pub async fn execute(
    mut config: PipelineConfig,
    target: String,
    target_host: Option<String>,
    output_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    header("Model Compiler");

    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    let target = TargetSpec::resolve(&target, target_host.as_deref())?;

    println!("  Config:");
    println!("   Model:         {}", config.model);
    println!("   Target:        {}", target.target());
    println!("   Target host:   {}", target.host().unwrap_or("None"));
    println!("   Device:        {}", target.device());
    println!("   Cross-compile: {}", target.is_cross_compile());
    println!("   Output dir:    {}", config.output_dir.display());
    println!();

    let start = Instant::now();
    let outcome = Pipeline::new(config).run(&target).await?;
    let elapsed = start.elapsed();

    println!("  Artifacts:");
    for path in outcome.artifacts().paths() {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        println!(
            "   {:<40} {:>10.1} KB",
            path.display().to_string(),
            size as f64 / 1024.0
        );
    }
    println!();

    match outcome {
        PipelineOutcome::CrossCompiled { .. } => {
            println!("  Cross-compiled for {target}; local execution skipped.");
        }
        PipelineOutcome::Executed { prediction, .. } => {
            println!(
                "  Prediction top-1: {} {} (p = {:.4})",
                prediction.class_index, prediction.label, prediction.score
            );
        }
    }
    println!("  Finished in {:.2}s", elapsed.as_secs_f64());
    println!();
    Ok(())
}
