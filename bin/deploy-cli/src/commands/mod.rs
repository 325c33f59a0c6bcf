// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommand implementations and shared CLI plumbing.

pub mod compile;
pub mod deploy;
pub mod inspect;

use pipeline::PipelineConfig;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// The config file's contents, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_file(path)?;
            tracing::info!("loaded config from {}", path.display());
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// Prints the boxed command header.
pub fn header(title: &str) {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║{:^54}║", format!("deploy-rt · {title}"));
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
}

/// Truncates a string to `max_len` characters with an ellipsis.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("conv0", 10), "conv0");
        assert_eq!(truncate("resnetv10_stage1_conv0_fwd", 10), "resnetv...");
        assert_eq!(truncate("ééééé", 4), "é...");
    }

    #[test]
    fn test_default_config_without_file() {
        assert_eq!(load_config(None).unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "model = \"resnet34_v1\"\n").unwrap();
        assert_eq!(load_config(Some(&path)).unwrap().model, "resnet34_v1");
    }
}
