// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # deploy-rt
//!
//! Command-line interface for the model conversion and deployment toolchain.
//!
//! ## Usage
//! ```bash
//! # Convert, compile, serialise and (natively) run the zoo model
//! deploy-rt compile --target llvm
//!
//! # Cross-compile for an Android device; stops after writing artifacts
//! deploy-rt compile --target "llvm -target=aarch64-linux-android"
//!
//! # Run saved artifacts with timing and per-layer dumps
//! deploy-rt deploy --module ./from_mxnet.so --iterations 20 --warmup 5 --dump-layers ./layers
//!
//! # Inspect a compiled graph description
//! deploy-rt inspect --graph ./from_mxnet.json
//! ```

mod commands;

use clap::{builder::PossibleValuesParser, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "deploy-rt",
    about = "Convert, compile and deploy image-classification models",
    version,
    author
)]
struct Cli {
    /// Path to a TOML pipeline configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert and compile the model, write artifacts and run it locally
    /// unless cross-compiling.
    Compile {
        /// Target device for the inference step.
        #[arg(short, long, value_parser = PossibleValuesParser::new(compiler::target_ids()))]
        target: String,

        /// Host device (cross-platform usage). "None" means no host.
        #[arg(long)]
        target_host: Option<String>,

        /// Directory for downloads and artifacts (overrides the config).
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Load saved artifacts and run them with timing.
    Deploy {
        /// Exported module container.
        #[arg(short, long)]
        module: PathBuf,

        /// Graph description (default: from the config).
        #[arg(long)]
        graph: Option<PathBuf>,

        /// Parameter blob (default: from the config).
        #[arg(long)]
        params: Option<PathBuf>,

        /// Raw input tensor (default: from the config).
        #[arg(long)]
        input: Option<PathBuf>,

        /// Label file used to name the top classes (default: from the config, if present).
        #[arg(long)]
        labels: Option<PathBuf>,

        /// Device to execute on.
        #[arg(long, default_value = "cpu", value_parser = commands::deploy::parse_device)]
        device: graph_ir::DeviceKind,

        /// Exit with an error unless the top-1 class is this index.
        #[arg(long)]
        expect: Option<usize>,

        /// Number of runs.
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Runs excluded from the timing average.
        #[arg(long, default_value_t = 0)]
        warmup: usize,

        /// Write every node's output to this directory after the last run.
        #[arg(long)]
        dump_layers: Option<PathBuf>,
    },

    /// Print the nodes, shapes and storage plan of a compiled graph.
    Inspect {
        /// Graph description JSON.
        #[arg(short, long)]
        graph: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    commands::init_tracing(cli.verbose);
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Compile {
            target,
            target_host,
            output_dir,
        } => commands::compile::execute(config, target, target_host, output_dir).await,
        Commands::Deploy {
            module,
            graph,
            params,
            input,
            labels,
            device,
            expect,
            iterations,
            warmup,
            dump_layers,
        } => {
            let args = commands::deploy::DeployArgs {
                graph: graph.unwrap_or_else(|| config.path(&config.files.graph)),
                params: params.unwrap_or_else(|| config.path(&config.files.params)),
                input: input.unwrap_or_else(|| config.path(&config.files.input)),
                labels: labels.or_else(|| {
                    let default = config.path(&config.files.synset);
                    default.exists().then_some(default)
                }),
                module,
                device,
                expect,
                iterations,
                warmup,
                dump_layers,
            };
            commands::deploy::execute(args).await
        }
        Commands::Inspect { graph } => commands::inspect::execute(graph).await,
    }
}
