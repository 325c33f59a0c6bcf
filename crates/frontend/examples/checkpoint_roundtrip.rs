// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Example: convert a model from a saved checkpoint instead of a live block.
//!
//! Derives `(symbol, args, auxs)` from the zoo model, saves it as
//! `resnet18_v1-symbol.json` + `resnet18_v1-0000.params`, reloads the pair
//! and runs the converter on it. The result goes nowhere; the point is that
//! the checkpoint entry point yields the same graph as the live block.
//!
//! ```bash
//! cargo run -p frontend --example checkpoint_roundtrip -- [output-dir]
//! ```

use frontend::{block_to_checkpoint, from_block, from_symbol, load_checkpoint, save_checkpoint};
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let prefix = out_dir.join("resnet18_v1");

    let block = frontend::zoo::get_model("resnet18_v1", 1000)?;

    let (symbol, args, auxs) = block_to_checkpoint(&block);
    let (sym_path, params_path) = save_checkpoint(&prefix, 0, &symbol, &args, &auxs)?;
    println!("saved {} and {}", sym_path.display(), params_path.display());

    let (symbol, args, auxs) = load_checkpoint(&prefix, 0)?;
    println!(
        "reloaded: {} arguments, {} auxiliary states",
        symbol.list_arguments().len(),
        symbol.list_auxiliary_states().len()
    );

    let (from_ckpt, ckpt_params) = from_symbol(&symbol, &args, &auxs)?;
    let (from_live, live_params) = from_block(&block)?;
    println!("{}", from_ckpt.summary());
    println!(
        "checkpoint and live block agree: {}",
        from_ckpt.nodes() == from_live.nodes() && ckpt_params == live_params
    );
    Ok(())
}
