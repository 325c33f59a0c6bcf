// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Checkpoints: a symbol file plus one weight file per epoch.
//!
//! For a prefix `resnet18_v1` and epoch 0 the files are
//! `resnet18_v1-symbol.json` and `resnet18_v1-0000.params`. The weight file is
//! a SafeTensors blob whose keys carry an `arg:` or `aux:` prefix.

use crate::{Block, FrontendError, Symbol};
use graph_ir::ParamTable;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const ARG_PREFIX: &str = "arg:";
const AUX_PREFIX: &str = "aux:";

/// A model as `(symbol, arguments, auxiliary states)`.
pub type Checkpoint = (Symbol, ParamTable, ParamTable);

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(prefix.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// Path of the symbol file for `prefix`.
pub fn symbol_path(prefix: &Path) -> PathBuf {
    with_suffix(prefix, "-symbol.json")
}

/// Path of the weight file for `prefix` at `epoch`.
pub fn params_path(prefix: &Path, epoch: u32) -> PathBuf {
    with_suffix(prefix, &format!("-{epoch:04}.params"))
}

/// Derives the checkpoint triple of a live block. Running statistics go to
/// the auxiliary table.
pub fn block_to_checkpoint(block: &Block) -> Checkpoint {
    let (args, auxs) = block.param_tables();
    (block.to_symbol(), args, auxs)
}

/// Writes the symbol and weight files, overwriting existing ones.
/// Returns `(symbol_path, params_path)`.
pub fn save_checkpoint(
    prefix: &Path,
    epoch: u32,
    symbol: &Symbol,
    args: &ParamTable,
    auxs: &ParamTable,
) -> Result<(PathBuf, PathBuf), FrontendError> {
    let sym_path = symbol_path(prefix);
    symbol.save(&sym_path)?;

    let mut merged = ParamTable::new();
    for (tag, table) in [(ARG_PREFIX, args), (AUX_PREFIX, auxs)] {
        for (name, value) in table.iter() {
            merged.insert(format!("{tag}{name}"), value.clone());
        }
    }
    let params_path = params_path(prefix, epoch);
    merged.save(&params_path)?;

    tracing::info!(
        "saved checkpoint {} + {} ({} args, {} auxs)",
        sym_path.display(),
        params_path.display(),
        args.len(),
        auxs.len()
    );
    Ok((sym_path, params_path))
}

/// Reads a checkpoint written by [`save_checkpoint`].
pub fn load_checkpoint(prefix: &Path, epoch: u32) -> Result<Checkpoint, FrontendError> {
    let symbol = Symbol::load(&symbol_path(prefix))?;
    let path = params_path(prefix, epoch);
    let mut args = ParamTable::new();
    let mut auxs = ParamTable::new();
    for (key, value) in ParamTable::load(&path)? {
        if let Some(name) = key.strip_prefix(ARG_PREFIX) {
            args.insert(name, value);
        } else if let Some(name) = key.strip_prefix(AUX_PREFIX) {
            auxs.insert(name, value);
        } else {
            return Err(FrontendError::Checkpoint(format!(
                "key '{key}' in {} has neither an arg: nor an aux: prefix",
                path.display()
            )));
        }
    }
    Ok((symbol, args, auxs))
}
