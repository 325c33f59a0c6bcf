// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Build configuration.

use crate::CompileError;

/// Highest supported optimisation level.
pub const MAX_OPT_LEVEL: u8 = 3;

/// Options for [`crate::build`].
///
/// | Level | Passes |
/// |---|---|
/// | 0 | shape inference, SimplifyInference |
/// | 1 | + OpFusion |
/// | 2 | + PrecomputePrune |
/// | 3 | + FoldScaleAxis |
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BuildConfig {
    opt_level: u8,
}

impl BuildConfig {
    pub fn new(opt_level: u8) -> Result<Self, CompileError> {
        if opt_level > MAX_OPT_LEVEL {
            return Err(CompileError::InvalidOptLevel(opt_level));
        }
        Ok(Self { opt_level })
    }

    pub fn opt_level(&self) -> u8 {
        self.opt_level
    }

    /// `true` when operators are grouped into fused functions.
    pub fn fuse_ops(&self) -> bool {
        self.opt_level >= 1
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            opt_level: MAX_OPT_LEVEL,
        }
    }
}
