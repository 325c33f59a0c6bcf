// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Lowered functions and the module container format.
//!
//! The compiler lowers each fused group of operators into a [`LoweredFunc`]:
//! a straight-line program of primitive [`Step`]s over the function's
//! arguments. A [`ModuleImage`] bundles all functions of a build with the
//! target it was built for and how it was linked. On disk it is framed as:
//!
//! ```text
//! magic "DRTM" | format version (u32 LE) | link mode (u8) | payload length (u64 LE) | payload
//! ```
//!
//! where the payload is the bincode encoding of the image.

use crate::{GraphError, OpKind};
use tensor_core::Tensor;

pub const MODULE_MAGIC: [u8; 4] = *b"DRTM";
pub const MODULE_FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 4 + 4 + 1 + 8;

/// How a module was linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LinkMode {
    /// Loadable by the in-process runtime.
    Native,
    /// Built for another platform with an external toolchain.
    SharedObject,
}

impl LinkMode {
    fn to_byte(self) -> u8 {
        match self {
            LinkMode::Native => 0,
            LinkMode::SharedObject => 1,
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(LinkMode::Native),
            1 => Some(LinkMode::SharedObject),
            _ => None,
        }
    }
}

/// Link configuration recorded with an exported module.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LinkOptions {
    pub mode: LinkMode,
    /// Compiler driver used for the link, if any.
    pub toolchain: Option<String>,
    pub flags: Vec<String>,
}

impl LinkOptions {
    /// In-process loadable module, no external link step.
    pub fn native() -> Self {
        Self {
            mode: LinkMode::Native,
            toolchain: None,
            flags: Vec::new(),
        }
    }

    /// Shared object for Android, linked with the NDK's clang++.
    pub fn android_ndk() -> Self {
        Self {
            mode: LinkMode::SharedObject,
            toolchain: Some("ndk-clang++".into()),
            flags: ["-g", "-shared", "-fPIC", "-nostdlib++"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Where a step takes an operand from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Operand {
    /// The function's n-th argument.
    Arg(usize),
    /// The result of an earlier step.
    Step(usize),
}

/// One primitive operator application inside a function.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Step {
    /// Name of the graph node this step came from.
    pub name: String,
    pub op: OpKind,
    pub operands: Vec<Operand>,
}

/// A fused function: its result is the result of the last step.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LoweredFunc {
    pub name: String,
    pub num_args: usize,
    pub steps: Vec<Step>,
}

impl LoweredFunc {
    /// Checks that every operand refers to an argument or an earlier step.
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.steps.is_empty() {
            return Err(GraphError::InvalidNode {
                node: self.name.clone(),
                detail: "function has no steps".into(),
            });
        }
        for (i, step) in self.steps.iter().enumerate() {
            for operand in &step.operands {
                let ok = match *operand {
                    Operand::Arg(a) => a < self.num_args,
                    Operand::Step(s) => s < i,
                };
                if !ok {
                    return Err(GraphError::InvalidNode {
                        node: self.name.clone(),
                        detail: format!("step '{}' has dangling operand {operand:?}", step.name),
                    });
                }
            }
        }
        Ok(())
    }

    /// Runs the function on concrete arguments.
    pub fn call(&self, args: &[&Tensor]) -> Result<Tensor, GraphError> {
        if args.len() != self.num_args {
            return Err(GraphError::InvalidNode {
                node: self.name.clone(),
                detail: format!("called with {} arguments, expects {}", args.len(), self.num_args),
            });
        }
        let mut results: Vec<Tensor> = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let operands: Vec<&Tensor> = step
                .operands
                .iter()
                .map(|o| match *o {
                    Operand::Arg(a) => args[a],
                    Operand::Step(s) => &results[s],
                })
                .collect();
            let out = step.op.evaluate(&step.name, &operands)?;
            results.push(out);
        }
        results.pop().ok_or_else(|| GraphError::InvalidNode {
            node: self.name.clone(),
            detail: "function has no steps".into(),
        })
    }
}

/// Everything a build produced, ready to be framed into a container.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModuleImage {
    pub target: String,
    pub host: Option<String>,
    pub link: LinkOptions,
    pub functions: Vec<LoweredFunc>,
}

impl ModuleImage {
    pub fn function(&self, name: &str) -> Option<&LoweredFunc> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Frames the image into container bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, GraphError> {
        let payload = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| GraphError::ModuleFormat(e.to_string()))?;
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(&MODULE_MAGIC);
        out.extend_from_slice(&MODULE_FORMAT_VERSION.to_le_bytes());
        out.push(self.link.mode.to_byte());
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Reads only the link mode from container bytes.
    pub fn peek_link_mode(bytes: &[u8]) -> Result<LinkMode, GraphError> {
        Self::header(bytes).map(|(mode, _)| mode)
    }

    fn header(bytes: &[u8]) -> Result<(LinkMode, usize), GraphError> {
        if bytes.len() < HEADER_LEN || bytes[..4] != MODULE_MAGIC {
            return Err(GraphError::ModuleFormat("not a module container".into()));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..8]);
        let version = u32::from_le_bytes(version);
        if version != MODULE_FORMAT_VERSION {
            return Err(GraphError::ModuleFormat(format!(
                "format version {version} (supported: {MODULE_FORMAT_VERSION})"
            )));
        }
        let mode = LinkMode::from_byte(bytes[8])
            .ok_or_else(|| GraphError::ModuleFormat(format!("unknown link mode {}", bytes[8])))?;
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[9..HEADER_LEN]);
        let len = u64::from_le_bytes(len) as usize;
        if bytes.len() - HEADER_LEN != len {
            return Err(GraphError::ModuleFormat(format!(
                "payload is {} bytes, header says {len}",
                bytes.len() - HEADER_LEN
            )));
        }
        Ok((mode, len))
    }

    /// Parses container bytes, checking the frame and every function.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        let (mode, _) = Self::header(bytes)?;
        let (image, _): (Self, usize) =
            bincode::serde::decode_from_slice(&bytes[HEADER_LEN..], bincode::config::standard())
                .map_err(|e| GraphError::ModuleFormat(e.to_string()))?;
        if image.link.mode != mode {
            return Err(GraphError::ModuleFormat(
                "header link mode disagrees with payload".into(),
            ));
        }
        for f in &image.functions {
            f.validate()?;
        }
        Ok(image)
    }
}
