// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Loading of exported module containers.

use crate::RuntimeError;
use graph_ir::{LinkMode, LoweredFunc, ModuleImage};
use std::path::Path;

/// A module loaded for in-process execution.
#[derive(Debug, Clone)]
pub struct Module {
    image: ModuleImage,
}

impl Module {
    /// Reads and checks a module container from disk.
    pub fn load_from_file(path: &Path) -> Result<Self, RuntimeError> {
        let bytes = std::fs::read(path)?;
        let module = Self::from_bytes(&bytes)?;
        tracing::info!(
            "loaded module for '{}' from {} ({} functions)",
            module.target(),
            path.display(),
            module.image.functions.len()
        );
        Ok(module)
    }

    /// Parses container bytes.
    ///
    /// # Errors
    /// [`RuntimeError::CrossCompiledModule`] for a shared-object module and
    /// [`RuntimeError::Artifact`] for a malformed container.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RuntimeError> {
        if ModuleImage::peek_link_mode(bytes)? == LinkMode::SharedObject {
            let image = ModuleImage::from_bytes(bytes)?;
            return Err(RuntimeError::CrossCompiledModule {
                target: image.target,
            });
        }
        Ok(Self {
            image: ModuleImage::from_bytes(bytes)?,
        })
    }

    /// Wraps an in-memory image, refusing shared-object images as
    /// [`Module::from_bytes`] does.
    pub fn from_image(image: ModuleImage) -> Result<Self, RuntimeError> {
        match image.link.mode {
            LinkMode::Native => Ok(Self { image }),
            LinkMode::SharedObject => Err(RuntimeError::CrossCompiledModule {
                target: image.target,
            }),
        }
    }

    pub fn target(&self) -> &str {
        &self.image.target
    }

    pub fn function(&self, name: &str) -> Option<&LoweredFunc> {
        self.image.function(name)
    }

    pub fn functions(&self) -> &[LoweredFunc] {
        &self.image.functions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_ir::lowered::{Operand, Step};
    use graph_ir::{LinkOptions, OpKind};

    fn image(link: LinkOptions) -> ModuleImage {
        ModuleImage {
            target: "llvm".into(),
            host: None,
            link,
            functions: vec![LoweredFunc {
                name: "fused_relu".into(),
                num_args: 1,
                steps: vec![Step {
                    name: "relu0".into(),
                    op: OpKind::Relu,
                    operands: vec![Operand::Arg(0)],
                }],
            }],
        }
    }

    #[test]
    fn test_load_native() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.so");
        std::fs::write(&path, image(LinkOptions::native()).to_bytes().unwrap()).unwrap();
        let module = Module::load_from_file(&path).unwrap();
        assert_eq!(module.target(), "llvm");
        assert!(module.function("fused_relu").is_some());
        assert!(module.function("fused_dense").is_none());
    }

    #[test]
    fn test_refuses_cross_compiled() {
        let bytes = image(LinkOptions::android_ndk()).to_bytes().unwrap();
        assert!(matches!(
            Module::from_bytes(&bytes),
            Err(RuntimeError::CrossCompiledModule { .. })
        ));
        assert!(matches!(
            Module::from_image(image(LinkOptions::android_ndk())),
            Err(RuntimeError::CrossCompiledModule { .. })
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            Module::from_bytes(b"\x7fELF not a module"),
            Err(RuntimeError::Artifact(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Module::load_from_file(Path::new("/nonexistent/deploy.so")),
            Err(RuntimeError::Io(_))
        ));
    }
}
