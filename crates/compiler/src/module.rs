// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The compiled module and its on-disk export.

use crate::{CompileError, TargetSpec};
use graph_ir::{LinkMode, LinkOptions, LoweredFunc, ModuleImage};
use std::path::Path;

/// The fused functions produced by a build, tagged with their target.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledModule {
    image: ModuleImage,
}

impl CompiledModule {
    pub(crate) fn new(target: &TargetSpec, functions: Vec<LoweredFunc>) -> Self {
        Self {
            image: ModuleImage {
                target: target.target().to_string(),
                host: target.host().map(str::to_string),
                link: LinkOptions::native(),
                functions,
            },
        }
    }

    pub fn target(&self) -> &str {
        &self.image.target
    }

    pub fn host(&self) -> Option<&str> {
        self.image.host.as_deref()
    }

    pub fn functions(&self) -> &[LoweredFunc] {
        &self.image.functions
    }

    pub fn image(&self) -> &ModuleImage {
        &self.image
    }

    /// Link options matching how `target` is packaged: the NDK toolchain
    /// when cross-compiling, native otherwise.
    pub fn link_options_for(target: &TargetSpec) -> LinkOptions {
        if target.is_cross_compile() {
            LinkOptions::android_ndk()
        } else {
            LinkOptions::native()
        }
    }

    /// Writes the module container to `path`, replacing any existing file.
    ///
    /// A module exported with [`LinkMode::SharedObject`] is meant for the
    /// device and is refused by the in-process loader.
    pub fn export_library(&self, path: &Path, options: &LinkOptions) -> Result<(), CompileError> {
        let image = ModuleImage {
            link: options.clone(),
            ..self.image.clone()
        };
        let bytes = image.to_bytes()?;
        std::fs::write(path, &bytes)?;
        match options.mode {
            LinkMode::Native => tracing::info!(
                "exported {} function(s) to {} ({} bytes)",
                image.functions.len(),
                path.display(),
                bytes.len()
            ),
            LinkMode::SharedObject => tracing::info!(
                "exported {} function(s) to {} for {} via {} {}",
                image.functions.len(),
                path.display(),
                image.target,
                options.toolchain.as_deref().unwrap_or("default toolchain"),
                options.flags.join(" ")
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_ir::lowered::Step;
    use graph_ir::OpKind;

    fn module(target: &TargetSpec) -> CompiledModule {
        CompiledModule::new(
            target,
            vec![LoweredFunc {
                name: "fused_relu".into(),
                num_args: 1,
                steps: vec![Step {
                    name: "relu0".into(),
                    op: OpKind::Relu,
                    operands: vec![graph_ir::lowered::Operand::Arg(0)],
                }],
            }],
        )
    }

    #[test]
    fn test_export_native_roundtrip() {
        let target = TargetSpec::resolve("llvm", None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.so");
        let m = module(&target);
        m.export_library(&path, &CompiledModule::link_options_for(&target))
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(ModuleImage::peek_link_mode(&bytes).unwrap(), LinkMode::Native);
        assert_eq!(&ModuleImage::from_bytes(&bytes).unwrap(), m.image());
    }

    #[test]
    fn test_cross_compile_uses_ndk_options() {
        let target = TargetSpec::resolve("llvm -target=aarch64-linux-android", None).unwrap();
        let options = CompiledModule::link_options_for(&target);
        assert_eq!(options.mode, LinkMode::SharedObject);
        assert_eq!(options.flags, vec!["-g", "-shared", "-fPIC", "-nostdlib++"]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.so");
        module(&target).export_library(&path, &options).unwrap();
        let image = ModuleImage::from_bytes(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(image.link, options);
        assert_eq!(image.target, "llvm -target=aarch64-linux-android");
    }

    #[test]
    fn test_export_overwrites() {
        let target = TargetSpec::resolve("llvm", Some("llvm")).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.so");
        std::fs::write(&path, b"stale").unwrap();
        module(&target)
            .export_library(&path, &LinkOptions::native())
            .unwrap();
        let image = ModuleImage::from_bytes(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(image.host.as_deref(), Some("llvm"));
    }
}
