// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Target resolution.
//!
//! [`TARGET_TABLE`] is the one place that lists the supported backends and
//! the device family each one executes on. Argument validation, device
//! selection and documentation all read from it.

use crate::CompileError;
use graph_ir::DeviceKind;
use std::fmt;

/// Marker whose presence in `target + host` selects cross-compilation.
pub const CROSS_COMPILE_MARKER: &str = "android";

/// One supported backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetEntry {
    pub id: &'static str,
    pub device: DeviceKind,
}

/// Every backend identifier accepted by [`TargetSpec::resolve`].
pub const TARGET_TABLE: [TargetEntry; 7] = [
    TargetEntry {
        id: "llvm",
        device: DeviceKind::Cpu,
    },
    TargetEntry {
        id: "llvm -target=aarch64-linux-android",
        device: DeviceKind::Cpu,
    },
    TargetEntry {
        id: "cuda",
        device: DeviceKind::Cuda,
    },
    TargetEntry {
        id: "opengl",
        device: DeviceKind::OpenGl,
    },
    TargetEntry {
        id: "opencl",
        device: DeviceKind::OpenCl,
    },
    TargetEntry {
        id: "vulkan",
        device: DeviceKind::Vulkan,
    },
    TargetEntry {
        id: "metal",
        device: DeviceKind::Metal,
    },
];

/// Identifiers of all supported targets, in table order.
pub fn target_ids() -> impl Iterator<Item = &'static str> {
    TARGET_TABLE.iter().map(|e| e.id)
}

/// A resolved build target. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    target: &'static str,
    host: Option<String>,
    device: DeviceKind,
    cross_compile: bool,
}

impl TargetSpec {
    /// Resolves a target identifier and an optional host.
    ///
    /// A host spelled `"None"` is treated as absent. The cross-compile flag
    /// is set when [`CROSS_COMPILE_MARKER`] occurs anywhere in the target
    /// text followed by the host text (`"None"` when absent), so a host that
    /// merely mentions the marker also selects cross-compilation.
    ///
    /// # Errors
    /// [`CompileError::UnknownTarget`] for an identifier not in
    /// [`TARGET_TABLE`].
    pub fn resolve(target: &str, host: Option<&str>) -> Result<Self, CompileError> {
        let entry = TARGET_TABLE
            .iter()
            .find(|e| e.id == target)
            .ok_or_else(|| CompileError::UnknownTarget(target.to_string()))?;
        let host = host.filter(|h| *h != "None").map(str::to_string);
        let combined = format!("{}{}", entry.id, host.as_deref().unwrap_or("None"));
        let cross_compile = combined.contains(CROSS_COMPILE_MARKER);

        tracing::debug!(
            "resolved target '{}' (host {:?}) → device {}, cross_compile={}",
            entry.id,
            host,
            entry.device,
            cross_compile
        );
        Ok(Self {
            target: entry.id,
            host,
            device: entry.device,
            cross_compile,
        })
    }

    pub fn target(&self) -> &str {
        self.target
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Device family the compiled module executes on.
    pub fn device(&self) -> DeviceKind {
        self.device
    }

    pub fn is_cross_compile(&self) -> bool {
        self.cross_compile
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)?;
        if let Some(host) = &self.host {
            write!(f, " (host: {host})")?;
        }
        if self.cross_compile {
            f.write_str(" [cross-compile]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_every_table_entry() {
        for id in target_ids() {
            let spec = TargetSpec::resolve(id, None).unwrap();
            assert_eq!(spec.target(), id);
        }
    }

    #[test]
    fn test_rejects_unknown() {
        for bad in ["", "LLVM", "llvm ", "rocm", "llvm -target=aarch64-linux-gnu"] {
            assert!(matches!(
                TargetSpec::resolve(bad, None),
                Err(CompileError::UnknownTarget(_))
            ));
        }
    }

    #[test]
    fn test_cross_compile_flag() {
        assert!(!TargetSpec::resolve("llvm", None).unwrap().is_cross_compile());
        let android = TargetSpec::resolve("llvm -target=aarch64-linux-android", None).unwrap();
        assert!(android.is_cross_compile());
        assert_eq!(android.device(), DeviceKind::Cpu);
    }

    #[test]
    fn test_host_containing_marker_sets_flag() {
        let spec = TargetSpec::resolve("cuda", Some("my-android-box")).unwrap();
        assert!(spec.is_cross_compile());
        assert_eq!(spec.host(), Some("my-android-box"));
    }

    #[test]
    fn test_none_host_is_absent() {
        let spec = TargetSpec::resolve("opencl", Some("None")).unwrap();
        assert_eq!(spec.host(), None);
        assert!(!spec.is_cross_compile());
        assert_eq!(spec.device(), DeviceKind::OpenCl);
    }

    #[test]
    fn test_every_target_has_a_device() {
        let devices: Vec<_> = TARGET_TABLE.iter().map(|e| e.device).collect();
        for kind in DeviceKind::ALL {
            assert!(devices.contains(&kind), "{kind} unreachable from the table");
        }
    }

    #[test]
    fn test_display() {
        let spec = TargetSpec::resolve("llvm", Some("llvm")).unwrap();
        assert_eq!(spec.to_string(), "llvm (host: llvm)");
    }
}
