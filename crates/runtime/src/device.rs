// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device contexts.

use crate::RuntimeError;
use graph_ir::DeviceKind;
use std::fmt;

/// A device family plus an ordinal, as in DLPack's `(device_type, device_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceContext {
    kind: DeviceKind,
    id: usize,
}

impl DeviceContext {
    pub fn new(kind: DeviceKind, id: usize) -> Self {
        Self { kind, id }
    }

    pub fn cpu() -> Self {
        Self::new(DeviceKind::Cpu, 0)
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// `true` when kernels can run on this device in this build.
    pub fn can_execute(&self) -> bool {
        match self.kind {
            DeviceKind::Cpu => true,
            DeviceKind::Cuda
            | DeviceKind::OpenCl
            | DeviceKind::Vulkan
            | DeviceKind::Metal
            | DeviceKind::OpenGl => false,
        }
    }

    pub(crate) fn ensure_executable(&self) -> Result<(), RuntimeError> {
        if self.can_execute() {
            Ok(())
        } else {
            Err(RuntimeError::DeviceUnavailable {
                kind: self.kind,
                id: self.id,
            })
        }
    }
}

impl Default for DeviceContext {
    fn default() -> Self {
        Self::cpu()
    }
}

impl fmt::Display for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_cpu_executes() {
        for kind in DeviceKind::ALL {
            let ctx = DeviceContext::new(kind, 0);
            assert_eq!(ctx.can_execute(), kind == DeviceKind::Cpu);
        }
    }

    #[test]
    fn test_unavailable_error() {
        let err = DeviceContext::new(DeviceKind::Cuda, 1)
            .ensure_executable()
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::DeviceUnavailable {
                kind: DeviceKind::Cuda,
                id: 1
            }
        ));
        assert!(err.to_string().contains("cuda(1)"));
    }
}
