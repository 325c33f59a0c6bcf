// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Device families a compiled graph can be placed on.

use std::fmt;

/// A device family, identified by its DLPack device-type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Cuda,
    OpenCl,
    Vulkan,
    Metal,
    OpenGl,
}

impl DeviceKind {
    /// All device families, in DLPack code order.
    pub const ALL: [DeviceKind; 6] = [
        DeviceKind::Cpu,
        DeviceKind::Cuda,
        DeviceKind::OpenCl,
        DeviceKind::Vulkan,
        DeviceKind::Metal,
        DeviceKind::OpenGl,
    ];

    /// DLPack `device_type` code.
    pub fn code(self) -> u32 {
        match self {
            DeviceKind::Cpu => 1,
            DeviceKind::Cuda => 2,
            DeviceKind::OpenCl => 4,
            DeviceKind::Vulkan => 7,
            DeviceKind::Metal => 8,
            DeviceKind::OpenGl => 11,
        }
    }

    /// Looks a device family up by its DLPack code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.code() == code)
    }

    /// Lower-case device name (`"cpu"`, `"cuda"`, ...).
    pub fn name(self) -> &'static str {
        match self {
            DeviceKind::Cpu => "cpu",
            DeviceKind::Cuda => "cuda",
            DeviceKind::OpenCl => "opencl",
            DeviceKind::Vulkan => "vulkan",
            DeviceKind::Metal => "metal",
            DeviceKind::OpenGl => "opengl",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_unique() {
        for (i, a) in DeviceKind::ALL.iter().enumerate() {
            for b in &DeviceKind::ALL[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }

    #[test]
    fn test_from_code() {
        assert_eq!(DeviceKind::from_code(1), Some(DeviceKind::Cpu));
        assert_eq!(DeviceKind::from_code(11), Some(DeviceKind::OpenGl));
        assert_eq!(DeviceKind::from_code(3), None);
    }
}
