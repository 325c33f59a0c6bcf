// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element types recognised by the serialised graph and parameter formats.

/// Element type of a serialised tensor.
///
/// Kernels only compute in [`DType::F32`]; the other variants exist so that
/// graph descriptions and blobs produced elsewhere can be described and
/// rejected with a precise error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DType {
    /// 32-bit IEEE 754 floating point.
    F32,
    /// 16-bit IEEE 754 floating point.
    F16,
    /// 32-bit signed integer.
    I32,
    /// 8-bit unsigned integer (raw image bytes).
    U8,
}

impl DType {
    /// Width of one element in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F16 => 2,
            DType::U8 => 1,
        }
    }

    /// Name used in the `dltype` attribute of graph descriptions.
    pub fn as_dltype(self) -> &'static str {
        match self {
            DType::F32 => "float32",
            DType::F16 => "float16",
            DType::I32 => "int32",
            DType::U8 => "uint8",
        }
    }

    /// Parses a `dltype` string such as `"float32"`.
    pub fn from_dltype(s: &str) -> Option<Self> {
        match s {
            "float32" => Some(DType::F32),
            "float16" => Some(DType::F16),
            "int32" => Some(DType::I32),
            "uint8" => Some(DType::U8),
            _ => None,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_dltype())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dltype_names() {
        for dtype in [DType::F32, DType::F16, DType::I32, DType::U8] {
            assert_eq!(DType::from_dltype(dtype.as_dltype()), Some(dtype));
        }
        assert_eq!(DType::from_dltype("float64"), None);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(DType::F32.size_bytes(), 4);
        assert_eq!(DType::F16.size_bytes(), 2);
        assert_eq!(DType::U8.size_bytes(), 1);
    }
}
