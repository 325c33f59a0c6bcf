// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Parameter tables and their SafeTensors blob encoding.

use crate::GraphError;
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use std::collections::BTreeMap;
use std::path::Path;
use tensor_core::{Shape, Tensor};

/// Parameter name → weight tensor, kept in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamTable {
    entries: BTreeMap<String, Tensor>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter, returning the previous value under that name.
    pub fn insert(&mut self, name: impl Into<String>, value: Tensor) -> Option<Tensor> {
        self.entries.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        self.entries.remove(name)
    }

    /// Keeps only the parameters whose name satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|k, _| keep(k));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Total weight bytes across all parameters.
    pub fn total_bytes(&self) -> usize {
        self.entries.values().map(Tensor::size_bytes).sum()
    }

    /// Encodes the table as a SafeTensors blob (little-endian f32).
    pub fn to_blob(&self) -> Result<Vec<u8>, GraphError> {
        let bytes: Vec<(String, Vec<u8>, Vec<usize>)> = self
            .entries
            .iter()
            .map(|(name, t)| (name.clone(), t.to_le_bytes(), t.shape().dims().to_vec()))
            .collect();
        let views = bytes
            .iter()
            .map(|(name, data, dims)| {
                TensorView::new(Dtype::F32, dims.clone(), data)
                    .map(|v| (name.as_str(), v))
                    .map_err(|e| GraphError::ParamBlob(format!("'{name}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        safetensors::serialize(views, &None).map_err(|e| GraphError::ParamBlob(e.to_string()))
    }

    /// Decodes a SafeTensors blob. Only `F32` entries are accepted.
    pub fn from_blob(blob: &[u8]) -> Result<Self, GraphError> {
        let tensors =
            SafeTensors::deserialize(blob).map_err(|e| GraphError::ParamBlob(e.to_string()))?;
        let mut table = Self::new();
        for (name, view) in tensors.tensors() {
            if view.dtype() != Dtype::F32 {
                return Err(GraphError::UnsupportedDType {
                    name,
                    dtype: format!("{:?}", view.dtype()),
                });
            }
            let shape = Shape::new(view.shape().to_vec());
            let tensor = Tensor::from_le_bytes(shape, view.data())
                .map_err(|e| GraphError::at(&name, e))?;
            table.insert(name, tensor);
        }
        Ok(table)
    }

    /// Writes the blob to `path`.
    pub fn save(&self, path: &Path) -> Result<(), GraphError> {
        std::fs::write(path, self.to_blob()?)?;
        Ok(())
    }

    /// Reads a blob from `path` via a memory map.
    pub fn load(path: &Path) -> Result<Self, GraphError> {
        let file = std::fs::File::open(path)?;
        // SAFETY: the map is read-only and dropped before this function returns;
        // the table owns copies of every tensor.
        let mmap = unsafe { memmap2::Mmap::map(&file) }?;
        let table = Self::from_blob(&mmap)?;
        tracing::debug!(
            "loaded {} parameters ({:.2} MB) from {}",
            table.len(),
            table.total_bytes() as f64 / (1024.0 * 1024.0),
            path.display()
        );
        Ok(table)
    }
}

impl FromIterator<(String, Tensor)> for ParamTable {
    fn from_iter<I: IntoIterator<Item = (String, Tensor)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ParamTable {
    type Item = (String, Tensor);
    type IntoIter = std::collections::btree_map::IntoIter<String, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParamTable {
        let mut t = ParamTable::new();
        t.insert(
            "conv0_weight",
            Tensor::from_vec(Shape::nchw(2, 1, 1, 1), vec![0.5, -1.5]).unwrap(),
        );
        t.insert("fc_bias", Tensor::full(Shape::vector(3), 0.25));
        t
    }

    #[test]
    fn test_blob_preserves_values() {
        let table = sample();
        let back = ParamTable::from_blob(&table.to_blob().unwrap()).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.params");
        sample().save(&path).unwrap();
        let loaded = ParamTable::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("fc_bias").unwrap().as_slice(), &[0.25; 3]);
    }

    #[test]
    fn test_garbage_blob_rejected() {
        let err = ParamTable::from_blob(b"not a blob").unwrap_err();
        assert!(matches!(err, GraphError::ParamBlob(_)));
    }

    #[test]
    fn test_non_f32_rejected() {
        let data = vec![1u8, 2, 3, 4];
        let view = TensorView::new(Dtype::U8, vec![4], &data).unwrap();
        let blob = safetensors::serialize(vec![("ids", view)], &None).unwrap();
        let err = ParamTable::from_blob(&blob).unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedDType { .. }));
    }

    #[test]
    fn test_retain() {
        let mut t = sample();
        t.retain(|n| n.starts_with("fc"));
        assert_eq!(t.names().collect::<Vec<_>>(), vec!["fc_bias"]);
    }

    #[test]
    fn test_total_bytes() {
        assert_eq!(sample().total_bytes(), (2 + 3) * 4);
    }
}
