// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Owned f32 tensor.

use crate::{DType, Shape, TensorError};

/// An owned, n-dimensional f32 tensor stored in row-major order.
///
/// `Tensor` is the unit of data exchanged between every stage: weights in
/// parameter tables, the normalised input image, intermediate activations
/// and the final class scores.
///
/// Values are held as `Vec<f32>`, so typed access never requires
/// reinterpreting bytes. Conversion to and from the little-endian byte
/// layout used on disk goes through [`Tensor::from_le_bytes`] and
/// [`Tensor::to_le_bytes`].
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f32>,
}

impl Tensor {
    /// Creates a zero-filled tensor.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Shape, Tensor};
    /// let t = Tensor::zeros(Shape::matrix(2, 3));
    /// assert_eq!(t.size_bytes(), 24);
    /// ```
    pub fn zeros(shape: Shape) -> Self {
        let n = shape.num_elements();
        Self {
            shape,
            data: vec![0.0; n],
        }
    }

    /// Creates a tensor filled with `value`.
    pub fn full(shape: Shape, value: f32) -> Self {
        let n = shape.num_elements();
        Self {
            shape,
            data: vec![value; n],
        }
    }

    /// Wraps `data` as a tensor of the given shape.
    ///
    /// # Errors
    /// Returns [`TensorError::ElementCount`] if `data.len()` does not match
    /// the shape's element count.
    pub fn from_vec(shape: Shape, data: Vec<f32>) -> Result<Self, TensorError> {
        let expected = shape.num_elements();
        if data.len() != expected {
            return Err(TensorError::ElementCount {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Decodes little-endian f32 bytes into a tensor of the given shape.
    pub fn from_le_bytes(shape: Shape, bytes: &[u8]) -> Result<Self, TensorError> {
        let width = DType::F32.size_bytes();
        if bytes.len() % width != 0 {
            return Err(TensorError::ByteLength {
                len: bytes.len(),
                width,
            });
        }
        let data = bytes
            .chunks_exact(width)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::from_vec(shape, data)
    }

    /// Encodes the values as little-endian f32 bytes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size_bytes());
        for v in &self.data {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Element type; always [`DType::F32`].
    pub fn dtype(&self) -> DType {
        DType::F32
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Consumes the tensor and returns its values.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    pub fn num_elements(&self) -> usize {
        self.data.len()
    }

    /// Memory footprint of the values in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len() * DType::F32.size_bytes()
    }

    /// Reinterprets the tensor under a new shape with the same element count.
    pub fn reshape(self, shape: Shape) -> Result<Self, TensorError> {
        Self::from_vec(shape, self.data)
    }

    /// Index of the largest value in the flat buffer (first one on ties).
    ///
    /// Returns `None` for an empty tensor. NaN values never win.
    pub fn argmax(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (i, &v) in self.data.iter().enumerate() {
            match best {
                Some((_, b)) if !(v > b) => {}
                _ if v.is_nan() => {}
                _ => best = Some((i, v)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Largest absolute element-wise difference to `other`.
    ///
    /// Returns `None` when the shapes differ.
    pub fn max_abs_diff(&self, other: &Tensor) -> Option<f32> {
        if self.shape != other.shape {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0f32, f32::max),
        )
    }
}
