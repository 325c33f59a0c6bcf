// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Tensor shape descriptors.

use std::fmt;

/// Dimensions of a [`crate::Tensor`], outermost first.
///
/// Serialises as a plain JSON array (`[1, 3, 224, 224]`) so it can be
/// embedded directly in graph descriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Creates a shape from the given dimensions.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::Shape;
    /// let s = Shape::new(vec![1, 3, 224, 224]);
    /// assert_eq!(s.rank(), 4);
    /// assert_eq!(s.num_elements(), 150_528);
    /// ```
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Creates a 4-D activation shape in `NCHW` order.
    pub fn nchw(n: usize, c: usize, h: usize, w: usize) -> Self {
        Self {
            dims: vec![n, c, h, w],
        }
    }

    /// Creates a 2-D shape.
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self {
            dims: vec![rows, cols],
        }
    }

    /// Creates a 1-D shape.
    pub fn vector(len: usize) -> Self {
        Self { dims: vec![len] }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements; 1 for a rank-0 shape.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Size of dimension `index`, or `None` if out of bounds.
    pub fn dim(&self, index: usize) -> Option<usize> {
        self.dims.get(index).copied()
    }

    /// Size of the innermost dimension (1 for scalars).
    pub fn last_dim(&self) -> usize {
        self.dims.last().copied().unwrap_or(1)
    }

    /// Splits a rank-4 shape into `(n, c, h, w)`.
    pub fn as_nchw(&self) -> Option<(usize, usize, usize, usize)> {
        match self.dims.as_slice() {
            &[n, c, h, w] => Some((n, c, h, w)),
            _ => None,
        }
    }

    /// Row-major (C-order) strides in elements.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.dims.len()];
        for i in (0..self.dims.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Collapses every dimension after the first: `[n, a, b, ...] → [n, a*b*...]`.
    pub fn flattened(&self) -> Shape {
        match self.dims.split_first() {
            Some((&n, rest)) => Shape::matrix(n, rest.iter().product()),
            None => Shape::matrix(1, 1),
        }
    }

    /// Multi-dimensional coordinate of the flat element `offset`.
    pub fn unravel(&self, mut offset: usize) -> Vec<usize> {
        let mut coord = vec![0usize; self.dims.len()];
        for (i, &d) in self.dims.iter().enumerate().rev() {
            if d > 0 {
                coord[i] = offset % d;
                offset /= d;
            }
        }
        coord
    }
}

/// Output extent of a sliding window along one spatial axis.
///
/// Returns `None` when the (dilated) window does not fit into the padded
/// input or the stride is zero.
pub fn conv_out_dim(
    input: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    dilation: usize,
) -> Option<usize> {
    if stride == 0 || kernel == 0 || dilation == 0 {
        return None;
    }
    let effective = dilation * (kernel - 1) + 1;
    let padded = input + 2 * padding;
    if padded < effective {
        return None;
    }
    Some((padded - effective) / stride + 1)
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, ")")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::new(dims.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nchw() {
        let s = Shape::nchw(1, 3, 224, 224);
        assert_eq!(s.as_nchw(), Some((1, 3, 224, 224)));
        assert_eq!(s.num_elements(), 3 * 224 * 224);
        assert_eq!(Shape::matrix(2, 2).as_nchw(), None);
    }

    #[test]
    fn test_strides() {
        assert_eq!(Shape::new(vec![2, 3, 4]).strides(), vec![12, 4, 1]);
        assert!(Shape::new(vec![]).strides().is_empty());
    }

    #[test]
    fn test_flattened() {
        assert_eq!(Shape::nchw(1, 512, 1, 1).flattened(), Shape::matrix(1, 512));
    }

    #[test]
    fn test_unravel() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.unravel(0), vec![0, 0, 0]);
        assert_eq!(s.unravel(5), vec![0, 1, 1]);
        assert_eq!(s.unravel(23), vec![1, 2, 3]);
    }

    #[test]
    fn test_conv_out_dim() {
        // ResNet stem: 224 → 112 with a 7x7 stride-2 pad-3 window.
        assert_eq!(conv_out_dim(224, 7, 2, 3, 1), Some(112));
        // 3x3 max pool, stride 2, pad 1: 112 → 56.
        assert_eq!(conv_out_dim(112, 3, 2, 1, 1), Some(56));
        assert_eq!(conv_out_dim(2, 5, 1, 0, 1), None);
        assert_eq!(conv_out_dim(8, 3, 0, 0, 1), None);
    }

    #[test]
    fn test_display() {
        let s = Shape::nchw(1, 3, 8, 8);
        assert_eq!(format!("{s}"), "(1, 3, 8, 8)");
    }
}
