// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Elementwise kernels.

use crate::{Tensor, TensorError};

/// `output = max(input, 0)`.
pub fn relu(input: &Tensor, output: &mut Tensor) -> Result<(), TensorError> {
    super::check_output("relu", output, input.shape())?;
    for (d, &s) in output.as_mut_slice().iter_mut().zip(input.as_slice()) {
        *d = s.max(0.0);
    }
    Ok(())
}

/// `output = lhs + rhs` for operands of identical shape.
pub fn add(lhs: &Tensor, rhs: &Tensor, output: &mut Tensor) -> Result<(), TensorError> {
    if lhs.shape() != rhs.shape() {
        return Err(TensorError::ShapeMismatch {
            op: "add",
            lhs: lhs.shape().clone(),
            rhs: rhs.shape().clone(),
        });
    }
    super::check_output("add", output, lhs.shape())?;
    for ((d, &a), &b) in output
        .as_mut_slice()
        .iter_mut()
        .zip(lhs.as_slice())
        .zip(rhs.as_slice())
    {
        *d = a + b;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Shape;

    #[test]
    fn test_relu() {
        let x = Tensor::from_vec(Shape::vector(4), vec![-1.0, 0.0, 0.5, 3.0]).unwrap();
        let mut y = Tensor::zeros(Shape::vector(4));
        relu(&x, &mut y).unwrap();
        assert_eq!(y.as_slice(), &[0.0, 0.0, 0.5, 3.0]);
    }

    #[test]
    fn test_add() {
        let a = Tensor::from_vec(Shape::matrix(1, 2), vec![1.0, 2.0]).unwrap();
        let b = Tensor::from_vec(Shape::matrix(1, 2), vec![0.5, -2.0]).unwrap();
        let mut y = Tensor::zeros(Shape::matrix(1, 2));
        add(&a, &b, &mut y).unwrap();
        assert_eq!(y.as_slice(), &[1.5, 0.0]);
    }

    #[test]
    fn test_add_shape_mismatch() {
        let a = Tensor::zeros(Shape::vector(2));
        let b = Tensor::zeros(Shape::vector(3));
        let mut y = Tensor::zeros(Shape::vector(2));
        assert!(add(&a, &b, &mut y).is_err());
    }
}
