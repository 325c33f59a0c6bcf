// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Dense f32 tensors and the numeric kernels that compiled graphs are
//! lowered onto.
//!
//! This crate provides:
//! - [`Tensor`]: an owned, row-major f32 tensor.
//! - [`Shape`]: runtime shape descriptors with NCHW helpers.
//! - [`DType`]: element types understood by the serialised formats.
//! - Kernels: 2-D convolution, pooling, dense, batch normalisation,
//!   per-channel scale/shift, ReLU, elementwise add and softmax.
//!
//! # Layout Conventions
//! - Activations are `NCHW`.
//! - Convolution weights are `OIHW`.
//! - Dense weights are `[units, in_features]` (`y = x · Wᵀ + b`).
//!
//! Every kernel writes into a caller-provided output tensor and validates
//! shapes up front, returning [`TensorError`] instead of panicking.

mod dtype;
mod error;
mod ops;
mod shape;
mod tensor;

pub use dtype::DType;
pub use error::TensorError;
pub use ops::{
    add, avg_pool2d, batch_norm_inference, conv2d, dense, global_avg_pool2d, max_pool2d, relu,
    scale_shift, softmax, Conv2dParams, Pool2dParams,
};
pub use shape::Shape;
pub use tensor::Tensor;
