// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The operator set of the portable graph.
//!
//! Each [`OpKind`] knows how many operands it takes, how to infer its output
//! shape from operand shapes, and how to evaluate itself on concrete tensors.
//! The same evaluation is used by the reference interpreter, by compile-time
//! constant folding and by the runtime's kernel steps, so the three can never
//! disagree about an operator's meaning.

use crate::GraphError;
use tensor_core::{Conv2dParams, Pool2dParams, Shape, Tensor, TensorError};

/// The computation a graph node performs.
///
/// Operand order is fixed per operator and documented on each variant.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum OpKind {
    /// A named input or parameter; no operands.
    Variable,
    /// `[data, weight, bias?]` with weight `[channels, in, kh, kw]`.
    Conv2d {
        channels: usize,
        kernel_size: (usize, usize),
        conv: Conv2dParams,
        use_bias: bool,
    },
    /// `[data, gamma, beta, moving_mean, moving_var]`, normalised along axis 1.
    BatchNorm { epsilon: f32 },
    /// `[data, scale, shift]`, per-channel affine along axis 1.
    ScaleShift,
    /// `[data]`.
    Relu,
    /// `[data]`.
    MaxPool2d { pool: Pool2dParams },
    /// `[data]`.
    AvgPool2d { pool: Pool2dParams },
    /// `[data]` → `[n, c, 1, 1]`.
    GlobalAvgPool2d,
    /// `[data]` → `[n, rest]`.
    Flatten,
    /// `[data, weight, bias?]` with weight `[units, in]`; data is flattened first.
    Dense { units: usize, use_bias: bool },
    /// `[lhs, rhs]`, identical shapes.
    Add,
    /// `[data]`; identity at inference time.
    Dropout { rate: f32 },
    /// `[data]`, normalised along the last axis.
    Softmax,
}

impl OpKind {
    /// Short operator name used in summaries and fused function names.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Variable => "null",
            OpKind::Conv2d { .. } => "conv2d",
            OpKind::BatchNorm { .. } => "batch_norm",
            OpKind::ScaleShift => "scale_shift",
            OpKind::Relu => "relu",
            OpKind::MaxPool2d { .. } => "max_pool2d",
            OpKind::AvgPool2d { .. } => "avg_pool2d",
            OpKind::GlobalAvgPool2d => "global_avg_pool2d",
            OpKind::Flatten => "flatten",
            OpKind::Dense { .. } => "dense",
            OpKind::Add => "elemwise_add",
            OpKind::Dropout { .. } => "dropout",
            OpKind::Softmax => "softmax",
        }
    }

    /// Accepted operand count.
    pub fn arity(&self) -> usize {
        match self {
            OpKind::Variable => 0,
            OpKind::Conv2d { use_bias, .. } | OpKind::Dense { use_bias, .. } => {
                if *use_bias {
                    3
                } else {
                    2
                }
            }
            OpKind::BatchNorm { .. } => 5,
            OpKind::ScaleShift => 3,
            OpKind::Add => 2,
            OpKind::Relu
            | OpKind::MaxPool2d { .. }
            | OpKind::AvgPool2d { .. }
            | OpKind::GlobalAvgPool2d
            | OpKind::Flatten
            | OpKind::Dropout { .. }
            | OpKind::Softmax => 1,
        }
    }

    /// `true` for cheap elementwise/broadcast operators that can be fused
    /// into the operator producing their first operand.
    pub fn is_injective(&self) -> bool {
        matches!(
            self,
            OpKind::Relu | OpKind::ScaleShift | OpKind::Add | OpKind::Flatten
        )
    }

    /// Infers the output shape from the operand shapes.
    ///
    /// # Errors
    /// Returns [`GraphError::InvalidNode`] for an operand count mismatch and
    /// [`GraphError::Tensor`] when operand shapes are incompatible.
    pub fn infer_shape(&self, node: &str, inputs: &[&Shape]) -> Result<Shape, GraphError> {
        if matches!(self, OpKind::Variable) {
            return Err(GraphError::InvalidNode {
                node: node.to_string(),
                detail: "variables take their shape from bound values".into(),
            });
        }
        if inputs.len() != self.arity() {
            return Err(GraphError::InvalidNode {
                node: node.to_string(),
                detail: format!(
                    "{} expects {} operands, got {}",
                    self.as_str(),
                    self.arity(),
                    inputs.len()
                ),
            });
        }
        let data = inputs[0];
        let mismatch = |op: &'static str, lhs: &Shape, rhs: &Shape| {
            GraphError::at(
                node,
                TensorError::ShapeMismatch {
                    op,
                    lhs: lhs.clone(),
                    rhs: rhs.clone(),
                },
            )
        };

        match self {
            OpKind::Variable => unreachable!("handled above"),
            OpKind::Conv2d {
                channels,
                kernel_size,
                conv,
                use_bias,
            } => {
                let in_channels = data.dim(1).unwrap_or(0);
                let expected_w = Shape::nchw(*channels, in_channels, kernel_size.0, kernel_size.1);
                if inputs[1] != &expected_w {
                    return Err(mismatch("conv2d (weight)", &expected_w, inputs[1]));
                }
                if *use_bias && inputs[2] != &Shape::vector(*channels) {
                    return Err(mismatch("conv2d (bias)", &Shape::vector(*channels), inputs[2]));
                }
                conv.output_shape(data, inputs[1])
                    .map_err(|e| GraphError::at(node, e))
            }
            OpKind::BatchNorm { .. } | OpKind::ScaleShift => {
                let channels = data.dim(1).ok_or_else(|| {
                    GraphError::at(
                        node,
                        TensorError::Rank {
                            op: self.as_str(),
                            expected: 2,
                            actual: data.clone(),
                        },
                    )
                })?;
                for s in &inputs[1..] {
                    if s.num_elements() != channels {
                        return Err(mismatch(self.as_str(), &Shape::vector(channels), s));
                    }
                }
                Ok(data.clone())
            }
            OpKind::Relu | OpKind::Dropout { .. } | OpKind::Softmax => Ok(data.clone()),
            OpKind::MaxPool2d { pool } | OpKind::AvgPool2d { pool } => {
                pool.output_shape(data).map_err(|e| GraphError::at(node, e))
            }
            OpKind::GlobalAvgPool2d => match data.as_nchw() {
                Some((n, c, _, _)) => Ok(Shape::nchw(n, c, 1, 1)),
                None => Err(GraphError::at(
                    node,
                    TensorError::Rank {
                        op: "global_avg_pool2d",
                        expected: 4,
                        actual: data.clone(),
                    },
                )),
            },
            OpKind::Flatten => Ok(data.flattened()),
            OpKind::Dense { units, use_bias } => {
                let flat = data.flattened();
                let expected_w = Shape::matrix(*units, flat.dims()[1]);
                if inputs[1] != &expected_w {
                    return Err(mismatch("dense (weight)", &expected_w, inputs[1]));
                }
                if *use_bias && inputs[2] != &Shape::vector(*units) {
                    return Err(mismatch("dense (bias)", &Shape::vector(*units), inputs[2]));
                }
                Ok(Shape::matrix(flat.dims()[0], *units))
            }
            OpKind::Add => {
                if inputs[0] != inputs[1] {
                    return Err(mismatch("elemwise_add", inputs[0], inputs[1]));
                }
                Ok(data.clone())
            }
        }
    }

    /// Evaluates the operator on concrete operands.
    pub fn evaluate(&self, node: &str, inputs: &[&Tensor]) -> Result<Tensor, GraphError> {
        let shapes: Vec<&Shape> = inputs.iter().map(|t| t.shape()).collect();
        let out_shape = self.infer_shape(node, &shapes)?;
        let mut out = Tensor::zeros(out_shape);
        let at = |e: TensorError| GraphError::at(node, e);

        match self {
            OpKind::Variable => unreachable!("infer_shape rejects variables"),
            OpKind::Conv2d { conv, use_bias, .. } => {
                let bias = use_bias.then(|| inputs[2]);
                tensor_core::conv2d(inputs[0], inputs[1], bias, conv, &mut out).map_err(at)?
            }
            OpKind::BatchNorm { epsilon } => tensor_core::batch_norm_inference(
                inputs[0], inputs[1], inputs[2], inputs[3], inputs[4], *epsilon, &mut out,
            )
            .map_err(at)?,
            OpKind::ScaleShift => {
                tensor_core::scale_shift(inputs[0], inputs[1], inputs[2], &mut out).map_err(at)?
            }
            OpKind::Relu => tensor_core::relu(inputs[0], &mut out).map_err(at)?,
            OpKind::MaxPool2d { pool } => {
                tensor_core::max_pool2d(inputs[0], pool, &mut out).map_err(at)?
            }
            OpKind::AvgPool2d { pool } => {
                tensor_core::avg_pool2d(inputs[0], pool, &mut out).map_err(at)?
            }
            OpKind::GlobalAvgPool2d => {
                tensor_core::global_avg_pool2d(inputs[0], &mut out).map_err(at)?
            }
            OpKind::Flatten | OpKind::Dropout { .. } => {
                out.as_mut_slice().copy_from_slice(inputs[0].as_slice());
            }
            OpKind::Dense { use_bias, .. } => {
                let flat = inputs[0]
                    .clone()
                    .reshape(inputs[0].shape().flattened())
                    .map_err(at)?;
                let bias = use_bias.then(|| inputs[2]);
                tensor_core::dense(&flat, inputs[1], bias, &mut out).map_err(at)?
            }
            OpKind::Add => tensor_core::add(inputs[0], inputs[1], &mut out).map_err(at)?,
            OpKind::Softmax => tensor_core::softmax(inputs[0], &mut out).map_err(at)?,
        }
        Ok(out)
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(channels: usize, use_bias: bool) -> OpKind {
        OpKind::Conv2d {
            channels,
            kernel_size: (3, 3),
            conv: Conv2dParams {
                padding: (1, 1),
                ..Default::default()
            },
            use_bias,
        }
    }

    #[test]
    fn test_arity() {
        assert_eq!(conv(8, true).arity(), 3);
        assert_eq!(conv(8, false).arity(), 2);
        assert_eq!(OpKind::BatchNorm { epsilon: 1e-5 }.arity(), 5);
        assert_eq!(OpKind::Softmax.arity(), 1);
    }

    #[test]
    fn test_infer_conv() {
        let data = Shape::nchw(1, 3, 8, 8);
        let weight = Shape::nchw(8, 3, 3, 3);
        let out = conv(8, false).infer_shape("c", &[&data, &weight]).unwrap();
        assert_eq!(out, Shape::nchw(1, 8, 8, 8));
    }

    #[test]
    fn test_infer_conv_bad_weight() {
        let data = Shape::nchw(1, 3, 8, 8);
        let weight = Shape::nchw(8, 4, 3, 3);
        let err = conv(8, false).infer_shape("c", &[&data, &weight]).unwrap_err();
        assert!(matches!(err, GraphError::Tensor { .. }));
    }

    #[test]
    fn test_infer_arity_mismatch() {
        let data = Shape::nchw(1, 3, 8, 8);
        let err = OpKind::Add.infer_shape("a", &[&data]).unwrap_err();
        assert!(matches!(err, GraphError::InvalidNode { .. }));
    }

    #[test]
    fn test_infer_dense_flattens() {
        let data = Shape::nchw(1, 4, 1, 1);
        let w = Shape::matrix(10, 4);
        let b = Shape::vector(10);
        let op = OpKind::Dense {
            units: 10,
            use_bias: true,
        };
        assert_eq!(op.infer_shape("fc", &[&data, &w, &b]).unwrap(), Shape::matrix(1, 10));
    }

    #[test]
    fn test_variable_has_no_rule() {
        assert!(OpKind::Variable.infer_shape("data", &[]).is_err());
    }

    #[test]
    fn test_evaluate_dense_on_pooled_features() {
        let x = Tensor::from_vec(Shape::nchw(1, 2, 1, 1), vec![1.0, 2.0]).unwrap();
        let w = Tensor::from_vec(Shape::matrix(1, 2), vec![3.0, 4.0]).unwrap();
        let op = OpKind::Dense {
            units: 1,
            use_bias: false,
        };
        let y = op.evaluate("fc", &[&x, &w]).unwrap();
        assert_eq!(y.as_slice(), &[11.0]);
    }

    #[test]
    fn test_evaluate_dropout_is_identity() {
        let x = Tensor::from_vec(Shape::vector(3), vec![1.0, -2.0, 3.0]).unwrap();
        let y = OpKind::Dropout { rate: 0.5 }.evaluate("drop", &[&x]).unwrap();
        assert_eq!(y, x);
    }

    #[test]
    fn test_injective_set() {
        assert!(OpKind::Relu.is_injective());
        assert!(OpKind::ScaleShift.is_injective());
        assert!(!OpKind::Softmax.is_injective());
        assert!(!conv(1, false).is_injective());
    }
}
