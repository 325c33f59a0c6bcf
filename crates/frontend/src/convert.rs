// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Conversion of framework models into the portable graph.
//!
//! Both entry points end in [`from_symbol`]: a live block is first traced
//! into its checkpoint triple. Variables that feed a weight operand must
//! have a value in the supplied tables; variables that feed a data operand
//! and have no value become graph inputs. Nodes that do not contribute to
//! the heads (such as the label input of `SoftmaxOutput`) are dropped.

use crate::symbol::SymbolNode;
use crate::{checkpoint, Block, FrontendError, Symbol};
use graph_ir::{Graph, Node, OpKind, ParamTable, Validated};
use std::collections::{HashMap, HashSet};
use tensor_core::{Conv2dParams, Pool2dParams, Tensor};

/// Converts a live block into `(graph, params)`.
pub fn from_block(block: &Block) -> Result<(Graph<Validated>, ParamTable), FrontendError> {
    let (symbol, args, auxs) = checkpoint::block_to_checkpoint(block);
    from_symbol(&symbol, &args, &auxs)
}

/// Converts a symbol plus its argument and auxiliary tables into
/// `(graph, params)`.
///
/// # Errors
/// - [`FrontendError::UnsupportedOperator`] for an operator (or operator
///   configuration) without a graph counterpart.
/// - [`FrontendError::MissingParam`] when a weight operand has no value.
pub fn from_symbol(
    symbol: &Symbol,
    args: &ParamTable,
    auxs: &ParamTable,
) -> Result<(Graph<Validated>, ParamTable), FrontendError> {
    symbol.validate()?;

    let mut nodes = Vec::with_capacity(symbol.nodes.len());
    let mut weight_vars = HashSet::new();
    let mut unit_gamma = HashSet::new();

    for snode in &symbol.nodes {
        if snode.is_variable() {
            nodes.push(Node::variable(snode.name.clone()));
            continue;
        }
        let op = map_operator(snode)?;
        let used = op.arity();
        if snode.inputs.len() < used {
            return Err(FrontendError::InvalidSymbol(format!(
                "node '{}' ({}) has {} inputs, needs {used}",
                snode.name,
                snode.op,
                snode.inputs.len()
            )));
        }
        let operands: Vec<usize> = snode.inputs[..used].iter().map(|e| e[0]).collect();
        if let Some(e) = snode.inputs[..used].iter().find(|e| e[1] != 0) {
            return Err(FrontendError::UnsupportedOperator {
                op: format!("{} (output {} of node {})", snode.op, e[1], e[0]),
                node: snode.name.clone(),
            });
        }
        if matches!(
            op,
            OpKind::Conv2d { .. } | OpKind::Dense { .. } | OpKind::BatchNorm { .. }
        ) {
            weight_vars.extend(operands[1..].iter().copied());
        }
        if matches!(op, OpKind::BatchNorm { .. }) && snode.attr_bool_or("fix_gamma", true)? {
            unit_gamma.insert(operands[1]);
        }
        nodes.push(Node::new(snode.name.clone(), op, operands));
    }

    let heads: Vec<usize> = symbol.heads.iter().map(|h| h[0]).collect();
    let (nodes, outputs, kept) = prune_unreachable(nodes, &heads);

    let mut params = ParamTable::new();
    for (node, &old) in nodes.iter().zip(&kept) {
        if !node.is_variable() {
            continue;
        }
        match args.get(&node.name).or_else(|| auxs.get(&node.name)) {
            Some(value) if unit_gamma.contains(&old) => {
                params.insert(node.name.clone(), Tensor::full(value.shape().clone(), 1.0));
            }
            Some(value) => {
                params.insert(node.name.clone(), value.clone());
            }
            None if weight_vars.contains(&old) => {
                return Err(FrontendError::MissingParam(node.name.clone()));
            }
            None => {}
        }
    }

    let graph = Graph::new(symbol.name().to_string(), nodes, outputs).validate()?;
    tracing::info!(
        "converted '{}': {} operators, {} parameters",
        graph.name,
        graph.num_ops(),
        params.len()
    );
    Ok((graph, params))
}

/// Maps one framework operator onto a graph operator.
fn map_operator(node: &SymbolNode) -> Result<OpKind, FrontendError> {
    let unsupported = |detail: &str| FrontendError::UnsupportedOperator {
        op: if detail.is_empty() {
            node.op.clone()
        } else {
            format!("{}({detail})", node.op)
        },
        node: node.name.clone(),
    };

    let op = match node.op.as_str() {
        "Convolution" => {
            let groups = node.attr("num_group").map_or(Ok(1), |_| node.attr_usize("num_group"))?;
            if groups != 1 {
                return Err(unsupported(&format!("num_group={groups}")));
            }
            if let Some(layout) = node.attr("layout").filter(|l| *l != "NCHW") {
                return Err(unsupported(&format!("layout={layout}")));
            }
            OpKind::Conv2d {
                channels: node.attr_usize("num_filter")?,
                kernel_size: node.attr_pair("kernel")?,
                conv: Conv2dParams {
                    strides: node.attr_pair_or("stride", (1, 1))?,
                    padding: node.attr_pair_or("pad", (0, 0))?,
                    dilation: node.attr_pair_or("dilate", (1, 1))?,
                },
                use_bias: !node.attr_bool_or("no_bias", false)?,
            }
        }
        "BatchNorm" => {
            if let Some(axis) = node.attr("axis").filter(|a| a.trim() != "1") {
                return Err(unsupported(&format!("axis={axis}")));
            }
            OpKind::BatchNorm {
                epsilon: node.attr_f32_or("eps", 1e-3)?,
            }
        }
        "Activation" => match node.attr("act_type") {
            Some("relu") => OpKind::Relu,
            other => return Err(unsupported(other.unwrap_or("act_type missing"))),
        },
        "relu" => OpKind::Relu,
        "Pooling" => {
            let pool_type = node.attr("pool_type").unwrap_or("max");
            let global = node.attr_bool_or("global_pool", false)?;
            if node.attr("pooling_convention").is_some_and(|c| c != "valid") {
                return Err(unsupported("pooling_convention"));
            }
            match (pool_type, global) {
                ("avg", true) => OpKind::GlobalAvgPool2d,
                ("max" | "avg", false) => {
                    let pool = Pool2dParams {
                        pool_size: node.attr_pair("kernel")?,
                        strides: node.attr_pair_or("stride", (1, 1))?,
                        padding: node.attr_pair_or("pad", (0, 0))?,
                    };
                    if pool_type == "max" {
                        OpKind::MaxPool2d { pool }
                    } else {
                        OpKind::AvgPool2d { pool }
                    }
                }
                (other, global) => {
                    return Err(unsupported(&format!("pool_type={other}, global_pool={global}")))
                }
            }
        }
        "Flatten" | "flatten" => OpKind::Flatten,
        "FullyConnected" => {
            if !node.attr_bool_or("flatten", true)? {
                return Err(unsupported("flatten=False"));
            }
            OpKind::Dense {
                units: node.attr_usize("num_hidden")?,
                use_bias: !node.attr_bool_or("no_bias", false)?,
            }
        }
        "elemwise_add" | "_Plus" | "_plus" => OpKind::Add,
        "Dropout" => OpKind::Dropout {
            rate: node.attr_f32_or("p", 0.5)?,
        },
        "softmax" | "SoftmaxActivation" | "SoftmaxOutput" => {
            if let Some(axis) = node.attr("axis").filter(|a| a.trim() != "-1") {
                return Err(unsupported(&format!("axis={axis}")));
            }
            OpKind::Softmax
        }
        _ => return Err(unsupported("")),
    };
    Ok(op)
}

/// Keeps only nodes the heads depend on.
///
/// Returns the compacted nodes, the remapped heads, and for every kept node
/// its index before compaction.
fn prune_unreachable(nodes: Vec<Node>, heads: &[usize]) -> (Vec<Node>, Vec<usize>, Vec<usize>) {
    let mut live = vec![false; nodes.len()];
    for &h in heads {
        live[h] = true;
    }
    for i in (0..nodes.len()).rev() {
        if live[i] {
            for &j in &nodes[i].inputs {
                live[j] = true;
            }
        }
    }

    let mut remap = HashMap::new();
    let mut kept = Vec::new();
    let mut out = Vec::new();
    for (i, mut node) in nodes.into_iter().enumerate() {
        if !live[i] {
            tracing::debug!("dropping '{}': not reachable from the heads", node.name);
            continue;
        }
        node.inputs = node.inputs.iter().map(|j| remap[j]).collect();
        remap.insert(i, out.len());
        kept.push(i);
        out.push(node);
    }
    let outputs = heads.iter().map(|h| remap[h]).collect();
    (out, outputs, kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{bool_attr, pair_attr, SymbolBuilder};
    use crate::Layer;
    use tensor_core::Shape;

    fn conv_symbol(no_bias: bool) -> Symbol {
        let mut b = SymbolBuilder::new();
        let data = b.var("data");
        let w = b.var("c_weight");
        let mut inputs = vec![data, w];
        if !no_bias {
            inputs.push(b.var("c_bias"));
        }
        let conv = b.op(
            "Convolution",
            "c_fwd",
            vec![
                ("kernel", pair_attr((1, 1))),
                ("num_filter", "2".into()),
                ("no_bias", bool_attr(no_bias)),
            ],
            &inputs,
        );
        b.finish(conv)
    }

    fn conv_args() -> ParamTable {
        let mut t = ParamTable::new();
        t.insert("c_weight", Tensor::full(Shape::nchw(2, 3, 1, 1), 0.5));
        t
    }

    #[test]
    fn test_convolution_mapping() {
        let (graph, params) =
            from_symbol(&conv_symbol(true), &conv_args(), &ParamTable::new()).unwrap();
        assert_eq!(graph.num_nodes(), 3);
        assert_eq!(graph.variables().collect::<Vec<_>>(), vec!["data", "c_weight"]);
        assert_eq!(params.names().collect::<Vec<_>>(), vec!["c_weight"]);
        match &graph.node(2).unwrap().op {
            OpKind::Conv2d {
                channels, use_bias, ..
            } => {
                assert_eq!(*channels, 2);
                assert!(!use_bias);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_weight() {
        let err = from_symbol(&conv_symbol(false), &conv_args(), &ParamTable::new()).unwrap_err();
        assert!(matches!(err, FrontendError::MissingParam(ref n) if n == "c_bias"));
    }

    #[test]
    fn test_unsupported_operator() {
        let mut b = SymbolBuilder::new();
        let data = b.var("data");
        let y = b.op("LRN", "lrn0", vec![], &[data]);
        let err = from_symbol(&b.finish(y), &ParamTable::new(), &ParamTable::new()).unwrap_err();
        assert!(matches!(err, FrontendError::UnsupportedOperator { ref op, .. } if op == "LRN"));
    }

    #[test]
    fn test_unsupported_activation() {
        let mut b = SymbolBuilder::new();
        let data = b.var("data");
        let y = b.op("Activation", "a0", vec![("act_type", "tanh".into())], &[data]);
        let err = from_symbol(&b.finish(y), &ParamTable::new(), &ParamTable::new()).unwrap_err();
        assert!(matches!(err, FrontendError::UnsupportedOperator { .. }));
    }

    #[test]
    fn test_softmax_output_drops_label() {
        let mut b = SymbolBuilder::new();
        let data = b.var("data");
        let label = b.var("softmax_label");
        let y = b.op("SoftmaxOutput", "softmax", vec![], &[data, label]);
        let (graph, params) =
            from_symbol(&b.finish(y), &ParamTable::new(), &ParamTable::new()).unwrap();
        assert_eq!(graph.num_nodes(), 2);
        assert!(graph.find("softmax_label").is_none());
        assert!(params.is_empty());
    }

    #[test]
    fn test_fix_gamma_uses_unit_scale() {
        let mut b = SymbolBuilder::new();
        let data = b.var("data");
        let vars: Vec<usize> = ["g", "b", "m", "v"].iter().map(|n| b.var(*n)).collect();
        let mut inputs = vec![data];
        inputs.extend(&vars);
        let y = b.op("BatchNorm", "bn", vec![], &inputs);
        let mut args = ParamTable::new();
        args.insert("g", Tensor::full(Shape::vector(2), 3.0));
        args.insert("b", Tensor::zeros(Shape::vector(2)));
        let mut auxs = ParamTable::new();
        auxs.insert("m", Tensor::zeros(Shape::vector(2)));
        auxs.insert("v", Tensor::full(Shape::vector(2), 1.0));
        let (graph, params) = from_symbol(&b.finish(y), &args, &auxs).unwrap();
        assert_eq!(params.get("g").unwrap().as_slice(), &[1.0, 1.0]);
        assert_eq!(params.len(), 4);
        assert!(matches!(
            graph.node(5).unwrap().op,
            OpKind::BatchNorm { epsilon } if epsilon == 1e-3
        ));
    }

    #[test]
    fn test_block_and_symbol_agree() {
        let mut block = Block::new(
            "net",
            vec![
                Layer::conv2d("net_conv0_", 3, 4, (3, 3), Conv2dParams::default(), false),
                Layer::batch_norm("net_batchnorm0_", 4),
                Layer::Relu {
                    prefix: "net_relu0_".into(),
                },
                Layer::GlobalAvgPool2d {
                    prefix: "net_pool0_".into(),
                },
                Layer::Dropout {
                    prefix: "net_dropout0_".into(),
                    rate: 0.2,
                },
                Layer::dense("net_dense0_", 4, 3, true),
            ],
        );
        block.initialize(11);
        let (g1, p1) = from_block(&block).unwrap();
        let (sym, args, auxs) = checkpoint::block_to_checkpoint(&block);
        let (g2, p2) = from_symbol(&sym, &args, &auxs).unwrap();
        assert_eq!(g1.nodes(), g2.nodes());
        assert_eq!(p1, p2);
        assert_eq!(p1.len(), 7);
    }
}
