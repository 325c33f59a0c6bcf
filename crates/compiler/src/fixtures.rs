// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Small graphs shared by the unit tests.

use crate::ir::PassGraph;
use graph_ir::{interpret, Graph, Node, OpKind, ParamTable, Validated, DATA_INPUT};
use std::collections::HashMap;
use tensor_core::{Conv2dParams, Shape, Tensor};

pub fn data_shape() -> Shape {
    Shape::nchw(1, 2, 4, 4)
}

pub fn input() -> Tensor {
    let shape = data_shape();
    let data = (0..shape.num_elements())
        .map(|i| (i as f32 * 0.37).sin())
        .collect();
    Tensor::from_vec(shape, data).unwrap()
}

pub fn shapes() -> HashMap<String, Shape> {
    HashMap::from([(DATA_INPUT.to_string(), data_shape())])
}

fn filled(shape: Shape, salt: f32) -> Tensor {
    let data = (0..shape.num_elements())
        .map(|i| ((i as f32 + salt) * 0.13).cos() * 0.3)
        .collect();
    Tensor::from_vec(shape, data).unwrap()
}

fn vector(values: &[f32]) -> Tensor {
    Tensor::from_vec(Shape::vector(values.len()), values.to_vec()).unwrap()
}

fn conv(channels: usize, use_bias: bool) -> OpKind {
    OpKind::Conv2d {
        channels,
        kernel_size: (3, 3),
        conv: Conv2dParams {
            padding: (1, 1),
            ..Conv2dParams::default()
        },
        use_bias,
    }
}

fn insert_bn(params: &mut ParamTable, prefix: &str) {
    params.insert(format!("{prefix}_gamma"), vector(&[2.0, 1.0, 0.5]));
    params.insert(format!("{prefix}_beta"), vector(&[0.5, 0.0, -0.25]));
    params.insert(format!("{prefix}_mean"), vector(&[1.0, -1.0, 0.5]));
    params.insert(format!("{prefix}_var"), vector(&[3.0, 1.0, 0.25]));
}

fn bn_nodes(prefix: &str, data: usize, first: usize) -> Vec<Node> {
    vec![
        Node::variable(format!("{prefix}_gamma")),
        Node::variable(format!("{prefix}_beta")),
        Node::variable(format!("{prefix}_mean")),
        Node::variable(format!("{prefix}_var")),
        Node::new(
            prefix,
            OpKind::BatchNorm { epsilon: 1.0 },
            vec![data, first, first + 1, first + 2, first + 3],
        ),
    ]
}

/// `data → conv0 → bn0 → relu0 → dropout0`, three output channels.
pub fn conv_bn_relu() -> (Graph<Validated>, ParamTable, HashMap<String, Shape>) {
    let mut nodes = vec![
        Node::variable(DATA_INPUT),
        Node::variable("conv0_weight"),
        Node::variable("conv0_bias"),
        Node::new("conv0", conv(3, true), vec![0, 1, 2]),
    ];
    nodes.extend(bn_nodes("bn0", 3, 4));
    nodes.push(Node::new("relu0", OpKind::Relu, vec![8]));
    nodes.push(Node::new("dropout0", OpKind::Dropout { rate: 0.5 }, vec![9]));

    let mut params = ParamTable::new();
    params.insert("conv0_weight", filled(Shape::nchw(3, 2, 3, 3), 0.0));
    params.insert("conv0_bias", vector(&[0.1, -0.2, 0.3]));
    insert_bn(&mut params, "bn0");

    let graph = Graph::new("conv_bn_relu".into(), nodes, vec![10])
        .validate()
        .unwrap();
    (graph, params, shapes())
}

/// A residual unit followed by a classifier head:
///
/// ```text
/// data → conv0 → bn0 → relu0 → conv1 → bn1 ─┐
///   └──────────── conv2 (1x1 projection) ───┴ add → relu1
///       → global_avg_pool → flatten → dense → softmax
/// ```
pub fn residual() -> (Graph<Validated>, ParamTable, HashMap<String, Shape>) {
    let mut nodes = vec![
        Node::variable(DATA_INPUT),
        Node::variable("conv0_weight"),
        Node::new("conv0", conv(3, false), vec![0, 1]),
    ];
    nodes.extend(bn_nodes("bn0", 2, 3)); // 3..=7
    nodes.push(Node::new("relu0", OpKind::Relu, vec![7])); // 8
    nodes.push(Node::variable("conv1_weight")); // 9
    nodes.push(Node::new("conv1", conv(3, false), vec![8, 9])); // 10
    nodes.extend(bn_nodes("bn1", 10, 11)); // 11..=15
    nodes.push(Node::variable("conv2_weight")); // 16
    nodes.push(Node::new(
        "conv2",
        OpKind::Conv2d {
            channels: 3,
            kernel_size: (1, 1),
            conv: Conv2dParams::default(),
            use_bias: false,
        },
        vec![0, 16],
    )); // 17
    nodes.push(Node::new("plus0", OpKind::Add, vec![15, 17])); // 18
    nodes.push(Node::new("relu1", OpKind::Relu, vec![18])); // 19
    nodes.push(Node::new("pool0", OpKind::GlobalAvgPool2d, vec![19])); // 20
    nodes.push(Node::new("flatten0", OpKind::Flatten, vec![20])); // 21
    nodes.push(Node::variable("dense0_weight")); // 22
    nodes.push(Node::variable("dense0_bias")); // 23
    nodes.push(Node::new(
        "dense0",
        OpKind::Dense {
            units: 4,
            use_bias: true,
        },
        vec![21, 22, 23],
    )); // 24
    nodes.push(Node::new("softmax0", OpKind::Softmax, vec![24])); // 25

    let mut params = ParamTable::new();
    params.insert("conv0_weight", filled(Shape::nchw(3, 2, 3, 3), 1.0));
    params.insert("conv1_weight", filled(Shape::nchw(3, 3, 3, 3), 2.0));
    params.insert("conv2_weight", filled(Shape::nchw(3, 2, 1, 1), 3.0));
    params.insert("dense0_weight", filled(Shape::matrix(4, 3), 4.0));
    params.insert("dense0_bias", vector(&[0.0, 0.1, -0.1, 0.2]));
    insert_bn(&mut params, "bn0");
    insert_bn(&mut params, "bn1");

    let graph = Graph::new("residual".into(), nodes, vec![25])
        .validate()
        .unwrap();
    (graph, params, shapes())
}

/// First output of `graph` on [`input`].
pub fn reference(graph: &Graph<Validated>, params: &ParamTable) -> Tensor {
    let inputs = HashMap::from([(DATA_INPUT.to_string(), input())]);
    interpret(graph, &inputs, params).unwrap().remove(0)
}

/// First output of a pass graph on [`input`].
pub fn evaluate(graph: &PassGraph, params: &ParamTable) -> Tensor {
    let graph = Graph::new(graph.name.clone(), graph.nodes.clone(), graph.outputs.clone())
        .validate()
        .unwrap();
    reference(&graph, params)
}
