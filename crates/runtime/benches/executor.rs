// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for graph execution and parameter binding.

use compiler::{build, BuildConfig, TargetSpec};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use graph_ir::{LinkOptions, ModuleImage, ParamTable, DATA_INPUT};
use runtime::{DeviceContext, GraphExecutor, Module};
use std::collections::HashMap;
use tensor_core::{Shape, Tensor};

const SIDE: usize = 32;

/// ResNet-18 at a reduced resolution, compiled at `opt_level`.
fn executor(opt_level: u8) -> (GraphExecutor, ParamTable) {
    let block = frontend::zoo::get_model("resnet18_v1", 10).unwrap();
    let (graph, params) = frontend::from_block(&block).unwrap();
    let graph = graph.append_softmax();
    let target = TargetSpec::resolve("llvm", None).unwrap();
    let shapes = HashMap::from([(DATA_INPUT.to_string(), Shape::nchw(1, 3, SIDE, SIDE))]);
    let config = BuildConfig::new(opt_level).unwrap();
    let (compiled, module, deploy_params) =
        build(&graph, &target, &shapes, &params, &config).unwrap();

    let image = ModuleImage {
        link: LinkOptions::native(),
        ..module.image().clone()
    };
    let module = Module::from_image(image).unwrap();
    let mut exec = GraphExecutor::create(compiled, module, DeviceContext::cpu()).unwrap();
    exec.set_input(DATA_INPUT, Tensor::full(Shape::nchw(1, 3, SIDE, SIDE), 0.25))
        .unwrap();
    exec.set_params(&deploy_params).unwrap();
    (exec, deploy_params)
}

fn bench_run(c: &mut Criterion) {
    for level in [0u8, 3] {
        let (mut exec, _) = executor(level);
        c.bench_function(&format!("resnet18_{SIDE}px_opt{level}"), |b| {
            b.iter(|| exec.run().unwrap())
        });
    }
}

fn bench_param_binding(c: &mut Criterion) {
    let (mut exec, params) = executor(3);
    let blob = params.to_blob().unwrap();

    c.bench_function("load_params_resnet18", |b| {
        b.iter(|| exec.load_params(black_box(&blob)).unwrap())
    });
}

criterion_group!(benches, bench_run, bench_param_binding);
criterion_main!(benches);
