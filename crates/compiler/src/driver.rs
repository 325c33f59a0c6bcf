// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The build entry point.

use crate::codegen::generate;
use crate::fuse::fuse_groups;
use crate::ir::PassGraph;
use crate::pass::{default_passes, run_passes};
use crate::{BuildConfig, CompileError, CompiledModule, TargetSpec};
use graph_ir::{CompiledGraph, Graph, ParamTable, Validated};
use std::collections::HashMap;
use std::time::Instant;
use tensor_core::Shape;

/// Compiles a portable graph for `target`.
///
/// `shape_dict` gives the shape of every runtime input; every other
/// variable must be bound in `params`. Returns the compiled graph
/// description, the module holding its fused functions, and the parameter
/// table the module expects at run time.
///
/// # Errors
/// [`CompileError::UnknownInput`], [`CompileError::MissingParam`],
/// [`CompileError::MissingInputShape`] and [`CompileError::ShapeMismatch`]
/// for inconsistent bindings; [`CompileError::Graph`] when shape inference
/// fails. No partial result is returned.
pub fn build(
    graph: &Graph<Validated>,
    target: &TargetSpec,
    shape_dict: &HashMap<String, Shape>,
    params: &ParamTable,
    config: &BuildConfig,
) -> Result<(CompiledGraph, CompiledModule, ParamTable), CompileError> {
    let start = Instant::now();
    tracing::info!(
        "building '{}' for {} at opt_level {}",
        graph.name,
        target,
        config.opt_level()
    );

    let mut params = params.clone();
    let mut pass_graph = PassGraph::new(graph, shape_dict, &params)?;
    run_passes(&default_passes(), &mut pass_graph, &mut params, config)?;

    let groups = fuse_groups(&pass_graph, config.fuse_ops());
    for group in &groups {
        tracing::debug!(
            "group '{}': {} operator(s)",
            pass_graph.nodes[group.output].name,
            group.nodes.len()
        );
    }

    let (compiled, functions) = generate(&pass_graph, &groups);
    compiled.validate()?;
    let module = CompiledModule::new(target, functions);

    tracing::info!(
        "built {} node(s), {} function(s), {} storage slot(s), {} parameter(s) in {:.1} ms",
        compiled.num_nodes(),
        module.functions().len(),
        compiled.num_storage(),
        params.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok((compiled, module, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_build_keeps_only_referenced_params() {
        let (graph, params, shapes) = fixtures::residual();
        let target = TargetSpec::resolve("llvm", None).unwrap();
        let (compiled, _, params) =
            build(&graph, &target, &shapes, &params, &BuildConfig::default()).unwrap();
        let args: Vec<&str> = compiled.arg_names().collect();
        for name in params.names() {
            assert!(args.contains(&name), "{name} is not an argument");
        }
        assert_eq!(args.len(), params.len() + 1); // + data
    }

    #[test]
    fn test_build_records_target() {
        let (graph, params, shapes) = fixtures::conv_bn_relu();
        let target = TargetSpec::resolve("cuda", Some("llvm")).unwrap();
        let (_, module, _) =
            build(&graph, &target, &shapes, &params, &BuildConfig::default()).unwrap();
        assert_eq!(module.target(), "cuda");
        assert_eq!(module.host(), Some("llvm"));
    }

    #[test]
    fn test_build_rejects_unknown_input() {
        let (graph, params, mut shapes) = fixtures::conv_bn_relu();
        shapes.insert("image".into(), Shape::nchw(1, 3, 4, 4));
        let target = TargetSpec::resolve("llvm", None).unwrap();
        assert!(matches!(
            build(&graph, &target, &shapes, &params, &BuildConfig::default()),
            Err(CompileError::UnknownInput(_))
        ));
    }
}
