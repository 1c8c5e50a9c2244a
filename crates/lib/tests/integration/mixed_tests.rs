//! Mixed-build integration tests.

use bpbridge_lib::config::{Allowlist, Platform};
use bpbridge_lib::graph::{GraphError, ModuleError, ModuleGraph};
use bpbridge_lib::mixed::{MixedBuildStatus, NoExecutor};
use bpbridge_lib::module::Module;
use bpbridge_lib::pipeline;

use super::common::{CannedExecutor, OutputFiles, SourceTree, registry};

fn modules() -> Vec<Module> {
  vec![
    Module::new("libfoo", "cc_library", "foo").with_list("deps", ["libbar"]),
    Module::new("libbar", "cc_library", "bar"),
    Module::new("libskip", "cc_library", "skip").with_bp2build_available(false),
    Module::new("gen", "genrule", "gen"),
  ]
}

fn allowlist() -> Allowlist {
  Allowlist::new()
    .always_convert_type("cc_library")
    .allow_mixed_build("libfoo")
    .allow_mixed_build("libbar")
    .allow_mixed_build("libskip")
}

#[test]
fn answers_flow_back_into_providers() {
  let tree = SourceTree::new();
  let config = tree.config(allowlist()).with_mixed_builds(true);
  let executor = CannedExecutor::answering(&[
    ("//foo:libfoo", "out/libfoo.so"),
    ("//bar:libbar", "out/libbar.so,out/libbar.a"),
  ]);

  let registry = registry();
  let mut graph = ModuleGraph::new(modules(), &registry).unwrap();
  let report = pipeline::run_graph(&mut graph, &registry, &config, &executor).unwrap();

  assert_eq!(executor.batches.lock().unwrap().len(), 1);
  assert_eq!(report.module("libfoo").unwrap().mixed, Some(MixedBuildStatus::Enabled));
  assert_eq!(report.module("libbar").unwrap().mixed, Some(MixedBuildStatus::Enabled));
  assert!(matches!(
    report.module("libskip").unwrap().mixed,
    Some(MixedBuildStatus::Incompatible(_))
  ));
  assert!(matches!(
    report.module("gen").unwrap().mixed,
    Some(MixedBuildStatus::Incompatible(_))
  ));

  let bar = graph.find("libbar", None).unwrap();
  assert_eq!(
    graph.provider::<OutputFiles>(bar),
    &OutputFiles(vec!["out/libbar.so".to_string(), "out/libbar.a".to_string()])
  );
  assert_eq!(report.failed().count(), 0);
}

#[test]
fn excluded_platform_never_queries() {
  let tree = SourceTree::new();
  let config = tree
    .config(allowlist())
    .with_mixed_builds(true)
    .with_platform(Platform::new("windows", "x86_64"));
  let executor = CannedExecutor::default();

  let report = pipeline::run(modules(), &registry(), &config, &executor).unwrap();

  assert!(executor.batches.lock().unwrap().is_empty());
  assert_eq!(report.module("libfoo").unwrap().mixed, Some(MixedBuildStatus::Disabled));
  assert!(report.module("libfoo").unwrap().converted());
}

#[test]
fn unanswered_queries_fail_the_module_and_its_dependents() {
  let tree = SourceTree::new();
  let config = tree.config(allowlist()).with_mixed_builds(true);
  let executor = CannedExecutor::answering(&[("//foo:libfoo", "out/libfoo.so")]);

  let report = pipeline::run(modules(), &registry(), &config, &executor).unwrap();

  assert!(matches!(
    report.module("libbar").unwrap().errors[0],
    ModuleError::MixedBuild(_)
  ));
  assert!(matches!(
    report.module("libfoo").unwrap().errors[0],
    ModuleError::DependencyFailed { .. }
  ));
  assert!(!report.module("libskip").unwrap().is_failed());
}

#[test]
fn missing_executor_aborts_mixed_builds() {
  let tree = SourceTree::new();
  let config = tree.config(allowlist()).with_mixed_builds(true);

  let err = pipeline::run(modules(), &registry(), &config, &NoExecutor).unwrap_err();
  assert!(matches!(err, GraphError::Executor(_)));
}
