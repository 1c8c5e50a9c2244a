//! End-to-end conversion over source trees on disk.

use bpbridge_lib::config::{Allowlist, BuildMode, DirDefault};
use bpbridge_lib::convert::AttrValue;
use bpbridge_lib::graph::ModuleError;
use bpbridge_lib::label::Label;
use bpbridge_lib::mixed::NoExecutor;
use bpbridge_lib::module::Module;
use bpbridge_lib::pipeline;

use super::common::{SourceTree, registry};

fn srcs_of(report: &pipeline::BuildReport, module: &str) -> Vec<String> {
  let targets = &report.module(module).unwrap().targets;
  match targets[0].attrs.get("srcs") {
    Some(AttrValue::LabelList(labels)) => labels.iter().map(|l| l.address.clone()).collect(),
    other => panic!("unexpected srcs for {}: {:?}", module, other),
  }
}

#[test]
fn sources_in_subpackages_are_rehomed() {
  let tree = SourceTree::with_files(&["x/Android.bp", "x/y/Android.bp", "x/y/a.c", "x/z/b.c"]);
  let modules = vec![Module::new("files", "filegroup", "x").with_list("srcs", ["y/a.c", "./z/b.c"])];
  let config = tree.config(Allowlist::new().set_dir_default("x", DirDefault::True));

  let report = pipeline::run(modules, &registry(), &config, &NoExecutor).unwrap();

  assert_eq!(srcs_of(&report, "files"), vec!["//x/y:a.c", "z/b.c"]);
}

#[test]
fn globs_and_excludes_across_packages() {
  let tree = SourceTree::with_files(&[
    "src/Android.bp",
    "src/main.c",
    "src/main_test.c",
    "src/util/helper.c",
    "src/vendor/Android.bp",
    "src/vendor/lib.c",
    "src/vendor/lib_test.c",
  ]);
  let modules = vec![
    Module::new("sources", "filegroup", "src")
      .with_list("srcs", ["**/*.c"])
      .with_list("exclude_srcs", ["**/*_test.c"]),
  ];
  let config = tree.config(Allowlist::new().set_dir_default("src", DirDefault::TrueRecursively));

  let report = pipeline::run(modules, &registry(), &config, &NoExecutor).unwrap();

  assert_eq!(
    srcs_of(&report, "sources"),
    vec!["main.c", "util/helper.c", "//src/vendor:lib.c"]
  );
  let rendered = report.render_build_files();
  assert!(rendered["src"].contains("\"//src/vendor:lib.c\""));
}

#[test]
fn kept_build_files_mark_packages() {
  let tree = SourceTree::with_files(&["x/kept/BUILD", "x/kept/a.c", "x/plain/BUILD.bazel", "x/plain/b.c"]);
  let modules = vec![Module::new("files", "filegroup", "x").with_list("srcs", ["kept/a.c", "plain/b.c"])];
  let config = tree.config(
    Allowlist::new()
      .set_dir_default("x", DirDefault::True)
      .keep_existing_build_file("x/kept", false),
  );

  let report = pipeline::run(modules, &registry(), &config, &NoExecutor).unwrap();

  assert_eq!(srcs_of(&report, "files"), vec!["//x/kept:a.c", "plain/b.c"]);
}

#[cfg(unix)]
#[test]
fn symlinked_directories_with_build_files_are_packages() {
  let tree = SourceTree::with_files(&["external/lib/BUILD.bazel", "external/lib/c.c"]);
  tree.symlink_dir("external/lib", "x/linked");
  let modules = vec![Module::new("files", "filegroup", "x").with_list("srcs", ["linked/c.c"])];
  let config = tree.config(Allowlist::new().set_dir_default("x", DirDefault::True));

  let report = pipeline::run(modules, &registry(), &config, &NoExecutor).unwrap();

  assert_eq!(srcs_of(&report, "files"), vec!["//x/linked:c.c"]);
}

#[test]
fn tagged_references_use_declared_outputs() {
  let tree = SourceTree::with_files(&["y/Android.bp", "y/lib.c", "y/lib.h", "y/extra.h"]);
  let modules = vec![
    Module::new("all", "filegroup", "x").with_list("srcs", [":lib{.hdrs}", ":lib{.objs}"]),
    Module::new("lib", "cc_library", "y")
      .with_list("srcs", ["lib.c"])
      .with_list("hdrs", ["*.h"]),
  ];
  let config = tree.config(
    Allowlist::new()
      .set_dir_default("x", DirDefault::True)
      .set_dir_default("y", DirDefault::True),
  );

  let report = pipeline::run(modules, &registry(), &config, &NoExecutor).unwrap();

  assert_eq!(srcs_of(&report, "all"), vec!["//y:lib.hdrs", "//y:lib"]);
  let files = report.build_files();
  let names: Vec<&str> = files["y"].iter().map(|t| t.name.as_str()).collect();
  assert_eq!(names, vec!["lib", "lib.hdrs"]);
  assert_eq!(
    files["y"][1].attrs.get("srcs"),
    Some(&AttrValue::LabelList(vec![Label::new("extra.h"), Label::new("lib.h")]))
  );
}

#[test]
fn sources_spanning_packages_fail_the_module_only() {
  let tree = SourceTree::with_files(&["x/p/Android.bp", "x/p/a.c", "x/q/Android.bp", "x/q/b.c"]);
  let modules = vec![
    Module::new("spread", "cc_library", "x").with_list("srcs", ["p/a.c", "q/b.c"]),
    Module::new("user", "filegroup", "x").with_list("srcs", [":spread"]),
    Module::new("bystander", "filegroup", "x").with_list("srcs", ["p/a.c"]),
  ];
  let config = tree.config(Allowlist::new().set_dir_default("x", DirDefault::True));

  let report = pipeline::run(modules, &registry(), &config, &NoExecutor).unwrap();

  assert!(matches!(
    report.module("spread").unwrap().errors[0],
    ModuleError::CrossPackage { .. }
  ));
  assert!(report.module("user").unwrap().is_failed());
  assert!(report.module("bystander").unwrap().converted());
  assert_eq!(report.failed().count(), 2);
}

#[test]
fn api_mode_converts_only_api_surfaces() {
  let tree = SourceTree::with_files(&["api/Android.bp", "api/current.txt"]);
  let modules = vec![
    Module::new("api_files", "filegroup", "api")
      .with_list("srcs", ["current.txt"])
      .with_api_surface(),
    Module::new("impl_files", "filegroup", "api"),
  ];
  let config = tree
    .config(Allowlist::new().set_dir_default("api", DirDefault::TrueRecursively))
    .with_mode(BuildMode::ApiBp2build);

  let report = pipeline::run(modules, &registry(), &config, &NoExecutor).unwrap();

  assert!(report.module("api_files").unwrap().converted());
  assert!(!report.module("impl_files").unwrap().converted());
}

#[test]
fn allowlist_loaded_from_json() {
  let tree = SourceTree::with_files(&["a/b/c/f.txt"]);
  let allowlist = Allowlist::from_json(
    r#"{
      "dir_defaults": { "a": "true_recursively", "a/b": "false" },
      "module_always_convert": ["forced"]
    }"#,
  )
  .unwrap();
  let modules = vec![
    Module::new("deep", "filegroup", "a/b/c").with_list("srcs", ["f.txt"]),
    Module::new("exact", "filegroup", "a/b"),
    Module::new("forced", "filegroup", "a/b"),
  ];
  let config = tree.config(allowlist);

  let report = pipeline::run(modules, &registry(), &config, &NoExecutor).unwrap();

  let deep = report.module("deep").unwrap();
  assert!(deep.converted());
  assert_eq!(deep.decision.as_ref().unwrap().matched_prefix.as_deref(), Some("a"));
  assert!(!report.module("exact").unwrap().converted());
  assert!(report.module("forced").unwrap().converted());
  assert!(report.diagnostics().is_empty());
}
