//! Shared helpers for conversion integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bpbridge_lib::config::{Allowlist, Config};
use bpbridge_lib::convert::{ConvertContext, Converter, Target};
use bpbridge_lib::fs::OsFileSystem;
use bpbridge_lib::graph::ModuleError;
use bpbridge_lib::mixed::{ConsumeContext, ExecutorError, ExternalExecutor, MixedBuilder, Query, QueueContext, Request};
use bpbridge_lib::module::{Capability, TypeRegistry};
use tempfile::TempDir;

/// A source tree in a temporary directory.
pub struct SourceTree {
  pub temp: TempDir,
}

impl SourceTree {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Create a tree with the given files, each with placeholder content.
  pub fn with_files(files: &[&str]) -> Self {
    let tree = Self::new();
    for file in files {
      tree.write_file(file, "");
    }
    tree
  }

  /// Write a file relative to the tree root.
  pub fn write_file(&self, relative_path: &str, content: &str) {
    let path = self.temp.path().join(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  /// Make `link` a symlink to the directory `target`, both tree-relative.
  #[cfg(unix)]
  pub fn symlink_dir(&self, target: &str, link: &str) {
    let link_path = self.temp.path().join(link);
    if let Some(parent) = link_path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::os::unix::fs::symlink(self.temp.path().join(target), link_path).unwrap();
  }

  pub fn config(&self, allowlist: Allowlist) -> Config {
    let fs = OsFileSystem::new(self.temp.path()).unwrap();
    Config::new(Arc::new(fs)).with_allowlist(allowlist).with_parallelism(4)
  }
}

/// `filegroup`: one target listing the expanded `srcs`.
pub struct Filegroup;

impl Converter for Filegroup {
  fn convert(&self, ctx: &mut ConvertContext<'_>) -> Result<Vec<Target>, ModuleError> {
    let srcs = ctx.expand_srcs("srcs", "exclude_srcs")?;
    let module = ctx.module();
    Ok(vec![Target::new("filegroup", &module.name, module.package()).with_labels("srcs", &srcs)])
  }
}

/// `cc_library`: sources from a single package, headers exposed as `.hdrs`.
pub struct CcLibrary;

impl Converter for CcLibrary {
  fn convert(&self, ctx: &mut ConvertContext<'_>) -> Result<Vec<Target>, ModuleError> {
    let srcs = ctx.expand_srcs("srcs", "exclude_srcs")?;
    ctx.single_package("srcs", &srcs)?;
    let hdrs = ctx.expand_srcs("hdrs", "exclude_hdrs")?;
    let deps = ctx.expand_deps("deps")?;
    let module = ctx.module();

    let mut targets = vec![
      Target::new("cc_library", &module.name, module.package())
        .with_labels("srcs", &srcs)
        .with_labels("deps", &deps),
    ];
    if !hdrs.is_empty() {
      let name = format!("{}.hdrs", module.name);
      targets.push(Target::new("filegroup", name, module.package()).with_labels("srcs", &hdrs));
    }
    Ok(targets)
  }

  fn tagged_output(&self, tag: &str) -> bool {
    tag == ".hdrs"
  }
}

/// Output files reported by the external executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles(pub Vec<String>);

impl MixedBuilder for CcLibrary {
  fn enqueue(&self, ctx: &mut QueueContext<'_>) {
    ctx.queue(Request::OutputFiles);
  }

  fn consume(&self, ctx: &mut ConsumeContext<'_>) -> Result<(), ModuleError> {
    let answer = ctx.answer(Request::OutputFiles)?;
    let files = answer.split(',').map(str::to_string).collect();
    ctx.publish(OutputFiles(files));
    Ok(())
  }
}

pub fn registry() -> TypeRegistry {
  let cc = Arc::new(CcLibrary);
  let mut registry = TypeRegistry::new();
  registry
    .register("filegroup", Capability::Convertible(Arc::new(Filegroup)))
    .register(
      "cc_library",
      Capability::Mixed {
        converter: cc.clone(),
        mixed: cc,
      },
    )
    .register("genrule", Capability::Native);
  registry
}

/// Executor with canned answers per label; records every batch it sees.
#[derive(Default)]
pub struct CannedExecutor {
  pub answers: HashMap<String, String>,
  pub batches: Mutex<Vec<Vec<Query>>>,
}

impl CannedExecutor {
  pub fn answering(answers: &[(&str, &str)]) -> Self {
    Self {
      answers: answers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
      batches: Mutex::new(Vec::new()),
    }
  }
}

impl ExternalExecutor for CannedExecutor {
  fn answer(&self, queries: &[Query]) -> Result<HashMap<Query, String>, ExecutorError> {
    self.batches.lock().unwrap().push(queries.to_vec());
    Ok(
      queries
        .iter()
        .filter_map(|q| self.answers.get(&q.label).map(|a| (q.clone(), a.clone())))
        .collect(),
    )
  }
}
