//! Conversion allowlist tables.
//!
//! The allowlist is built once at startup and shared read-only by every phase.
//! It answers three questions: which directories convert by default, which
//! modules and module types are forced in or out, and which directories keep
//! their hand-authored target build file.
//!
//! # JSON Form
//!
//! ```json
//! {
//!   "dir_defaults": { "external/zlib": "true_recursively", "external/zlib/tests": "false" },
//!   "module_always_convert": ["libfoo"],
//!   "module_type_always_convert": ["filegroup"],
//!   "module_do_not_convert": ["libbar"],
//!   "keep_existing_build_file": { "build/bazel": true },
//!   "mixed_build_modules": ["libfoo"]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Default conversion setting for the modules of a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirDefault {
  /// Convert modules in exactly this directory.
  True,
  /// Convert modules in this directory and all descendants.
  TrueRecursively,
  /// Do not convert modules in this directory.
  False,
  /// Do not convert modules in this directory or its descendants.
  FalseRecursively,
}

impl DirDefault {
  pub fn is_true(self) -> bool {
    matches!(self, DirDefault::True | DirDefault::TrueRecursively)
  }
}

/// The combined conversion allowlist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Allowlist {
  /// Per-directory defaults. Absent directories are unset.
  pub dir_defaults: BTreeMap<String, DirDefault>,

  /// Module names that always convert.
  pub module_always_convert: BTreeSet<String>,

  /// Module types whose modules always convert.
  pub module_type_always_convert: BTreeSet<String>,

  /// Module names that never convert.
  pub module_do_not_convert: BTreeSet<String>,

  /// Directories whose hand-authored target build file is kept.
  /// The value says whether the entry also covers descendants.
  pub keep_existing_build_file: BTreeMap<String, bool>,

  /// Module names allowed to run on the external executor in a mixed build.
  pub mixed_build_modules: BTreeSet<String>,
}

impl Allowlist {
  pub fn new() -> Self {
    Self::default()
  }

  /// Parse an allowlist from its JSON form.
  pub fn from_json(json: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn set_dir_default(mut self, dir: impl Into<String>, value: DirDefault) -> Self {
    self.dir_defaults.insert(dir.into(), value);
    self
  }

  pub fn always_convert(mut self, module: impl Into<String>) -> Self {
    self.module_always_convert.insert(module.into());
    self
  }

  pub fn always_convert_type(mut self, module_type: impl Into<String>) -> Self {
    self.module_type_always_convert.insert(module_type.into());
    self
  }

  pub fn do_not_convert(mut self, module: impl Into<String>) -> Self {
    self.module_do_not_convert.insert(module.into());
    self
  }

  pub fn keep_existing_build_file(mut self, dir: impl Into<String>, recursive: bool) -> Self {
    self.keep_existing_build_file.insert(dir.into(), recursive);
    self
  }

  pub fn allow_mixed_build(mut self, module: impl Into<String>) -> Self {
    self.mixed_build_modules.insert(module.into());
    self
  }

  /// Whether the hand-authored build file in `dir` is kept.
  ///
  /// An exact entry matches regardless of its recursive flag; an ancestor
  /// entry matches only when marked recursive.
  pub fn keeps_existing_build_file(&self, dir: &str) -> bool {
    if self.keep_existing_build_file.contains_key(dir) {
      return true;
    }
    dir
      .match_indices('/')
      .any(|(idx, _)| self.keep_existing_build_file.get(&dir[..idx]).copied().unwrap_or(false))
  }
}
