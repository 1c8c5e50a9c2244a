//! Build configuration.
//!
//! A [`Config`] is constructed once per build and passed by reference into
//! every phase. Nothing in it changes after construction, so concurrent readers
//! need no synchronization.

mod allowlist;

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use allowlist::{Allowlist, DirDefault};

use crate::fs::{FileSystem, MemoryFileSystem};

/// Errors that can occur while building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The JSON form of a table is malformed.
  #[error("invalid configuration: {0}")]
  Json(#[from] serde_json::Error),
}

/// What the conversion run produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
  /// Convert every allowlisted module.
  #[default]
  Bp2build,
  /// Convert only modules that contribute to an API surface.
  ApiBp2build,
}

/// The target platform axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Platform {
  pub os: String,
  pub arch: String,
}

impl Platform {
  pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
    Self {
      os: os.into(),
      arch: arch.into(),
    }
  }
}

impl Default for Platform {
  fn default() -> Self {
    Self::new("linux", "x86_64")
  }
}

impl std::fmt::Display for Platform {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}_{}", self.os, self.arch)
  }
}

/// Module references that never become dependency edges.
///
/// Some modules reference variants of themselves, which in a graph without
/// variants would be a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeExemptions {
  /// Modules whose references never create edges.
  pub from: BTreeSet<String>,

  /// Modules that never receive edges from references.
  pub to: BTreeSet<String>,
}

impl EdgeExemptions {
  /// Whether a reference from `from` to `to` is exempt from edge creation.
  ///
  /// A module referencing itself is always exempt.
  pub fn is_exempt(&self, from: &str, to: &str) -> bool {
    from == to || self.from.contains(from) || self.to.contains(to)
  }
}

/// Configuration for a conversion run.
#[derive(Clone)]
pub struct Config {
  /// The conversion allowlist, shared read-only.
  pub allowlist: Arc<Allowlist>,

  /// Target platform of the build.
  pub platform: Platform,

  /// Conversion mode.
  pub mode: BuildMode,

  /// Record unresolvable references instead of failing the module.
  pub allow_missing_dependencies: bool,

  /// Whether mixed execution is turned on for this build.
  pub mixed_builds: bool,

  /// References exempt from edge creation.
  pub edge_exemptions: EdgeExemptions,

  /// Maximum number of modules processed in parallel within a phase.
  pub parallelism: usize,

  /// Source tree the build reads from.
  pub fs: Arc<dyn FileSystem>,
}

impl Config {
  /// Create a configuration with defaults over the given source tree.
  pub fn new(fs: Arc<dyn FileSystem>) -> Self {
    Self {
      allowlist: Arc::new(Allowlist::default()),
      platform: Platform::default(),
      mode: BuildMode::default(),
      allow_missing_dependencies: false,
      mixed_builds: false,
      edge_exemptions: EdgeExemptions::default(),
      parallelism: num_cpus(),
      fs,
    }
  }

  pub fn with_allowlist(mut self, allowlist: Allowlist) -> Self {
    self.allowlist = Arc::new(allowlist);
    self
  }

  pub fn with_platform(mut self, platform: Platform) -> Self {
    self.platform = platform;
    self
  }

  pub fn with_mode(mut self, mode: BuildMode) -> Self {
    self.mode = mode;
    self
  }

  pub fn with_allow_missing_dependencies(mut self, allow: bool) -> Self {
    self.allow_missing_dependencies = allow;
    self
  }

  pub fn with_mixed_builds(mut self, enabled: bool) -> Self {
    self.mixed_builds = enabled;
    self
  }

  pub fn with_edge_exemptions(mut self, exemptions: EdgeExemptions) -> Self {
    self.edge_exemptions = exemptions;
    self
  }

  pub fn with_parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism.max(1);
    self
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new(Arc::new(MemoryFileSystem::new()))
  }
}

impl std::fmt::Debug for Config {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Config")
      .field("allowlist", &self.allowlist)
      .field("platform", &self.platform)
      .field("mode", &self.mode)
      .field("allow_missing_dependencies", &self.allow_missing_dependencies)
      .field("mixed_builds", &self.mixed_builds)
      .field("edge_exemptions", &self.edge_exemptions)
      .field("parallelism", &self.parallelism)
      .finish_non_exhaustive()
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
