//! Mixed-build queries, answers and status.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Platform;

/// Kind of information requested from the external executor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
  /// The files a target produces.
  OutputFiles,
  /// Compilation info of a native library target.
  CcInfo,
  /// The executable of a binary target.
  Binary,
  /// A request understood by a specific builder.
  Custom(String),
}

impl std::fmt::Display for Request {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Request::OutputFiles => write!(f, "output_files"),
      Request::CcInfo => write!(f, "cc_info"),
      Request::Binary => write!(f, "binary"),
      Request::Custom(name) => write!(f, "{}", name),
    }
  }
}

/// Configuration axis a query is evaluated under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigKey {
  pub os: String,
  pub arch: String,
}

impl From<&Platform> for ConfigKey {
  fn from(platform: &Platform) -> Self {
    Self {
      os: platform.os.clone(),
      arch: platform.arch.clone(),
    }
  }
}

/// One question for the external executor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Query {
  pub label: String,
  pub config: ConfigKey,
  pub request: Request,
}

impl std::fmt::Display for Query {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}({}) for {}_{}", self.request, self.label, self.config.os, self.config.arch)
  }
}

/// Whether a module's native actions are replaced by the external executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MixedBuildStatus {
  /// The module runs on the external executor.
  Enabled,
  /// Mixed execution is off for this build or platform.
  Disabled,
  /// The module can't run on the external executor.
  Incompatible(String),
}

impl MixedBuildStatus {
  pub fn is_enabled(&self) -> bool {
    matches!(self, MixedBuildStatus::Enabled)
  }
}

/// Queries a module queued during the mixed-build queue phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueuedQueries(pub Vec<Query>);

/// Answers to a module's queued queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalAnswers(pub HashMap<Query, String>);

/// Errors from the external executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
  /// The executor ran but could not answer.
  #[error("executor failed: {message}")]
  Failed { message: String },

  /// No executor is available to answer queries.
  #[error("no external executor available for {count} queries")]
  Unavailable { count: usize },

  #[error("executor I/O error: {0}")]
  Io(#[from] std::io::Error),
}
