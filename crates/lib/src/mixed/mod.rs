//! Mixed-execution bridge.
//!
//! In a mixed build some modules keep their native build actions while
//! others are built by the external executor and only their results are
//! consumed natively. For each eligible module:
//!
//! 1. [`mixed_build_status`] decides whether the module runs externally
//! 2. its [`MixedBuilder::enqueue`] queues queries about its target
//! 3. all queries of the build are answered in one batch by an
//!    [`ExternalExecutor`]
//! 4. [`MixedBuilder::consume`] reads the answers and publishes providers

mod types;

use std::any::Any;
use std::collections::HashMap;

use tracing::debug;

pub use types::*;

use crate::config::Config;
use crate::consts::MIXED_BUILD_EXCLUDED_OS;
use crate::graph::{ModuleError, PendingProvider};
use crate::label::Label;
use crate::module::Module;

/// Mixed-build capability of a module type.
pub trait MixedBuilder: Send + Sync {
  /// Whether this module can run externally at all. Types use this to opt
  /// out per module, e.g. for unsupported properties.
  fn supported(&self, _ctx: &MixedContext<'_>) -> bool {
    true
  }

  /// Queue the queries the module needs answered.
  fn enqueue(&self, ctx: &mut QueueContext<'_>);

  /// Read the answers and publish what dependents need.
  fn consume(&self, ctx: &mut ConsumeContext<'_>) -> Result<(), ModuleError>;
}

/// Answers queries about external targets, in one batch per build.
pub trait ExternalExecutor: Send + Sync {
  /// Answer `queries`. Queries missing from the result are unanswered.
  fn answer(&self, queries: &[Query]) -> Result<HashMap<Query, String>, ExecutorError>;
}

/// Executor for builds without an external executor.
///
/// Fails if asked anything, so a build that enables mixed execution without
/// providing an executor aborts instead of silently building natively.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExecutor;

impl ExternalExecutor for NoExecutor {
  fn answer(&self, queries: &[Query]) -> Result<HashMap<Query, String>, ExecutorError> {
    if queries.is_empty() {
      return Ok(HashMap::new());
    }
    Err(ExecutorError::Unavailable { count: queries.len() })
  }
}

/// Module and build configuration, for [`MixedBuilder::supported`].
pub struct MixedContext<'a> {
  pub module: &'a Module,
  pub config: &'a Config,
}

/// Collects the queries of one module.
pub struct QueueContext<'a> {
  pub module: &'a Module,
  pub label: Label,
  config: ConfigKey,
  queries: Vec<Query>,
}

impl<'a> QueueContext<'a> {
  pub fn new(module: &'a Module, label: Label, config: &Config) -> Self {
    Self {
      module,
      label,
      config: ConfigKey::from(&config.platform),
      queries: Vec::new(),
    }
  }

  /// Queue a request about the module's own target.
  pub fn queue(&mut self, request: Request) {
    let label = self.label.address.clone();
    self.queue_for(label, request);
  }

  /// Queue a request about another target, e.g. one the module depends on.
  pub fn queue_for(&mut self, label: impl Into<String>, request: Request) {
    let query = Query {
      label: label.into(),
      config: self.config.clone(),
      request,
    };
    if !self.queries.contains(&query) {
      self.queries.push(query);
    }
  }

  pub fn into_queries(self) -> Vec<Query> {
    self.queries
  }
}

/// Gives a module its answers and collects the providers it publishes.
pub struct ConsumeContext<'a> {
  pub module: &'a Module,
  pub label: Label,
  config: ConfigKey,
  answers: &'a HashMap<Query, String>,
  providers: Vec<PendingProvider>,
}

impl<'a> ConsumeContext<'a> {
  pub fn new(module: &'a Module, label: Label, config: &Config, answers: &'a HashMap<Query, String>) -> Self {
    Self {
      module,
      label,
      config: ConfigKey::from(&config.platform),
      answers,
      providers: Vec::new(),
    }
  }

  /// The answer to a request about the module's own target.
  pub fn answer(&self, request: Request) -> Result<&'a str, ModuleError> {
    self.answer_for(&self.label.address, request)
  }

  /// The answer to a request about another target.
  ///
  /// # Errors
  ///
  /// Returns `MixedBuild` if the query wasn't queued or wasn't answered.
  pub fn answer_for(&self, label: &str, request: Request) -> Result<&'a str, ModuleError> {
    let query = Query {
      label: label.to_string(),
      config: self.config.clone(),
      request,
    };
    self
      .answers
      .get(&query)
      .map(String::as_str)
      .ok_or_else(|| ModuleError::MixedBuild(format!("no answer for {}", query)))
  }

  pub fn publish<T: Any + Send + Sync>(&mut self, value: T) {
    self.providers.push(PendingProvider::new(value));
  }

  pub fn into_providers(self) -> Vec<PendingProvider> {
    self.providers
  }
}

/// Decide whether a module runs on the external executor.
///
/// `converted` is the module's conversion decision. Modules with a
/// hand-authored label qualify regardless of it.
pub fn mixed_build_status(
  module: &Module,
  builder: Option<&dyn MixedBuilder>,
  converted: bool,
  config: &Config,
) -> MixedBuildStatus {
  if !config.mixed_builds || config.platform.os == MIXED_BUILD_EXCLUDED_OS {
    return MixedBuildStatus::Disabled;
  }

  let incompatible = |reason: &str| {
    debug!(module = %module.name, reason, "mixed build incompatible");
    MixedBuildStatus::Incompatible(reason.to_string())
  };

  let Some(builder) = builder else {
    return incompatible("module type has no mixed build support");
  };
  if !module.enabled {
    return incompatible("module is disabled");
  }
  if !converted && module.bazel.label.is_none() {
    return incompatible("module is not converted");
  }
  if !builder.supported(&MixedContext { module, config }) {
    return incompatible("module opted out");
  }
  if !config.allowlist.mixed_build_modules.contains(&module.name) {
    return incompatible("module is not allowlisted for mixed builds");
  }

  MixedBuildStatus::Enabled
}
