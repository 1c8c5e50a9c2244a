//! Conversion decisions.
//!
//! Decides, per module, whether it is converted to the target build system.
//! The rules are applied in a fixed order and the first one that matches
//! decides:
//!
//! 1. In API-only mode, a module converts iff it contributes to an API surface.
//! 2. A module in the top-level directory that explicitly opts in converts.
//!    Unit tests load modules there, and this lets them exercise conversion
//!    without allowlist entries.
//! 3. Being allowlisted by name and by type at once is a conflict, as is being
//!    allowlisted by name and denylisted. Denylisted modules never convert.
//! 4. A true directory default (exact, or inherited from a recursive
//!    ancestor) converts the module unless it explicitly opts out. Being
//!    allowlisted by name inside such a directory is a conflict.
//! 5. Otherwise the module's explicit setting wins, falling back to whether
//!    it is allowlisted by name or type.
//!
//! A conflict is reported against the module and denies its conversion; it
//! never affects other modules.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{BuildMode, Config, DirDefault};
use crate::consts::TOP_LEVEL_DIR;
use crate::module::Module;

/// A module sits in two mutually exclusive allowlist buckets.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum AllowlistConflict {
  #[error("module '{module}' is allowlisted by name and its type '{module_type}' is allowlisted too")]
  NameAndType { module: String, module_type: String },

  #[error("module '{module}' is both allowlisted and denylisted by name")]
  NameAndDenylist { module: String },

  #[error("module '{module}' is allowlisted by name but directory '{dir}' already converts by default")]
  NameAndDirectory { module: String, dir: String },
}

/// Which rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
  /// The module type cannot be converted at all.
  NotConvertible,
  /// API-only mode, decided by API surface contribution.
  ApiSurface,
  /// Explicit opt-in in the top-level directory.
  TopLevelOptIn,
  /// Denied because of an allowlist conflict.
  Conflict,
  /// Denied by the denylist.
  Denylisted,
  /// Decided by a true directory default (possibly overridden by opt-out).
  DirectoryDefault,
  /// Decided by the module's explicit setting.
  Explicit,
  /// Decided by the name or type allowlist.
  Allowlisted,
  /// Nothing matched.
  Default,
}

/// The outcome of [`should_convert`] for one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
  pub convert: bool,
  pub reason: DecisionReason,

  /// The directory-default prefix that applied, or the module's own
  /// directory when no default matched. Unset for rules decided earlier.
  pub matched_prefix: Option<String>,

  pub diagnostics: Vec<AllowlistConflict>,
}

impl Decision {
  fn new(convert: bool, reason: DecisionReason) -> Self {
    Self {
      convert,
      reason,
      matched_prefix: None,
      diagnostics: Vec::new(),
    }
  }

  fn conflict(conflict: AllowlistConflict) -> Self {
    Self {
      convert: false,
      reason: DecisionReason::Conflict,
      matched_prefix: None,
      diagnostics: vec![conflict],
    }
  }

  fn with_prefix(mut self, prefix: String) -> Self {
    self.matched_prefix = Some(prefix);
    self
  }
}

/// Resolve the directory default that applies to `package`.
///
/// An exact entry decides outright; a non-recursive `True` only ever matches
/// exactly. Otherwise the deepest recursive ancestor entry wins. With no
/// match the result is false, scoped to `package` itself.
pub fn resolve_dir_default(package: &str, defaults: &BTreeMap<String, DirDefault>) -> (bool, String) {
  if let Some(value) = defaults.get(package) {
    return (value.is_true(), package.to_string());
  }

  // e.g. for x/y/z, look at x, x/y, then x/y/z; the deepest recursive entry wins
  let mut result = (false, package.to_string());
  let mut prefix = String::with_capacity(package.len());
  for part in package.split('/') {
    if !prefix.is_empty() {
      prefix.push('/');
    }
    prefix.push_str(part);
    match defaults.get(&prefix) {
      Some(DirDefault::TrueRecursively) => result = (true, prefix.clone()),
      Some(DirDefault::FalseRecursively) => result = (false, prefix.clone()),
      _ => {}
    }
  }
  result
}

/// Decide whether a module converts.
pub fn should_convert(module: &Module, config: &Config) -> Decision {
  let decision = decide(module, config);

  for conflict in &decision.diagnostics {
    warn!(module = %module.name, conflict = %conflict, "allowlist conflict");
  }
  debug!(
    module = %module.name,
    convert = decision.convert,
    reason = ?decision.reason,
    "conversion decision"
  );

  decision
}

fn decide(module: &Module, config: &Config) -> Decision {
  if !module.capability.is_convertible() {
    return Decision::new(false, DecisionReason::NotConvertible);
  }

  if config.mode == BuildMode::ApiBp2build {
    return Decision::new(module.bazel.api_surface, DecisionReason::ApiSurface);
  }

  let explicit = module.bazel.bp2build_available;
  if module.dir == TOP_LEVEL_DIR && explicit == Some(true) {
    return Decision::new(true, DecisionReason::TopLevelOptIn);
  }

  let allowlist = &config.allowlist;
  let by_name = allowlist.module_always_convert.contains(&module.name);
  let by_type = allowlist.module_type_always_convert.contains(&module.module_type);

  if by_name && by_type {
    return Decision::conflict(AllowlistConflict::NameAndType {
      module: module.name.clone(),
      module_type: module.module_type.clone(),
    });
  }

  if allowlist.module_do_not_convert.contains(&module.name) {
    if by_name {
      return Decision::conflict(AllowlistConflict::NameAndDenylist {
        module: module.name.clone(),
      });
    }
    return Decision::new(false, DecisionReason::Denylisted);
  }

  let (dir_default, prefix) = resolve_dir_default(&module.dir, &allowlist.dir_defaults);
  if dir_default {
    if by_name {
      return Decision::conflict(AllowlistConflict::NameAndDirectory {
        module: module.name.clone(),
        dir: prefix.clone(),
      })
      .with_prefix(prefix);
    }
    // Modules may still opt out explicitly
    return Decision::new(explicit.unwrap_or(true), DecisionReason::DirectoryDefault).with_prefix(prefix);
  }

  let (convert, reason) = match explicit {
    Some(value) => (value, DecisionReason::Explicit),
    None if by_name || by_type => (true, DecisionReason::Allowlisted),
    None => (false, DecisionReason::Default),
  };
  Decision::new(convert, reason).with_prefix(prefix)
}
