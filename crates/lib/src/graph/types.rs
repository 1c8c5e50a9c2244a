//! Graph identifiers, edge tags and error types.

use thiserror::Error;

use crate::fs::FsError;
use crate::mixed::ExecutorError;

/// Index of a module in its [`ModuleGraph`](super::ModuleGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub usize);

impl std::fmt::Display for ModuleId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Semantic role of a dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DepTag {
  /// An ordinary build dependency.
  Ordinary,
  /// The dependent consumes an output of the dependency, optionally a tagged one.
  OutputOf(String),
  /// The dependency is a license declaration.
  License,
  /// Bookkeeping edge recorded while converting, to surface unconverted or
  /// missing dependencies. Never a real build dependency.
  ConversionOnly,
}

impl DepTag {
  /// Whether the edge orders phases. Conversion-only edges are bookkeeping
  /// and never constrain waves.
  pub fn orders(&self) -> bool {
    !matches!(self, DepTag::ConversionOnly)
  }
}

impl std::fmt::Display for DepTag {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      DepTag::Ordinary => write!(f, "dep"),
      DepTag::OutputOf(tag) if tag.is_empty() => write!(f, "output"),
      DepTag::OutputOf(tag) => write!(f, "output{{{}}}", tag),
      DepTag::License => write!(f, "license"),
      DepTag::ConversionOnly => write!(f, "bp2build"),
    }
  }
}

/// Errors attributed to a single module.
///
/// These never stop sibling modules; the scheduler records them against the
/// module and skips its dependents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
  /// A module reference could not be parsed.
  #[error("malformed module reference '{reference}': {reason}")]
  MalformedReference { reference: String, reason: String },

  /// Referenced modules do not exist and missing dependencies are not allowed.
  #[error("missing dependencies: {}", names.join(", "))]
  MissingDependencies { names: Vec<String> },

  /// Sources resolved into more than one package where only one is supported.
  #[error("{attribute} spans multiple packages: {}", packages.join(", "))]
  CrossPackage { attribute: String, packages: Vec<String> },

  /// A filesystem query failed.
  #[error("filesystem error: {message}")]
  Fs { message: String },

  /// The module's conversion routine rejected its input.
  #[error("conversion failed: {0}")]
  Conversion(String),

  /// The mixed-execution bridge rejected the module's query or answer.
  #[error("mixed build error: {0}")]
  MixedBuild(String),

  /// A dependency failed earlier, so this module was skipped.
  #[error("dependency '{dependency}' failed")]
  DependencyFailed { dependency: String },
}

impl From<FsError> for ModuleError {
  fn from(e: FsError) -> Self {
    ModuleError::Fs { message: e.to_string() }
  }
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum GraphError {
  /// Two modules share a name in one namespace.
  #[error("duplicate module '{name}' in namespace '{namespace}'")]
  DuplicateModule { name: String, namespace: String },

  /// A module's declared type is not registered.
  #[error("module '{module}' has unknown type '{module_type}'")]
  UnknownModuleType { module: String, module_type: String },

  /// The dependency edges form a cycle, so an ordered phase cannot run.
  #[error("dependency cycle detected during phase '{phase}'")]
  CycleDetected { phase: String },

  /// The external executor could not answer the queued queries.
  #[error("external executor failed: {0}")]
  Executor(#[from] ExecutorError),

  /// The worker pool could not be created.
  #[error("failed to start worker pool: {0}")]
  WorkerPool(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dep_tag_display() {
    assert_eq!(DepTag::Ordinary.to_string(), "dep");
    assert_eq!(DepTag::OutputOf(String::new()).to_string(), "output");
    assert_eq!(DepTag::OutputOf(".gen".to_string()).to_string(), "output{.gen}");
    assert_eq!(DepTag::ConversionOnly.to_string(), "bp2build");
  }

  #[test]
  fn only_conversion_edges_skip_ordering() {
    assert!(DepTag::Ordinary.orders());
    assert!(DepTag::OutputOf(String::new()).orders());
    assert!(DepTag::License.orders());
    assert!(!DepTag::ConversionOnly.orders());
  }

  #[test]
  fn module_error_messages() {
    let missing = ModuleError::MissingDependencies {
      names: vec!["a".to_string(), "b".to_string()],
    };
    assert_eq!(missing.to_string(), "missing dependencies: a, b");

    let cross = ModuleError::CrossPackage {
      attribute: "srcs".to_string(),
      packages: vec!["x".to_string(), "y".to_string()],
    };
    assert_eq!(cross.to_string(), "srcs spans multiple packages: x, y");
  }
}
