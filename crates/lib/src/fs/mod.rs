//! Source-tree filesystem queries.
//!
//! The resolver and expander never touch the disk directly; they go through a
//! [`FileSystem`] scoped to the build configuration. All paths are relative to
//! the root of the source tree and use `/` as separator regardless of host.

mod memory;
mod os;

use thiserror::Error;

pub use memory::MemoryFileSystem;
pub use os::OsFileSystem;

use crate::consts::{GLOB_CHARS, TOP_LEVEL_DIR};

/// Errors raised by filesystem queries.
#[derive(Debug, Error)]
pub enum FsError {
  /// The glob pattern is malformed.
  #[error("invalid glob pattern '{pattern}': {message}")]
  Pattern { pattern: String, message: String },

  /// Walking the source tree failed.
  #[error("failed to walk '{path}': {message}")]
  Walk { path: String, message: String },

  /// The source root could not be opened.
  #[error("invalid source root '{path}': {source}")]
  Root {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// Filesystem primitives the core needs from its host.
pub trait FileSystem: Send + Sync {
  /// Whether a file or directory exists at the root-relative path.
  fn exists(&self, path: &str) -> bool;

  /// Whether the root-relative path is a symbolic link.
  fn is_symlink(&self, path: &str) -> bool;

  /// Expand a root-relative glob pattern into root-relative file paths.
  ///
  /// Files matching any of the root-relative `excludes` patterns are dropped.
  /// The result is sorted.
  fn glob(&self, pattern: &str, excludes: &[String]) -> Result<Vec<String>, FsError>;
}

/// Whether a source entry is a glob pattern rather than a literal path.
pub fn is_glob(path: &str) -> bool {
  path.contains(GLOB_CHARS)
}

/// Lexically normalize a `/`-separated relative path.
///
/// Drops `.` components and folds `..` into its parent. A path that cleans to
/// nothing becomes the top-level directory.
pub fn clean(path: &str) -> String {
  let mut parts: Vec<&str> = Vec::new();
  for component in path.split('/') {
    match component {
      "" | "." => {}
      ".." => {
        parts.pop();
      }
      other => parts.push(other),
    }
  }
  if parts.is_empty() {
    TOP_LEVEL_DIR.to_string()
  } else {
    parts.join("/")
  }
}

/// Join a module directory and a module-relative path into a root-relative one.
pub fn join(dir: &str, path: &str) -> String {
  if dir.is_empty() || dir == TOP_LEVEL_DIR {
    clean(path)
  } else {
    clean(&format!("{}/{}", dir, path))
  }
}

/// Whether a root-relative path lies inside `dir`.
pub fn is_within(dir: &str, path: &str) -> bool {
  if dir.is_empty() || dir == TOP_LEVEL_DIR {
    return true;
  }
  path.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
}

/// Strip a module directory from a root-relative path.
///
/// Returns the path unchanged if it is not below `dir`; check [`is_within`]
/// before treating the result as module-relative.
pub fn relative_to(dir: &str, path: &str) -> String {
  if dir.is_empty() || dir == TOP_LEVEL_DIR {
    return path.to_string();
  }
  match path.strip_prefix(dir).and_then(|rest| rest.strip_prefix('/')) {
    Some(rest) => rest.to_string(),
    None => path.to_string(),
  }
}

/// The longest leading run of literal components of a glob pattern.
///
/// Used as the walk root so a glob in a deep directory doesn't scan the whole
/// tree.
pub(crate) fn literal_prefix(pattern: &str) -> String {
  let literal: Vec<&str> = pattern.split('/').take_while(|c| !is_glob(c)).collect();
  // The last component is a file name unless the pattern continues past it.
  let depth = if literal.len() == pattern.split('/').count() {
    literal.len().saturating_sub(1)
  } else {
    literal.len()
  };
  literal[..depth].join("/")
}

pub(crate) fn compile(pattern: &str) -> Result<glob::Pattern, FsError> {
  glob::Pattern::new(pattern).map_err(|e| FsError::Pattern {
    pattern: pattern.to_string(),
    message: e.to_string(),
  })
}

pub(crate) fn match_options() -> glob::MatchOptions {
  glob::MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
  }
}
