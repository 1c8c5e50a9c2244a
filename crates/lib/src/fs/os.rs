//! Filesystem backed by a real source tree on disk.

use std::path::{Path, PathBuf};

use tracing::trace;
use walkdir::WalkDir;

use super::{FileSystem, FsError, compile, literal_prefix, match_options};
use crate::consts::TOP_LEVEL_DIR;

/// A [`FileSystem`] rooted at a source directory on disk.
#[derive(Debug, Clone)]
pub struct OsFileSystem {
  root: PathBuf,
}

impl OsFileSystem {
  /// Open a source tree. The root is canonicalized once up front.
  pub fn new(root: impl AsRef<Path>) -> Result<Self, FsError> {
    let root = root.as_ref();
    let root = dunce::canonicalize(root).map_err(|source| FsError::Root {
      path: root.display().to_string(),
      source,
    })?;
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn host_path(&self, path: &str) -> PathBuf {
    if path.is_empty() || path == TOP_LEVEL_DIR {
      return self.root.clone();
    }
    path.split('/').fold(self.root.clone(), |acc, c| acc.join(c))
  }

  fn tree_path(&self, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(&self.root).ok()?;
    let parts: Vec<String> = rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    Some(parts.join("/"))
  }
}

impl FileSystem for OsFileSystem {
  fn exists(&self, path: &str) -> bool {
    self.host_path(path).exists()
  }

  fn is_symlink(&self, path: &str) -> bool {
    self.host_path(path).is_symlink()
  }

  fn glob(&self, pattern: &str, excludes: &[String]) -> Result<Vec<String>, FsError> {
    let matcher = compile(pattern)?;
    let excluders = excludes.iter().map(|e| compile(e)).collect::<Result<Vec<_>, _>>()?;
    let options = match_options();

    let walk_root = self.host_path(&literal_prefix(pattern));
    if !walk_root.is_dir() {
      return Ok(Vec::new());
    }

    let mut matches = Vec::new();
    for entry in WalkDir::new(&walk_root).follow_links(true).sort_by_file_name() {
      let entry = entry.map_err(|e| FsError::Walk {
        path: walk_root.display().to_string(),
        message: e.to_string(),
      })?;
      if entry.file_type().is_dir() {
        continue;
      }
      let Some(rel) = self.tree_path(entry.path()) else {
        continue;
      };
      if matcher.matches_with(&rel, options) && !excluders.iter().any(|x| x.matches_with(&rel, options)) {
        trace!(pattern, path = %rel, "glob match");
        matches.push(rel);
      }
    }

    matches.sort();
    Ok(matches)
  }
}
