//! In-memory filesystem for hosts that already hold the source tree listing.

use std::collections::BTreeSet;

use super::{FileSystem, FsError, clean, compile, match_options};
use crate::consts::TOP_LEVEL_DIR;

/// A [`FileSystem`] over a fixed set of files and symlinked directories.
///
/// Directories exist implicitly as ancestors of the listed files.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
  files: BTreeSet<String>,
  symlinks: BTreeSet<String>,
}

impl MemoryFileSystem {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a filesystem containing the given root-relative files.
  pub fn with_files<I, S>(files: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut fs = Self::new();
    for file in files {
      fs.add_file(file.as_ref());
    }
    fs
  }

  pub fn add_file(&mut self, path: &str) -> &mut Self {
    self.files.insert(clean(path));
    self
  }

  /// Mark a directory as a symbolic link.
  pub fn add_symlink(&mut self, path: &str) -> &mut Self {
    self.symlinks.insert(clean(path));
    self
  }

  fn is_dir(&self, path: &str) -> bool {
    if path == TOP_LEVEL_DIR {
      return true;
    }
    let prefix = format!("{}/", path);
    self.files.iter().any(|f| f.starts_with(&prefix)) || self.symlinks.contains(path)
  }
}

impl FileSystem for MemoryFileSystem {
  fn exists(&self, path: &str) -> bool {
    let path = clean(path);
    self.files.contains(&path) || self.is_dir(&path)
  }

  fn is_symlink(&self, path: &str) -> bool {
    self.symlinks.contains(&clean(path))
  }

  fn glob(&self, pattern: &str, excludes: &[String]) -> Result<Vec<String>, FsError> {
    let matcher = compile(pattern)?;
    let excluders = excludes.iter().map(|e| compile(e)).collect::<Result<Vec<_>, _>>()?;
    let options = match_options();

    // BTreeSet iteration is already sorted.
    Ok(
      self
        .files
        .iter()
        .filter(|f| matcher.matches_with(f, options))
        .filter(|f| !excluders.iter().any(|x| x.matches_with(f, options)))
        .cloned()
        .collect(),
    )
  }
}
