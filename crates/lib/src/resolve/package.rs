//! Package-boundary resolution.
//!
//! The declarative system lets source lists reach freely into subdirectories,
//! while the target system requires every file to be addressed through the
//! package that owns it. This module rewrites a module-relative path into the
//! target-system address of the package that actually owns the file.
//!
//! # Example
//!
//! For a module in `x` listing `y/a.c` and `z/b.c`:
//!
//! ```text
//! x
//! ├── Android.bp
//! ├── y
//! │   ├── a.c
//! │   └── Android.bp
//! └── z
//!     └── b.c
//! ```
//!
//! `y/a.c` resolves to `//x/y:a.c` because `x/y` is its own package, while
//! `z/b.c` stays `z/b.c`, inside the module's own package.

use tracing::trace;

use crate::config::Allowlist;
use crate::consts::{NATIVE_BUILD_FILE, TARGET_BUILD_FILES, TOP_LEVEL_DIR};
use crate::fs::{FileSystem, clean, join};
use crate::label::{Label, LabelList};

/// Resolves paths against package boundaries of a source tree.
///
/// Boundaries are probed on every call; nothing is cached.
#[derive(Clone, Copy)]
pub struct PackageResolver<'a> {
  fs: &'a dyn FileSystem,
  allowlist: &'a Allowlist,
}

impl<'a> PackageResolver<'a> {
  pub fn new(fs: &'a dyn FileSystem, allowlist: &'a Allowlist) -> Self {
    Self { fs, allowlist }
  }

  /// Whether `dir` is owned by its own package.
  ///
  /// A directory is a package if it has a native build file, or if it keeps
  /// a hand-authored target build file (by allowlist or because it is a
  /// symlink into another tree) and that file exists.
  pub fn is_package_boundary(&self, dir: &str) -> bool {
    if self.fs.exists(&join(dir, NATIVE_BUILD_FILE)) {
      return true;
    }
    if self.allowlist.keeps_existing_build_file(dir) || self.fs.is_symlink(dir) {
      return TARGET_BUILD_FILES.iter().any(|file| self.fs.exists(&join(dir, file)));
    }
    false
  }

  /// Resolve a module-relative path into a label.
  ///
  /// The original spelling of the result is `path` itself.
  pub fn resolve(&self, base_dir: &str, path: &str) -> Label {
    Label::with_original(self.resolve_address(base_dir, path), path)
  }

  /// Resolve a label's address, keeping its original spelling.
  pub fn resolve_label(&self, base_dir: &str, label: &Label) -> Label {
    Label::with_original(self.resolve_address(base_dir, &label.address), label.original.clone())
  }

  /// Resolve every include and exclude of a list.
  pub fn resolve_list(&self, base_dir: &str, list: &LabelList) -> LabelList {
    LabelList {
      includes: list.includes.iter().map(|l| self.resolve_label(base_dir, l)).collect(),
      excludes: list.excludes.iter().map(|l| self.resolve_label(base_dir, l)).collect(),
    }
  }

  /// Resolve a root-relative path to the package that owns it.
  ///
  /// The owner is the deepest ancestor directory that is a package boundary,
  /// or the top-level package if there is none. The result is always absolute.
  pub fn resolve_from_root(&self, path: &str) -> Label {
    let cleaned = clean(path);
    let mut end = cleaned.len();
    while let Some(idx) = cleaned[..end].rfind('/') {
      let dir = &cleaned[..idx];
      if self.is_package_boundary(dir) {
        trace!(path, boundary = dir, "found owning package");
        return Label::with_original(format!("//{}:{}", dir, &cleaned[idx + 1..]), path);
      }
      end = idx;
    }
    Label::with_original(format!("//:{}", cleaned), path)
  }

  fn resolve_address(&self, base_dir: &str, address: &str) -> String {
    // Already a label: absolute, or relative to the module's own package
    if address.starts_with("//") || address.starts_with(':') {
      return address.to_string();
    }

    // Dropping "." components keeps "./y/a.c" from turning into "//x/.:y/a.c"
    let components: Vec<&str> = address.split('/').filter(|c| !c.is_empty() && *c != ".").collect();
    if components.is_empty() {
      return address.to_string();
    }

    // Check the deepest subdirectory first and work upwards
    let mut resolved = String::new();
    let mut found = false;
    for i in (0..components.len()).rev() {
      let sep = if !found && self.is_package_boundary(&join(base_dir, &components[..=i].join("/"))) {
        trace!(base_dir, address, boundary = %components[..=i].join("/"), "found package boundary");
        found = true;
        ":"
      } else {
        "/"
      };
      resolved = if resolved.is_empty() {
        components[i].to_string()
      } else {
        format!("{}{}{}", components[i], sep, resolved)
      };
    }

    if !found {
      return resolved;
    }

    let package = if base_dir == TOP_LEVEL_DIR {
      ""
    } else {
      base_dir.strip_prefix("./").unwrap_or(base_dir)
    };
    if package.is_empty() {
      format!("//{}", resolved)
    } else {
      format!("//{}/{}", package, resolved)
    }
  }
}
