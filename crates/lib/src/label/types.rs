//! Label and label list types.
//!
//! # Address forms
//!
//! - `//pkg/dir:target` - absolute, rooted at the top of the source tree
//! - `//:target` - absolute, in the top-level package
//! - `:target` - relative to the package of the referencing module
//! - `dir/file.c` - a path that stayed inside the referencing module's package
//!
//! # Identity
//!
//! Two labels are the same label iff their addresses are equal. The original
//! spelling is bookkeeping: it is kept so that occurrences of the source-level
//! reference can be substituted verbatim later, without re-deriving them.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A reference to a target-system coordinate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
  /// The target-system address, absolute (`//`) or package-relative.
  pub address: String,

  /// The spelling in the declarative source that resolved to this label.
  pub original: String,
}

impl Label {
  /// Create a label whose original spelling is its address.
  pub fn new(address: impl Into<String>) -> Self {
    let address = address.into();
    Self {
      original: address.clone(),
      address,
    }
  }

  /// Create a label that remembers the source spelling it came from.
  pub fn with_original(address: impl Into<String>, original: impl Into<String>) -> Self {
    Self {
      address: address.into(),
      original: original.into(),
    }
  }

  /// Whether the address is rooted at the top of the source tree.
  pub fn is_absolute(&self) -> bool {
    self.address.starts_with("//")
  }

  /// The package portion of an absolute address, `None` for relative ones.
  ///
  /// `//a/b:c` yields `a/b`, `//:c` yields the empty string and `//a/b`
  /// (a package's default target) yields `a/b`.
  pub fn package(&self) -> Option<&str> {
    let rest = self.address.strip_prefix("//")?;
    Some(match rest.find(':') {
      Some(idx) => &rest[..idx],
      None => rest,
    })
  }

  /// The target name, i.e. everything after the last `:`.
  pub fn target_name(&self) -> &str {
    match self.address.rfind(':') {
      Some(idx) => &self.address[idx + 1..],
      None => self.address.rsplit('/').next().unwrap_or(&self.address),
    }
  }
}

impl PartialEq for Label {
  fn eq(&self, other: &Self) -> bool {
    self.address == other.address
  }
}

impl Eq for Label {}

impl Hash for Label {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.address.hash(state);
  }
}

impl PartialOrd for Label {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Label {
  fn cmp(&self, other: &Self) -> Ordering {
    self.address.cmp(&other.address)
  }
}

impl std::fmt::Display for Label {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.address)
  }
}

/// An ordered set of included labels plus a separate set of excluded labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelList {
  /// Included labels, in declaration order.
  pub includes: Vec<Label>,

  /// Excluded labels. Matched against includes by address.
  pub excludes: Vec<Label>,
}

impl LabelList {
  /// Create a list with the given includes and no excludes.
  pub fn from_includes(includes: Vec<Label>) -> Self {
    Self {
      includes,
      excludes: Vec::new(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.includes.is_empty()
  }

  pub fn push(&mut self, label: Label) {
    self.includes.push(label);
  }

  /// Addresses of all excluded labels.
  pub fn exclude_addresses(&self) -> HashSet<&str> {
    self.excludes.iter().map(|l| l.address.as_str()).collect()
  }

  /// Includes with every excluded address removed and duplicates dropped.
  ///
  /// The first occurrence of an address wins, so declaration order and the
  /// original spelling of the first occurrence are preserved.
  pub fn resolved(&self) -> Vec<Label> {
    let excluded = self.exclude_addresses();
    let mut seen = HashSet::new();
    self
      .includes
      .iter()
      .filter(|l| !excluded.contains(l.address.as_str()))
      .filter(|l| seen.insert(l.address.clone()))
      .cloned()
      .collect()
  }

  /// Apply [`LabelList::resolved`] in place, keeping the excludes.
  pub fn subtract_excludes(&mut self) {
    self.includes = self.resolved();
  }

  /// Included addresses, in order.
  pub fn addresses(&self) -> Vec<&str> {
    self.includes.iter().map(|l| l.address.as_str()).collect()
  }

  /// The distinct packages of absolute includes.
  ///
  /// Relative includes belong to the referencing module's own package and
  /// are not counted.
  pub fn packages(&self) -> BTreeSet<String> {
    self.includes.iter().filter_map(|l| l.package()).map(str::to_string).collect()
  }
}
