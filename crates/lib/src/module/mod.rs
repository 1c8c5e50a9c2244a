//! Module records and the module type registry.
//!
//! A [`Module`] is one vertex of the build graph as loaded from the declarative
//! source: a name, a declared type, the directory it lives in, and a bag of
//! typed properties. What a module type can do (convert, run on the external
//! executor) is looked up in the [`TypeRegistry`] by type name and mirrored on
//! the record as a [`CapabilityKind`] tag.

mod registry;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use registry::{Capability, CapabilityKind, DEFAULT_DEP_PROPERTIES, DepProperty, RefKind, TypeRegistry, TypeSpec};

use crate::consts::TOP_LEVEL_DIR;

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
  Bool(bool),
  String(String),
  List(Vec<String>),
}

/// Property bag of a module, ordered for deterministic iteration.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Conversion-related properties every module may set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BazelProps {
  /// Explicit opt-in (`true`) or opt-out (`false`). Unset defers to the allowlist.
  pub bp2build_available: Option<bool>,

  /// Hand-authored target-system label standing in for this module.
  pub label: Option<String>,

  /// Whether the module contributes to an API surface.
  pub api_surface: bool,
}

/// A module as loaded from the declarative source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
  /// Name, unique within its namespace.
  pub name: String,

  /// Declared module type, e.g. `cc_library`.
  pub module_type: String,

  /// Directory relative to the source root; `.` for the top level.
  pub dir: String,

  /// Namespace the name is unique in; `None` is the global namespace.
  #[serde(default)]
  pub namespace: Option<String>,

  /// Disabled modules are never executed, natively or externally.
  #[serde(default = "default_enabled")]
  pub enabled: bool,

  #[serde(default)]
  pub props: Properties,

  #[serde(default)]
  pub bazel: BazelProps,

  /// Capability tag, assigned from the registry when the graph is loaded.
  #[serde(skip)]
  pub capability: CapabilityKind,
}

fn default_enabled() -> bool {
  true
}

impl Module {
  pub fn new(name: impl Into<String>, module_type: impl Into<String>, dir: impl Into<String>) -> Self {
    let dir = dir.into();
    Self {
      name: name.into(),
      module_type: module_type.into(),
      dir: if dir.is_empty() { TOP_LEVEL_DIR.to_string() } else { dir },
      namespace: None,
      enabled: true,
      props: Properties::new(),
      bazel: BazelProps::default(),
      capability: CapabilityKind::default(),
    }
  }

  pub fn with_prop(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
    self.props.insert(name.into(), value);
    self
  }

  /// Set a list-valued property.
  pub fn with_list<I, S>(self, name: impl Into<String>, items: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let items = items.into_iter().map(Into::into).collect();
    self.with_prop(name, PropertyValue::List(items))
  }

  pub fn with_bp2build_available(mut self, available: bool) -> Self {
    self.bazel.bp2build_available = Some(available);
    self
  }

  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.bazel.label = Some(label.into());
    self
  }

  pub fn with_api_surface(mut self) -> Self {
    self.bazel.api_surface = true;
    self
  }

  pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
    self.namespace = Some(namespace.into());
    self
  }

  pub fn disabled(mut self) -> Self {
    self.enabled = false;
    self
  }

  /// A list-valued property, empty when unset or of another type.
  pub fn list(&self, name: &str) -> &[String] {
    match self.props.get(name) {
      Some(PropertyValue::List(items)) => items,
      _ => &[],
    }
  }

  /// The directory rendered as a target-system package (`.` becomes empty).
  pub fn package(&self) -> &str {
    if self.dir == TOP_LEVEL_DIR { "" } else { &self.dir }
  }
}
