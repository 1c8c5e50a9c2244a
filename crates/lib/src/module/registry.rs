//! Registry of module types and their capabilities.

use std::collections::HashMap;
use std::sync::Arc;

use crate::convert::Converter;
use crate::mixed::MixedBuilder;

/// How the entries of a dependency-bearing property are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
  /// Every entry is a module name.
  Modules,
  /// Entries are source paths; only `:module{.tag}` entries are references.
  Sources,
  /// Every entry is the name of a license module.
  Licenses,
}

/// A property whose entries declare dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepProperty {
  pub property: &'static str,
  pub kind: RefKind,
}

impl DepProperty {
  pub const fn new(property: &'static str, kind: RefKind) -> Self {
    Self { property, kind }
  }
}

/// Dependency-bearing properties used by types that don't declare their own.
pub const DEFAULT_DEP_PROPERTIES: [DepProperty; 7] = [
  DepProperty::new("deps", RefKind::Modules),
  DepProperty::new("static_libs", RefKind::Modules),
  DepProperty::new("shared_libs", RefKind::Modules),
  DepProperty::new("header_libs", RefKind::Modules),
  DepProperty::new("srcs", RefKind::Sources),
  DepProperty::new("data", RefKind::Sources),
  DepProperty::new("licenses", RefKind::Licenses),
];

/// What a module type can do beyond being built natively.
#[derive(Clone, Default)]
pub enum Capability {
  /// Built natively only.
  #[default]
  Native,
  /// Can be converted to target-system declarations.
  Convertible(Arc<dyn Converter>),
  /// Can be converted and executed by the external executor in a mixed build.
  Mixed {
    converter: Arc<dyn Converter>,
    mixed: Arc<dyn MixedBuilder>,
  },
}

impl Capability {
  pub fn kind(&self) -> CapabilityKind {
    match self {
      Capability::Native => CapabilityKind::Native,
      Capability::Convertible(_) => CapabilityKind::Convertible,
      Capability::Mixed { .. } => CapabilityKind::Mixed,
    }
  }

  pub fn converter(&self) -> Option<&Arc<dyn Converter>> {
    match self {
      Capability::Native => None,
      Capability::Convertible(converter) | Capability::Mixed { converter, .. } => Some(converter),
    }
  }

  pub fn mixed(&self) -> Option<&Arc<dyn MixedBuilder>> {
    match self {
      Capability::Mixed { mixed, .. } => Some(mixed),
      _ => None,
    }
  }
}

impl std::fmt::Debug for Capability {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "Capability::{:?}", self.kind())
  }
}

/// Capability tag stored on each module record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
  #[default]
  Native,
  Convertible,
  Mixed,
}

impl CapabilityKind {
  pub fn is_convertible(self) -> bool {
    !matches!(self, CapabilityKind::Native)
  }
}

/// Registration of one module type.
#[derive(Debug, Clone)]
pub struct TypeSpec {
  pub capability: Capability,
  pub dep_properties: Vec<DepProperty>,
}

impl TypeSpec {
  pub fn new(capability: Capability) -> Self {
    Self {
      capability,
      dep_properties: DEFAULT_DEP_PROPERTIES.to_vec(),
    }
  }

  pub fn with_dep_properties(mut self, dep_properties: Vec<DepProperty>) -> Self {
    self.dep_properties = dep_properties;
    self
  }
}

/// Module types known to the build, keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
  types: HashMap<String, TypeSpec>,
}

impl TypeRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a type with the default dependency properties.
  pub fn register(&mut self, name: impl Into<String>, capability: Capability) -> &mut Self {
    self.types.insert(name.into(), TypeSpec::new(capability));
    self
  }

  pub fn register_spec(&mut self, name: impl Into<String>, spec: TypeSpec) -> &mut Self {
    self.types.insert(name.into(), spec);
    self
  }

  pub fn get(&self, name: &str) -> Option<&TypeSpec> {
    self.types.get(name)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.types.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.types.len()
  }

  pub fn is_empty(&self) -> bool {
    self.types.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::convert::{ConvertContext, Target};
  use crate::graph::ModuleError;

  struct Noop;

  impl Converter for Noop {
    fn convert(&self, _ctx: &mut ConvertContext<'_>) -> Result<Vec<Target>, ModuleError> {
      Ok(Vec::new())
    }
  }

  #[test]
  fn capability_kinds() {
    let converter: Arc<dyn Converter> = Arc::new(Noop);

    assert_eq!(Capability::Native.kind(), CapabilityKind::Native);
    assert!(Capability::Native.converter().is_none());

    let convertible = Capability::Convertible(converter);
    assert_eq!(convertible.kind(), CapabilityKind::Convertible);
    assert!(convertible.converter().is_some());
    assert!(convertible.mixed().is_none());
    assert!(convertible.kind().is_convertible());
  }

  #[test]
  fn registry_uses_default_dep_properties() {
    let mut registry = TypeRegistry::new();
    registry.register("cc_library", Capability::Native).register_spec(
      "genrule",
      TypeSpec::new(Capability::Native).with_dep_properties(vec![DepProperty::new("tools", RefKind::Modules)]),
    );

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get("cc_library").unwrap().dep_properties.len(), DEFAULT_DEP_PROPERTIES.len());
    assert_eq!(registry.get("genrule").unwrap().dep_properties[0].property, "tools");
    assert!(registry.get("java_library").is_none());
  }
}
