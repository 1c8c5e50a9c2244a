//! Conversion of modules into target-system declarations.
//!
//! Module types that can be converted register a [`Converter`]. During the
//! conversion phase each converted module's converter runs with a
//! [`ConvertContext`], which resolves the module's list properties into labels
//! and keeps track of the missing and unconverted modules it referenced.

mod target;

use std::any::Any;

pub use target::{AttrValue, Target};

use crate::config::Config;
use crate::graph::{ModuleError, ModuleGraph, ModuleId};
use crate::label::{Label, LabelList};
use crate::module::{Module, TypeRegistry};
use crate::resolve::{Expander, ReferenceRecord};

/// Conversion routine of a module type.
pub trait Converter: Send + Sync {
  /// Produce the target-system declarations for the context's module.
  fn convert(&self, ctx: &mut ConvertContext<'_>) -> Result<Vec<Target>, ModuleError>;

  /// Whether `tag` (e.g. `.hdrs`) names an addressable output of this type.
  ///
  /// References to untagged outputs fall back to the module's own label.
  fn tagged_output(&self, _tag: &str) -> bool {
    false
  }
}

/// Targets a module was converted into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertedTargets(pub Vec<Target>);

/// Dependencies a converted module could not fully resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepReport {
  pub missing: Vec<String>,
  pub unconverted: Vec<String>,
}

impl From<&ReferenceRecord> for DepReport {
  fn from(record: &ReferenceRecord) -> Self {
    Self {
      missing: record.missing.clone(),
      unconverted: record.unconverted.clone(),
    }
  }
}

/// What a converter sees of the build while converting one module.
pub struct ConvertContext<'a> {
  graph: &'a ModuleGraph,
  config: &'a Config,
  id: ModuleId,
  expander: Expander<'a>,
}

impl<'a> ConvertContext<'a> {
  pub fn new(graph: &'a ModuleGraph, registry: &'a TypeRegistry, config: &'a Config, id: ModuleId) -> Self {
    Self {
      graph,
      config,
      id,
      expander: Expander::new(graph, registry, config, id),
    }
  }

  pub fn module(&self) -> &'a Module {
    self.graph.module(self.id)
  }

  pub fn config(&self) -> &'a Config {
    self.config
  }

  /// The module's own absolute label.
  pub fn label(&self) -> Label {
    self.graph.label_for(self.id)
  }

  /// Expand a source property and its exclude property.
  pub fn expand_srcs(&mut self, property: &str, exclude_property: &str) -> Result<LabelList, ModuleError> {
    let module = self.module();
    self.expand(module.list(property), module.list(exclude_property))
  }

  /// Expand explicit paths and excludes relative to the module's directory.
  pub fn expand(&mut self, paths: &[String], excludes: &[String]) -> Result<LabelList, ModuleError> {
    self.expander.expand(paths, excludes)
  }

  /// Resolve a dependency-name property into module labels.
  pub fn expand_deps(&mut self, property: &str) -> Result<LabelList, ModuleError> {
    let names = self.module().list(property);
    self.expander.expand_modules(names)
  }

  /// Read a provider of a direct dependency.
  ///
  /// Returns `None` when `name` isn't a direct dependency of this module.
  ///
  /// # Panics
  ///
  /// Panics if the dependency hasn't published a `T`. Only providers from
  /// earlier phases are readable here.
  pub fn dependency_provider<T: Any>(&self, name: &str) -> Option<&'a T> {
    let dep = self.graph.lookup(self.id, name)?;
    if !self.graph.dependency_ids(self.id).contains(&dep) {
      return None;
    }
    Some(self.graph.provider::<T>(dep))
  }

  /// The single package all absolute labels of `list` live in.
  ///
  /// Returns `None` when every label is package-relative.
  ///
  /// # Errors
  ///
  /// Returns `CrossPackage` when the labels span more than one package.
  pub fn single_package(&self, attribute: &str, list: &LabelList) -> Result<Option<String>, ModuleError> {
    let mut packages = list.packages();
    if packages.len() > 1 {
      return Err(ModuleError::CrossPackage {
        attribute: attribute.to_string(),
        packages: packages.into_iter().collect(),
      });
    }
    Ok(packages.pop_first())
  }

  pub fn record(&self) -> &ReferenceRecord {
    self.expander.record()
  }

  pub fn into_record(self) -> ReferenceRecord {
    self.expander.into_record()
  }
}
