//! Expansion of source and dependency lists into labels.
//!
//! Entries of a module's list properties come in three shapes:
//!
//! - module references, `:name` or `:name{.tag}` (and `//ns:name{.tag}` for a
//!   module in another namespace)
//! - glob patterns, anything containing `*`, `?` or `[`
//! - literal paths relative to the module's directory
//!
//! Every entry ends up as a [`Label`]. Paths are re-homed to the package that
//! owns them only after globbing, so globs that reach into subpackages keep
//! their matches.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::PackageResolver;
use crate::config::Config;
use crate::consts::MISSING_DEP_SUFFIX;
use crate::decision::Decision;
use crate::fs::{is_glob, is_within, join, relative_to};
use crate::graph::{ModuleError, ModuleGraph, ModuleId};
use crate::label::{Label, LabelList};
use crate::module::{Module, TypeRegistry};

/// A parsed module reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRef {
  /// Name as looked up in the graph, `name` or `//ns:name`.
  pub name: String,

  /// Output tag including its leading dot, or empty.
  pub tag: String,
}

/// What resolving module references turned up, for the referencing module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceRecord {
  /// References to modules that don't exist.
  pub missing: Vec<String>,

  /// References to modules that exist but aren't converted.
  pub unconverted: Vec<String>,

  /// Modules that need a conversion-only edge from the referencing module.
  pub edges: Vec<ModuleId>,
}

impl ReferenceRecord {
  fn add_missing(&mut self, name: &str) {
    if !self.missing.iter().any(|m| m == name) {
      self.missing.push(name.to_string());
    }
  }

  fn add_unconverted(&mut self, name: &str) {
    if !self.unconverted.iter().any(|m| m == name) {
      self.unconverted.push(name.to_string());
    }
  }

  fn add_edge(&mut self, id: ModuleId) {
    if !self.edges.contains(&id) {
      self.edges.push(id);
    }
  }
}

/// Expands list properties of one module against the graph and source tree.
pub struct Expander<'a> {
  graph: &'a ModuleGraph,
  registry: &'a TypeRegistry,
  config: &'a Config,
  id: ModuleId,
  record: ReferenceRecord,
}

impl<'a> Expander<'a> {
  pub fn new(graph: &'a ModuleGraph, registry: &'a TypeRegistry, config: &'a Config, id: ModuleId) -> Self {
    Self {
      graph,
      registry,
      config,
      id,
      record: ReferenceRecord::default(),
    }
  }

  pub fn module(&self) -> &'a Module {
    self.graph.module(self.id)
  }

  pub fn resolver(&self) -> PackageResolver<'a> {
    PackageResolver::new(self.config.fs.as_ref(), &self.config.allowlist)
  }

  pub fn record(&self) -> &ReferenceRecord {
    &self.record
  }

  pub fn into_record(self) -> ReferenceRecord {
    self.record
  }

  /// Parse an entry as a module reference.
  ///
  /// Returns `Ok(None)` for entries that aren't module references. A
  /// `//ns:name` entry only counts as one when `name` exists in namespace
  /// `ns`; otherwise it is an ordinary absolute label.
  pub fn parse_module_ref(&self, entry: &str) -> Result<Option<ModuleRef>, ModuleError> {
    if let Some(rest) = entry.strip_prefix(':') {
      let (name, tag) = split_tag(entry, rest)?;
      return Ok(Some(ModuleRef {
        name: name.to_string(),
        tag: tag.to_string(),
      }));
    }

    if let Some(rest) = entry.strip_prefix("//")
      && let Some((namespace, target)) = rest.split_once(':')
    {
      let (name, tag) = split_tag(entry, target)?;
      if self.graph.find(name, Some(namespace)).is_some() {
        return Ok(Some(ModuleRef {
          name: format!("//{}:{}", namespace, name),
          tag: tag.to_string(),
        }));
      }
    }

    Ok(None)
  }

  /// Expand `paths` minus `excludes` into resolved labels.
  ///
  /// Module references among `paths` request a conversion-only edge to the
  /// referenced module.
  pub fn expand(&mut self, paths: &[String], excludes: &[String]) -> Result<LabelList, ModuleError> {
    let config = self.config;
    let dir = self.module().dir.as_str();
    let fs = config.fs.as_ref();

    let mut list = LabelList::default();
    let mut root_excludes = Vec::new();
    for entry in excludes {
      if let Some(reference) = self.parse_module_ref(entry)? {
        let label = self.other_module_label(entry, &reference, false);
        list.excludes.push(label);
      } else if is_glob(entry) {
        let pattern = join(dir, entry);
        for path in fs.glob(&pattern, &[])? {
          list.excludes.push(self.glob_match(dir, &path));
        }
        root_excludes.push(pattern);
      } else {
        root_excludes.push(join(dir, entry));
        list.excludes.push(self.literal(dir, entry));
      }
    }

    let excluded: HashSet<String> = list.excludes.iter().map(|l| l.address.clone()).collect();
    for entry in paths {
      if let Some(reference) = self.parse_module_ref(entry)? {
        let label = self.other_module_label(entry, &reference, true);
        if !excluded.contains(&label.address) {
          list.push(label);
        }
      } else if is_glob(entry) {
        let matches = fs.glob(&join(dir, entry), &root_excludes)?;
        if matches.is_empty() {
          debug!(module = %self.module().name, pattern = %entry, "glob matched nothing");
        }
        for path in matches {
          list.push(self.glob_match(dir, &path));
        }
      } else {
        let label = self.literal(dir, entry);
        if !excluded.contains(&label.address) {
          list.push(label);
        }
      }
    }

    // Pieces resolved one by one and literal paths get re-homed the same way
    let mut resolved = self.resolver().resolve_list(dir, &list);
    resolved.subtract_excludes();
    Ok(resolved)
  }

  /// Resolve a list of module names (a `deps`-style property) into labels.
  ///
  /// No edges are requested: these are real dependencies, already wired
  /// during discovery.
  pub fn expand_modules(&mut self, names: &[String]) -> Result<LabelList, ModuleError> {
    let mut list = LabelList::default();
    for entry in names {
      let reference = match self.parse_module_ref(entry)? {
        Some(reference) => reference,
        None => ModuleRef {
          name: entry.clone(),
          tag: String::new(),
        },
      };
      if reference.name.is_empty() {
        return Err(ModuleError::MalformedReference {
          reference: entry.clone(),
          reason: "empty module name".to_string(),
        });
      }
      list.push(self.other_module_label(entry, &reference, false));
    }
    list.subtract_excludes();
    Ok(list)
  }

  /// The label of another module as seen from this one.
  ///
  /// A missing module yields the sentinel `:<name>__BP2BUILD__MISSING__DEP`.
  pub fn other_module_label(&mut self, entry: &str, reference: &ModuleRef, mark_as_deps: bool) -> Label {
    let module = self.module();
    let Some(dep) = self.graph.lookup(self.id, &reference.name) else {
      warn!(module = %module.name, dependency = %reference.name, "reference to missing module");
      self.record.add_missing(&reference.name);
      return Label::with_original(format!(":{}{}", bare_name(&reference.name), MISSING_DEP_SUFFIX), entry);
    };
    let dep_module = self.graph.module(dep);

    if mark_as_deps && !self.config.edge_exemptions.is_exempt(&module.name, &dep_module.name) {
      self.record.add_edge(dep);
    }

    if !self.is_converted(dep) {
      debug!(module = %module.name, dependency = %dep_module.name, "reference to unconverted module");
      self.record.add_unconverted(&dep_module.name);
    }

    let mut label = self.graph.label_for(dep);
    if !reference.tag.is_empty() && self.has_tagged_output(dep_module, &reference.tag) {
      label.address.push_str(&reference.tag);
    }

    let address = match label.package() {
      Some(package) if package == module.package() => format!(":{}", label.target_name()),
      _ => label.address,
    };
    Label::with_original(address, entry)
  }

  /// A literal path entry, cleaned so different spellings of a file compare equal.
  fn literal(&self, dir: &str, entry: &str) -> Label {
    if entry.starts_with("//") {
      return Label::new(entry);
    }
    self.tree_label(dir, &join(dir, entry), entry)
  }

  fn glob_match(&self, dir: &str, path: &str) -> Label {
    self.tree_label(dir, path, &relative_to(dir, path))
  }

  /// A root-relative path as an entry of the module in `dir`.
  ///
  /// Paths that leave `dir` are resolved from the root to the package owning
  /// them; only paths inside `dir` stay module-relative.
  fn tree_label(&self, dir: &str, path: &str, original: &str) -> Label {
    if is_within(dir, path) {
      return Label::with_original(relative_to(dir, path), original);
    }
    let owned = self.resolver().resolve_from_root(path);
    Label::with_original(owned.address, original)
  }

  /// Whether a module has a usable target-system label.
  fn is_converted(&self, id: ModuleId) -> bool {
    if self.graph.is_failed(id) {
      return false;
    }
    if self.graph.module(id).bazel.label.is_some() {
      return true;
    }
    self.graph.try_provider::<Decision>(id).is_some_and(|d| d.convert)
  }

  fn has_tagged_output(&self, module: &Module, tag: &str) -> bool {
    self
      .registry
      .get(&module.module_type)
      .and_then(|spec| spec.capability.converter())
      .is_some_and(|converter| converter.tagged_output(tag))
  }
}

/// Split `name{.tag}` into name and tag.
fn split_tag<'e>(entry: &str, rest: &'e str) -> Result<(&'e str, &'e str), ModuleError> {
  let malformed = |reason: &str| ModuleError::MalformedReference {
    reference: entry.to_string(),
    reason: reason.to_string(),
  };

  let (name, tag) = match rest.find('{') {
    Some(open) => {
      let tag = rest[open + 1..]
        .strip_suffix('}')
        .ok_or_else(|| malformed("unbalanced '{'"))?;
      if tag.contains(['{', '}']) {
        return Err(malformed("nested braces in tag"));
      }
      (&rest[..open], tag)
    }
    None if rest.contains('}') => return Err(malformed("unbalanced '}'")),
    None => (rest, ""),
  };

  if name.is_empty() {
    return Err(malformed("empty module name"));
  }
  Ok((name, tag))
}

fn bare_name(name: &str) -> &str {
  name.rsplit(':').next().unwrap_or(name)
}
