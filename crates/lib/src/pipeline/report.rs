//! Per-module results of a conversion run.

use std::collections::BTreeMap;

use super::phases::DiscoveredDeps;
use crate::convert::{ConvertedTargets, DepReport, Target};
use crate::decision::{AllowlistConflict, Decision};
use crate::graph::{ModuleError, ModuleGraph, ModuleId};
use crate::label::Label;
use crate::mixed::MixedBuildStatus;
use crate::schedule::PhaseSummary;

/// What happened to one module.
#[derive(Debug, Clone)]
pub struct ModuleReport {
  pub id: ModuleId,
  pub name: String,
  pub module_type: String,
  pub dir: String,

  /// The module's absolute label.
  pub label: Label,

  /// Unset if the module failed before its decision was made.
  pub decision: Option<Decision>,

  pub targets: Vec<Target>,

  /// Referenced modules that don't exist.
  pub missing: Vec<String>,

  /// Referenced modules that exist but weren't converted.
  pub unconverted: Vec<String>,

  pub mixed: Option<MixedBuildStatus>,
  pub errors: Vec<ModuleError>,
}

impl ModuleReport {
  fn from_graph(graph: &ModuleGraph, id: ModuleId) -> Self {
    let module = graph.module(id);

    let mut missing = Vec::new();
    let mut unconverted = Vec::new();
    if let Some(discovered) = graph.try_provider::<DiscoveredDeps>(id) {
      missing.extend(discovered.missing.iter().cloned());
    }
    if let Some(report) = graph.try_provider::<DepReport>(id) {
      missing.extend(report.missing.iter().cloned());
      unconverted.extend(report.unconverted.iter().cloned());
    }
    for error in graph.errors(id) {
      if let ModuleError::MissingDependencies { names } = error {
        missing.extend(names.iter().cloned());
      }
    }
    dedup(&mut missing);
    dedup(&mut unconverted);

    Self {
      id,
      name: module.name.clone(),
      module_type: module.module_type.clone(),
      dir: module.dir.clone(),
      label: graph.label_for(id),
      decision: graph.try_provider::<Decision>(id).cloned(),
      targets: graph
        .try_provider::<ConvertedTargets>(id)
        .map(|t| t.0.clone())
        .unwrap_or_default(),
      missing,
      unconverted,
      mixed: graph.try_provider::<MixedBuildStatus>(id).cloned(),
      errors: graph.errors(id).to_vec(),
    }
  }

  /// Converted without errors.
  pub fn converted(&self) -> bool {
    self.errors.is_empty() && self.decision.as_ref().is_some_and(|d| d.convert)
  }

  pub fn is_failed(&self) -> bool {
    !self.errors.is_empty()
  }
}

/// Results of a whole conversion run.
#[derive(Debug, Clone)]
pub struct BuildReport {
  /// One entry per module, in load order.
  pub modules: Vec<ModuleReport>,
  pub phases: Vec<PhaseSummary>,
}

impl BuildReport {
  pub fn from_graph(graph: &ModuleGraph, phases: Vec<PhaseSummary>) -> Self {
    Self {
      modules: graph.ids().map(|id| ModuleReport::from_graph(graph, id)).collect(),
      phases,
    }
  }

  /// The first module with this name, in any namespace.
  pub fn module(&self, name: &str) -> Option<&ModuleReport> {
    self.modules.iter().find(|m| m.name == name)
  }

  pub fn converted(&self) -> impl Iterator<Item = &ModuleReport> {
    self.modules.iter().filter(|m| m.converted())
  }

  pub fn failed(&self) -> impl Iterator<Item = &ModuleReport> {
    self.modules.iter().filter(|m| m.is_failed())
  }

  /// Allowlist conflicts of all modules, with the module name.
  pub fn diagnostics(&self) -> Vec<(&str, &AllowlistConflict)> {
    self
      .modules
      .iter()
      .filter_map(|m| m.decision.as_ref().map(|d| (m.name.as_str(), d)))
      .flat_map(|(name, d)| d.diagnostics.iter().map(move |c| (name, c)))
      .collect()
  }

  /// Targets of converted modules, grouped by package and sorted by name.
  pub fn build_files(&self) -> BTreeMap<&str, Vec<&Target>> {
    let mut files: BTreeMap<&str, Vec<&Target>> = BTreeMap::new();
    for target in self.converted().flat_map(|m| &m.targets) {
      files.entry(target.package.as_str()).or_default().push(target);
    }
    for targets in files.values_mut() {
      targets.sort_by(|a, b| a.name.cmp(&b.name));
    }
    files
  }

  /// The contents of every generated build file, keyed by package.
  pub fn render_build_files(&self) -> BTreeMap<String, String> {
    self
      .build_files()
      .into_iter()
      .map(|(package, targets)| {
        let body: Vec<String> = targets.iter().map(|t| t.to_string()).collect();
        (package.to_string(), format!("{}\n", body.join("\n\n")))
      })
      .collect()
  }
}

fn dedup(items: &mut Vec<String>) {
  let mut seen = std::collections::HashSet::new();
  items.retain(|item| seen.insert(item.clone()));
}
