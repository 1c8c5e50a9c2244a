//! The module graph.
//!
//! This module provides the directed graph of modules the phases operate on:
//! - Module records, looked up by name within a namespace
//! - Dependency edges tagged with their role ([`DepTag`])
//! - Per-module provider storage ([`ProviderStore`])
//! - Per-module error records and failure propagation
//! - Level computation (Kahn's algorithm) for ordered phases
//!
//! Edges point from a module to its dependency.

mod provider;
mod types;

use std::any::{Any, type_name};
use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::{debug, warn};

pub use provider::{PendingProvider, ProviderStore};
pub use types::{DepTag, GraphError, ModuleError, ModuleId};

use crate::label::Label;
use crate::module::{Module, TypeRegistry};

/// The build graph: modules, tagged edges, providers and errors.
pub struct ModuleGraph {
  modules: Vec<Module>,

  /// Node weights are the module ids; node index `i` is module `i`.
  graph: DiGraph<ModuleId, DepTag>,

  /// `(namespace, name)` to module. The global namespace is the empty string.
  names: HashMap<(String, String), ModuleId>,

  providers: Vec<ProviderStore>,

  errors: Vec<Vec<ModuleError>>,
}

impl ModuleGraph {
  /// Build a graph from loaded modules.
  ///
  /// Each module's capability tag is assigned from the registry.
  ///
  /// # Errors
  ///
  /// Returns `UnknownModuleType` for a module whose type isn't registered and
  /// `DuplicateModule` when a name repeats within a namespace.
  pub fn new(modules: Vec<Module>, registry: &TypeRegistry) -> Result<Self, GraphError> {
    let mut graph = DiGraph::with_capacity(modules.len(), 0);
    let mut names = HashMap::with_capacity(modules.len());
    let mut loaded = Vec::with_capacity(modules.len());

    for (idx, mut module) in modules.into_iter().enumerate() {
      let spec = registry.get(&module.module_type).ok_or_else(|| GraphError::UnknownModuleType {
        module: module.name.clone(),
        module_type: module.module_type.clone(),
      })?;
      module.capability = spec.capability.kind();

      let key = (module.namespace.clone().unwrap_or_default(), module.name.clone());
      if names.contains_key(&key) {
        return Err(GraphError::DuplicateModule {
          name: key.1,
          namespace: key.0,
        });
      }

      let id = ModuleId(idx);
      graph.add_node(id);
      names.insert(key, id);
      loaded.push(module);
    }

    let count = loaded.len();
    debug!(modules = count, "loaded module graph");

    Ok(Self {
      modules: loaded,
      graph,
      names,
      providers: (0..count).map(|_| ProviderStore::new()).collect(),
      errors: vec![Vec::new(); count],
    })
  }

  pub fn len(&self) -> usize {
    self.modules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.modules.is_empty()
  }

  /// All module ids, in load order.
  pub fn ids(&self) -> impl Iterator<Item = ModuleId> + '_ {
    (0..self.modules.len()).map(ModuleId)
  }

  /// # Panics
  ///
  /// Panics if `id` does not belong to this graph.
  pub fn module(&self, id: ModuleId) -> &Module {
    &self.modules[id.0]
  }

  /// Find a module by name in a namespace (`None` is the global namespace).
  pub fn find(&self, name: &str, namespace: Option<&str>) -> Option<ModuleId> {
    self
      .names
      .get(&(namespace.unwrap_or_default().to_string(), name.to_string()))
      .copied()
  }

  /// Resolve a module name as seen from another module.
  ///
  /// `//ns:name` looks in namespace `ns`. A plain name looks in the
  /// referencing module's namespace first, then in the global namespace.
  pub fn lookup(&self, from: ModuleId, name: &str) -> Option<ModuleId> {
    if let Some(rest) = name.strip_prefix("//") {
      let (namespace, target) = rest.split_once(':')?;
      return self.find(target, Some(namespace));
    }
    let own = self.module(from).namespace.as_deref();
    own
      .and_then(|ns| self.find(name, Some(ns)))
      .or_else(|| self.find(name, None))
  }

  /// Add an edge from `from` to its dependency `to`.
  ///
  /// Returns false if an identical edge already exists.
  pub fn add_edge(&mut self, from: ModuleId, to: ModuleId, tag: DepTag) -> bool {
    let (a, b) = (node(from), node(to));
    if self.graph.edges_connecting(a, b).any(|e| e.weight() == &tag) {
      return false;
    }
    self.graph.add_edge(a, b, tag);
    true
  }

  /// Direct dependencies of a module with their edge tags.
  pub fn dependencies(&self, id: ModuleId) -> Vec<(ModuleId, DepTag)> {
    let mut deps: Vec<_> = self
      .graph
      .edges_directed(node(id), Direction::Outgoing)
      .map(|e| (self.graph[e.target()], e.weight().clone()))
      .collect();
    deps.sort();
    deps
  }

  /// Distinct direct dependencies of a module.
  pub fn dependency_ids(&self, id: ModuleId) -> Vec<ModuleId> {
    self.neighbors(id, Direction::Outgoing)
  }

  /// Distinct direct dependents of a module.
  pub fn dependent_ids(&self, id: ModuleId) -> Vec<ModuleId> {
    self.neighbors(id, Direction::Incoming)
  }

  fn neighbors(&self, id: ModuleId, direction: Direction) -> Vec<ModuleId> {
    let mut ids: Vec<_> = self
      .graph
      .neighbors_directed(node(id), direction)
      .map(|n| self.graph[n])
      .collect();
    ids.sort();
    ids.dedup();
    ids
  }

  /// Number of edges in the graph.
  pub fn edge_count(&self) -> usize {
    self.graph.edge_count()
  }

  /// The absolute label of a module.
  ///
  /// A hand-authored label wins; otherwise `//<dir>:<name>`.
  pub fn label_for(&self, id: ModuleId) -> Label {
    let module = self.module(id);
    match &module.bazel.label {
      Some(label) => Label::with_original(label.clone(), format!(":{}", module.name)),
      None => Label::with_original(
        format!("//{}:{}", module.package(), module.name),
        format!(":{}", module.name),
      ),
    }
  }

  /// Publish a provider for a module.
  ///
  /// # Panics
  ///
  /// Panics if the module already published a provider of the same type.
  pub fn publish(&mut self, id: ModuleId, phase: &'static str, pending: PendingProvider) {
    self.providers[id.0].publish(phase, pending);
  }

  /// Read a provider that ordering guarantees is published.
  ///
  /// # Panics
  ///
  /// Panics if the module hasn't published a provider of type `T`. Reading
  /// before writing means a phase was ordered before the phase that produces
  /// its input, which must be fixed where the phases are declared.
  pub fn provider<T: Any>(&self, id: ModuleId) -> &T {
    match self.providers[id.0].get::<T>() {
      Some(value) => value,
      None => panic!(
        "module '{}' read provider {} before it was published",
        self.module(id).name,
        type_name::<T>()
      ),
    }
  }

  /// Read a provider that may legitimately be absent.
  pub fn try_provider<T: Any>(&self, id: ModuleId) -> Option<&T> {
    self.providers[id.0].get::<T>()
  }

  /// Record an error against a module. A module with errors is failed.
  pub fn record_error(&mut self, id: ModuleId, error: ModuleError) {
    self.errors[id.0].push(error);
  }

  pub fn errors(&self, id: ModuleId) -> &[ModuleError] {
    &self.errors[id.0]
  }

  pub fn is_failed(&self, id: ModuleId) -> bool {
    !self.errors[id.0].is_empty()
  }

  /// The first failed direct dependency of a module, if any.
  pub fn failed_dependency(&self, id: ModuleId) -> Option<ModuleId> {
    self.dependency_ids(id).into_iter().find(|&dep| self.is_failed(dep))
  }

  /// Mark every transitive dependent of a failed module as failed.
  ///
  /// Returns the number of newly failed modules.
  pub fn propagate_failures(&mut self) -> usize {
    let mut queue: VecDeque<ModuleId> = self.ids().filter(|&id| self.is_failed(id)).collect();
    let mut seen: HashSet<ModuleId> = queue.iter().copied().collect();
    let mut newly_failed = 0;

    while let Some(failed) = queue.pop_front() {
      for dependent in self.dependent_ids(failed) {
        if !seen.insert(dependent) {
          continue;
        }
        if !self.is_failed(dependent) {
          let dependency = self.module(failed).name.clone();
          warn!(
            module = %self.module(dependent).name,
            dependency = %dependency,
            "marking module failed due to failed dependency"
          );
          self.record_error(dependent, ModuleError::DependencyFailed { dependency });
          newly_failed += 1;
        }
        queue.push_back(dependent);
      }
    }

    newly_failed
  }

  /// Group modules into levels so that every module's neighbors in
  /// `direction` sit in earlier levels.
  ///
  /// With `Direction::Outgoing`, dependencies come first (bottom-up); with
  /// `Direction::Incoming`, dependents come first (top-down). Conversion-only
  /// edges are ignored. Returns `None` if the remaining edges form a cycle.
  pub fn levels(&self, direction: Direction) -> Option<Vec<Vec<ModuleId>>> {
    // Use Kahn's algorithm variant to compute levels
    let mut pending: Vec<usize> = self
      .graph
      .node_indices()
      .map(|idx| self.ordering_neighbors(idx, direction).count())
      .collect();

    let mut levels = Vec::new();
    let mut ready: Vec<NodeIndex> = self.graph.node_indices().filter(|idx| pending[idx.index()] == 0).collect();
    let mut placed = 0;

    while !ready.is_empty() {
      placed += ready.len();
      let mut next = Vec::new();
      for &idx in &ready {
        // Release the nodes waiting on this one
        for waiting in self.ordering_neighbors(idx, direction.opposite()) {
          let count = &mut pending[waiting.index()];
          *count = count.saturating_sub(1);
          if *count == 0 {
            next.push(waiting);
          }
        }
      }
      levels.push(ready.iter().map(|&idx| self.graph[idx]).collect());
      next.sort();
      next.dedup();
      ready = next;
    }

    if placed == self.graph.node_count() {
      Some(levels)
    } else {
      None
    }
  }

  /// Neighbors across edges that order phases, once per edge.
  fn ordering_neighbors(&self, idx: NodeIndex, direction: Direction) -> impl Iterator<Item = NodeIndex> + '_ {
    self
      .graph
      .edges_directed(idx, direction)
      .filter(|e| e.weight().orders())
      .map(move |e| if e.source() == idx { e.target() } else { e.source() })
  }
}

impl std::fmt::Debug for ModuleGraph {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ModuleGraph")
      .field("modules", &self.modules.len())
      .field("edges", &self.graph.edge_count())
      .finish_non_exhaustive()
  }
}

fn node(id: ModuleId) -> NodeIndex {
  NodeIndex::new(id.0)
}
