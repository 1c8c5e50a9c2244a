//! Types shared by phases and the scheduler.

use std::any::Any;

use serde::Serialize;

use crate::config::Config;
use crate::graph::{DepTag, GraphError, ModuleError, ModuleGraph, ModuleId, PendingProvider};
use crate::module::{Module, TypeRegistry};

/// How a phase orders the modules it visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
  /// Dependencies before dependents.
  BottomUp,
  /// Dependents before dependencies.
  TopDown,
  /// No ordering; all modules in one wave.
  Parallel,
}

/// Read-only view a step gets of the build.
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
  pub graph: &'a ModuleGraph,
  pub registry: &'a TypeRegistry,
  pub config: &'a Config,
  pub id: ModuleId,
}

impl<'a> StepContext<'a> {
  pub fn module(&self) -> &'a Module {
    self.graph.module(self.id)
  }

  /// A provider this module published in an earlier phase.
  ///
  /// # Panics
  ///
  /// Panics if it wasn't published.
  pub fn provider<T: Any>(&self) -> &'a T {
    self.graph.provider::<T>(self.id)
  }

  pub fn try_provider<T: Any>(&self) -> Option<&'a T> {
    self.graph.try_provider::<T>(self.id)
  }
}

/// What a step asks the scheduler to commit for its module.
#[derive(Debug, Default)]
pub struct StepOutput {
  pub providers: Vec<PendingProvider>,

  /// Edges from the step's module to the given dependencies.
  pub edges: Vec<(ModuleId, DepTag)>,
}

impl StepOutput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn publish<T: Any + Send + Sync>(mut self, value: T) -> Self {
    self.providers.push(PendingProvider::new(value));
    self
  }

  pub fn with_providers(mut self, providers: Vec<PendingProvider>) -> Self {
    self.providers.extend(providers);
    self
  }

  pub fn edge(mut self, to: ModuleId, tag: DepTag) -> Self {
    self.edges.push((to, tag));
    self
  }
}

/// One pass over the module graph.
pub trait Phase: Send + Sync {
  /// Name used in logs and as the publishing phase of providers.
  fn name(&self) -> &'static str;

  fn order(&self) -> Order;

  /// Process one module.
  fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutput, ModuleError>;

  /// Runs once after every module has been processed, before failures are
  /// propagated.
  fn barrier(&self, _graph: &mut ModuleGraph, _config: &Config) -> Result<(), GraphError> {
    Ok(())
  }
}

impl<P: Phase + ?Sized> Phase for &P {
  fn name(&self) -> &'static str {
    (**self).name()
  }

  fn order(&self) -> Order {
    (**self).order()
  }

  fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutput, ModuleError> {
    (**self).run(ctx)
  }

  fn barrier(&self, graph: &mut ModuleGraph, config: &Config) -> Result<(), GraphError> {
    (**self).barrier(graph, config)
  }
}

/// Counts for one completed phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseSummary {
  pub phase: &'static str,
  pub waves: usize,

  /// Steps that ran and succeeded.
  pub succeeded: usize,

  /// Steps that ran and failed.
  pub failed: usize,

  /// Modules not run because they or a dependency had already failed.
  pub skipped: usize,

  /// Modules newly failed by propagation after the phase.
  pub propagated: usize,
}
