//! The standard conversion pipeline.
//!
//! A run goes through five phases:
//! 1. `deps` (bottom-up) - add an edge for every dependency reference
//! 2. `decide` (parallel) - publish each module's conversion decision
//! 3. `convert` (top-down) - run the converter of converted modules
//! 4. `mixed_queue` (parallel) - decide mixed-build status and queue
//!    queries; the barrier answers them in one batch
//! 5. `mixed_consume` (bottom-up) - let modules read their answers
//!
//! The result is a [`BuildReport`].

mod phases;
mod report;

use tracing::info;

pub use phases::{
  CONVERT_PHASE, Convert, DECIDE_PHASE, DEPS_PHASE, Decide, DiscoverDeps, DiscoveredDeps, MIXED_CONSUME_PHASE,
  MIXED_QUEUE_PHASE, MixedConsume, MixedQueue,
};
pub use report::{BuildReport, ModuleReport};

use crate::config::Config;
use crate::graph::{GraphError, ModuleGraph};
use crate::mixed::ExternalExecutor;
use crate::module::{Module, TypeRegistry};
use crate::schedule::Scheduler;

/// Load `modules` into a graph and run the standard pipeline over it.
///
/// # Errors
///
/// Returns a `GraphError` if the modules can't form a graph, if an ordered
/// phase finds a dependency cycle, or if the executor fails. Errors of single
/// modules are in the report instead.
pub fn run(
  modules: Vec<Module>,
  registry: &TypeRegistry,
  config: &Config,
  executor: &dyn ExternalExecutor,
) -> Result<BuildReport, GraphError> {
  let mut graph = ModuleGraph::new(modules, registry)?;
  run_graph(&mut graph, registry, config, executor)
}

/// Run the standard pipeline over an already loaded graph.
pub fn run_graph(
  graph: &mut ModuleGraph,
  registry: &TypeRegistry,
  config: &Config,
  executor: &dyn ExternalExecutor,
) -> Result<BuildReport, GraphError> {
  info!(
    modules = graph.len(),
    mode = ?config.mode,
    mixed_builds = config.mixed_builds,
    parallelism = config.parallelism,
    "starting conversion run"
  );

  let mut scheduler = Scheduler::new(config)?;
  scheduler
    .add_phase(DiscoverDeps)
    .add_phase(Decide)
    .add_phase(Convert)
    .add_phase(MixedQueue { executor })
    .add_phase(MixedConsume);

  let phases = scheduler.run(graph, registry, config)?;
  let report = BuildReport::from_graph(graph, phases);

  info!(
    converted = report.converted().count(),
    failed = report.failed().count(),
    diagnostics = report.diagnostics().len(),
    "conversion run complete"
  );

  Ok(report)
}
