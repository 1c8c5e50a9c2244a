//! Phase scheduler.
//!
//! Runs an explicit list of phases over the module graph, strictly in order
//! with a full barrier between phases. Within a phase:
//! - Modules are grouped into waves from the phase's [`Order`] and the edges
//!   present when the phase starts
//! - Each wave runs on a worker pool; steps only read the graph
//! - Step outputs (providers, edges) are committed between waves, each on
//!   behalf of the module whose step produced it
//! - Modules that already failed, or whose dependency failed, are skipped
//!
//! After a phase's barrier hook, failures are propagated to every transitive
//! dependent. Nothing is retried.

mod types;

use petgraph::Direction;
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

pub use types::{Order, Phase, PhaseSummary, StepContext, StepOutput};

use crate::config::Config;
use crate::graph::{GraphError, ModuleError, ModuleGraph, ModuleId};
use crate::module::TypeRegistry;

enum Outcome {
  Ran(Result<StepOutput, ModuleError>),
  /// Skipped because a direct dependency has failed.
  Blocked(ModuleId),
  /// Skipped because the module itself has failed.
  AlreadyFailed,
}

/// Runs phases over a module graph on a bounded worker pool.
pub struct Scheduler<'a> {
  phases: Vec<Box<dyn Phase + 'a>>,
  pool: rayon::ThreadPool,
}

impl<'a> Scheduler<'a> {
  /// Create a scheduler whose pool has `config.parallelism` workers.
  pub fn new(config: &Config) -> Result<Self, GraphError> {
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(config.parallelism)
      .thread_name(|idx| format!("bpbridge-worker-{}", idx))
      .build()
      .map_err(|e| GraphError::WorkerPool(e.to_string()))?;
    Ok(Self {
      phases: Vec::new(),
      pool,
    })
  }

  pub fn add_phase(&mut self, phase: impl Phase + 'a) -> &mut Self {
    self.phases.push(Box::new(phase));
    self
  }

  pub fn phase_names(&self) -> Vec<&'static str> {
    self.phases.iter().map(|p| p.name()).collect()
  }

  /// Run every phase in order.
  ///
  /// # Errors
  ///
  /// Returns `CycleDetected` if an ordered phase finds a cycle, and any error
  /// a barrier hook returns. Per-module errors never end the run; they are
  /// recorded on the graph.
  pub fn run(
    &self,
    graph: &mut ModuleGraph,
    registry: &TypeRegistry,
    config: &Config,
  ) -> Result<Vec<PhaseSummary>, GraphError> {
    let mut summaries = Vec::with_capacity(self.phases.len());
    for phase in &self.phases {
      summaries.push(self.run_phase(phase.as_ref(), graph, registry, config)?);
    }
    Ok(summaries)
  }

  fn run_phase(
    &self,
    phase: &dyn Phase,
    graph: &mut ModuleGraph,
    registry: &TypeRegistry,
    config: &Config,
  ) -> Result<PhaseSummary, GraphError> {
    let name = phase.name();
    let waves = waves(graph, phase.order()).ok_or_else(|| GraphError::CycleDetected {
      phase: name.to_string(),
    })?;

    info!(phase = name, order = ?phase.order(), waves = waves.len(), "starting phase");

    let mut summary = PhaseSummary {
      phase: name,
      waves: waves.len(),
      ..Default::default()
    };

    for (wave_idx, wave) in waves.iter().enumerate() {
      debug!(phase = name, wave = wave_idx, modules = wave.len(), "executing wave");

      let outcomes = self.execute_wave(phase, wave, graph, registry, config);

      for (id, outcome) in outcomes {
        match outcome {
          Outcome::Ran(Ok(output)) => {
            for provider in output.providers {
              graph.publish(id, name, provider);
            }
            for (to, tag) in output.edges {
              graph.add_edge(id, to, tag);
            }
            summary.succeeded += 1;
          }
          Outcome::Ran(Err(e)) => {
            error!(phase = name, module = %graph.module(id).name, error = %e, "step failed");
            graph.record_error(id, e);
            summary.failed += 1;
          }
          Outcome::Blocked(dep) => {
            let dependency = graph.module(dep).name.clone();
            warn!(
              phase = name,
              module = %graph.module(id).name,
              dependency = %dependency,
              "skipping module due to failed dependency"
            );
            graph.record_error(id, ModuleError::DependencyFailed { dependency });
            summary.skipped += 1;
          }
          Outcome::AlreadyFailed => summary.skipped += 1,
        }
      }
    }

    phase.barrier(graph, config)?;
    summary.propagated = graph.propagate_failures();

    info!(
      phase = name,
      succeeded = summary.succeeded,
      failed = summary.failed,
      skipped = summary.skipped,
      propagated = summary.propagated,
      "finished phase"
    );

    Ok(summary)
  }

  fn execute_wave(
    &self,
    phase: &dyn Phase,
    wave: &[ModuleId],
    graph: &ModuleGraph,
    registry: &TypeRegistry,
    config: &Config,
  ) -> Vec<(ModuleId, Outcome)> {
    self.pool.install(|| {
      wave
        .par_iter()
        .map(|&id| {
          if graph.is_failed(id) {
            return (id, Outcome::AlreadyFailed);
          }
          if let Some(dep) = graph.failed_dependency(id) {
            return (id, Outcome::Blocked(dep));
          }
          let ctx = StepContext {
            graph,
            registry,
            config,
            id,
          };
          (id, Outcome::Ran(phase.run(&ctx)))
        })
        .collect()
    })
  }
}

impl std::fmt::Debug for Scheduler<'_> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Scheduler")
      .field("phases", &self.phase_names())
      .field("workers", &self.pool.current_num_threads())
      .finish()
  }
}

/// Group the graph's modules into waves for a phase order.
///
/// Returns `None` if an ordered phase finds a cycle.
pub fn waves(graph: &ModuleGraph, order: Order) -> Option<Vec<Vec<ModuleId>>> {
  match order {
    Order::BottomUp => graph.levels(Direction::Outgoing),
    Order::TopDown => graph.levels(Direction::Incoming),
    Order::Parallel if graph.is_empty() => Some(Vec::new()),
    Order::Parallel => Some(vec![graph.ids().collect()]),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use tracing_test::traced_test;

  use super::*;
  use crate::graph::DepTag;
  use crate::module::{Capability, Module};

  fn graph(names: &[&str]) -> ModuleGraph {
    let mut registry = TypeRegistry::new();
    registry.register("t", Capability::Native);
    ModuleGraph::new(names.iter().map(|n| Module::new(*n, "t", ".")).collect(), &registry).unwrap()
  }

  /// Records the order modules ran in and fails the named ones.
  struct Recording {
    order: Order,
    fail: Vec<&'static str>,
    seen: Mutex<Vec<String>>,
  }

  impl Recording {
    fn new(order: Order) -> Self {
      Self {
        order,
        fail: Vec::new(),
        seen: Mutex::new(Vec::new()),
      }
    }

    fn failing(mut self, name: &'static str) -> Self {
      self.fail.push(name);
      self
    }

    fn position(&self, name: &str) -> usize {
      self.seen.lock().unwrap().iter().position(|n| n == name).unwrap()
    }
  }

  #[derive(Debug)]
  struct Seen;

  impl Phase for Recording {
    fn name(&self) -> &'static str {
      "recording"
    }

    fn order(&self) -> Order {
      self.order
    }

    fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutput, ModuleError> {
      let name = ctx.module().name.clone();
      self.seen.lock().unwrap().push(name.clone());
      if self.fail.contains(&name.as_str()) {
        return Err(ModuleError::Conversion(format!("{} failed", name)));
      }
      Ok(StepOutput::new().publish(Seen))
    }
  }

  fn chain() -> ModuleGraph {
    // c -> b -> a
    let mut g = graph(&["a", "b", "c"]);
    g.add_edge(ModuleId(2), ModuleId(1), DepTag::Ordinary);
    g.add_edge(ModuleId(1), ModuleId(0), DepTag::Ordinary);
    g
  }

  #[test]
  fn bottom_up_runs_dependencies_first() {
    let mut g = chain();
    let phase = Recording::new(Order::BottomUp);
    let registry = TypeRegistry::new();
    let config = Config::default().with_parallelism(4);

    let mut scheduler = Scheduler::new(&config).unwrap();
    scheduler.add_phase(&phase);
    let summaries = scheduler.run(&mut g, &registry, &config).unwrap();

    assert!(phase.position("a") < phase.position("b"));
    assert!(phase.position("b") < phase.position("c"));
    assert_eq!(summaries[0].waves, 3);
    assert_eq!(summaries[0].succeeded, 3);
    assert!(g.try_provider::<Seen>(ModuleId(2)).is_some());
  }

  #[test]
  fn top_down_runs_dependents_first() {
    let mut g = chain();
    let phase = Recording::new(Order::TopDown);
    let registry = TypeRegistry::new();
    let config = Config::default();

    let mut scheduler = Scheduler::new(&config).unwrap();
    scheduler.add_phase(&phase);
    scheduler.run(&mut g, &registry, &config).unwrap();

    assert!(phase.position("c") < phase.position("b"));
    assert!(phase.position("b") < phase.position("a"));
  }

  #[test]
  #[traced_test]
  fn failures_skip_dependents_but_not_siblings() {
    // c -> b -> a, d independent
    let mut g = graph(&["a", "b", "c", "d"]);
    g.add_edge(ModuleId(2), ModuleId(1), DepTag::Ordinary);
    g.add_edge(ModuleId(1), ModuleId(0), DepTag::Ordinary);

    let phase = Recording::new(Order::BottomUp).failing("a");
    let registry = TypeRegistry::new();
    let config = Config::default();

    let mut scheduler = Scheduler::new(&config).unwrap();
    scheduler.add_phase(&phase);
    let summary = &scheduler.run(&mut g, &registry, &config).unwrap()[0];

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.succeeded, 1);
    assert!(g.is_failed(ModuleId(2)));
    assert!(!g.is_failed(ModuleId(3)));
    assert_eq!(
      g.errors(ModuleId(1)),
      &[ModuleError::DependencyFailed {
        dependency: "a".to_string()
      }]
    );
    assert!(logs_contain("skipping module due to failed dependency"));
  }

  #[test]
  fn parallel_phase_failures_propagate_afterwards() {
    let mut g = chain();
    let phase = Recording::new(Order::Parallel).failing("a");
    let registry = TypeRegistry::new();
    let config = Config::default();

    let mut scheduler = Scheduler::new(&config).unwrap();
    scheduler.add_phase(&phase);
    let summary = &scheduler.run(&mut g, &registry, &config).unwrap()[0];

    assert_eq!(summary.waves, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.propagated, 2);
    assert!(g.is_failed(ModuleId(2)));
  }

  #[test]
  fn cycles_abort_ordered_phases() {
    let mut g = graph(&["a", "b"]);
    g.add_edge(ModuleId(0), ModuleId(1), DepTag::Ordinary);
    g.add_edge(ModuleId(1), ModuleId(0), DepTag::Ordinary);

    let phase = Recording::new(Order::BottomUp);
    let registry = TypeRegistry::new();
    let config = Config::default();

    let mut scheduler = Scheduler::new(&config).unwrap();
    scheduler.add_phase(&phase);
    let err = scheduler.run(&mut g, &registry, &config).unwrap_err();
    assert!(matches!(err, GraphError::CycleDetected { phase } if phase == "recording"));

    // Unordered phases don't care
    assert!(waves(&g, Order::Parallel).is_some());
  }
}
