//! The standard phases of a conversion run.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::convert::{ConvertContext, ConvertedTargets, DepReport};
use crate::decision::{Decision, should_convert};
use crate::graph::{DepTag, GraphError, ModuleError, ModuleGraph, ModuleId, PendingProvider};
use crate::mixed::{
  ConsumeContext, ExternalAnswers, ExternalExecutor, MixedBuilder, QueueContext, QueuedQueries, Query,
  mixed_build_status,
};
use crate::module::RefKind;
use crate::resolve::Expander;
use crate::schedule::{Order, Phase, StepContext, StepOutput};

pub const DEPS_PHASE: &str = "deps";
pub const DECIDE_PHASE: &str = "decide";
pub const CONVERT_PHASE: &str = "convert";
pub const MIXED_QUEUE_PHASE: &str = "mixed_queue";
pub const MIXED_CONSUME_PHASE: &str = "mixed_consume";

/// Dependencies discovery could not find, tolerated in permissive mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredDeps {
  pub missing: Vec<String>,
}

/// Adds an edge for every entry of a module's dependency properties.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoverDeps;

impl Phase for DiscoverDeps {
  fn name(&self) -> &'static str {
    DEPS_PHASE
  }

  fn order(&self) -> Order {
    Order::BottomUp
  }

  fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutput, ModuleError> {
    let module = ctx.module();
    let Some(spec) = ctx.registry.get(&module.module_type) else {
      return Ok(StepOutput::new().publish(DiscoveredDeps::default()));
    };
    let expander = Expander::new(ctx.graph, ctx.registry, ctx.config, ctx.id);

    let mut output = StepOutput::new();
    let mut missing: Vec<String> = Vec::new();
    for dep_property in &spec.dep_properties {
      for entry in module.list(dep_property.property) {
        let reference = expander.parse_module_ref(entry)?;
        let (name, tag) = match (dep_property.kind, reference) {
          (RefKind::Sources, Some(r)) => (r.name, DepTag::OutputOf(r.tag)),
          // Plain source paths aren't dependencies
          (RefKind::Sources, None) => continue,
          (RefKind::Modules, r) => (r.map_or_else(|| entry.clone(), |r| r.name), DepTag::Ordinary),
          (RefKind::Licenses, r) => (r.map_or_else(|| entry.clone(), |r| r.name), DepTag::License),
        };

        match ctx.graph.lookup(ctx.id, &name) {
          Some(dep) if ctx.config.edge_exemptions.is_exempt(&module.name, &ctx.graph.module(dep).name) => {
            debug!(module = %module.name, dependency = %name, "skipping exempt dependency edge");
          }
          Some(dep) => output = output.edge(dep, tag),
          None if !missing.contains(&name) => missing.push(name),
          None => {}
        }
      }
    }

    if !missing.is_empty() {
      if !ctx.config.allow_missing_dependencies {
        return Err(ModuleError::MissingDependencies { names: missing });
      }
      warn!(module = %module.name, missing = ?missing, "tolerating missing dependencies");
    }

    Ok(output.publish(DiscoveredDeps { missing }))
  }
}

/// Publishes every module's conversion [`Decision`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Decide;

impl Phase for Decide {
  fn name(&self) -> &'static str {
    DECIDE_PHASE
  }

  fn order(&self) -> Order {
    Order::Parallel
  }

  fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutput, ModuleError> {
    Ok(StepOutput::new().publish(should_convert(ctx.module(), ctx.config)))
  }
}

/// Runs the converter of every module decided for conversion.
#[derive(Debug, Clone, Copy, Default)]
pub struct Convert;

impl Phase for Convert {
  fn name(&self) -> &'static str {
    CONVERT_PHASE
  }

  fn order(&self) -> Order {
    Order::TopDown
  }

  fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutput, ModuleError> {
    if !ctx.provider::<Decision>().convert {
      return Ok(StepOutput::new());
    }
    let module = ctx.module();
    let Some(converter) = ctx
      .registry
      .get(&module.module_type)
      .and_then(|spec| spec.capability.converter())
    else {
      return Ok(StepOutput::new());
    };

    let mut convert_ctx = ConvertContext::new(ctx.graph, ctx.registry, ctx.config, ctx.id);
    let targets = converter.convert(&mut convert_ctx)?;
    let record = convert_ctx.into_record();

    if !record.missing.is_empty() && !ctx.config.allow_missing_dependencies {
      return Err(ModuleError::MissingDependencies { names: record.missing });
    }
    if !record.unconverted.is_empty() {
      debug!(module = %module.name, unconverted = ?record.unconverted, "module depends on unconverted modules");
    }
    debug!(module = %module.name, targets = targets.len(), "converted module");

    let mut output = StepOutput::new()
      .publish(DepReport::from(&record))
      .publish(ConvertedTargets(targets));
    for dep in record.edges {
      output = output.edge(dep, DepTag::ConversionOnly);
    }
    Ok(output)
  }
}

/// Decides mixed-build status and queues the queries of enabled modules.
///
/// The barrier answers every queued query in one batch.
pub struct MixedQueue<'a> {
  pub executor: &'a dyn ExternalExecutor,
}

impl Phase for MixedQueue<'_> {
  fn name(&self) -> &'static str {
    MIXED_QUEUE_PHASE
  }

  fn order(&self) -> Order {
    Order::Parallel
  }

  fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutput, ModuleError> {
    let module = ctx.module();
    let builder = mixed_builder(ctx);
    let converted = ctx.try_provider::<Decision>().is_some_and(|d| d.convert);
    let status = mixed_build_status(module, builder, converted, ctx.config);

    let mut output = StepOutput::new();
    if status.is_enabled()
      && let Some(builder) = builder
    {
      let mut queue_ctx = QueueContext::new(module, ctx.graph.label_for(ctx.id), ctx.config);
      builder.enqueue(&mut queue_ctx);
      output = output.publish(QueuedQueries(queue_ctx.into_queries()));
    }
    Ok(output.publish(status))
  }

  fn barrier(&self, graph: &mut ModuleGraph, _config: &Config) -> Result<(), GraphError> {
    let queued: Vec<ModuleId> = graph
      .ids()
      .filter(|&id| graph.try_provider::<QueuedQueries>(id).is_some())
      .collect();
    let batch: BTreeSet<Query> = queued
      .iter()
      .flat_map(|&id| graph.provider::<QueuedQueries>(id).0.iter().cloned())
      .collect();
    if batch.is_empty() {
      return Ok(());
    }

    let batch: Vec<Query> = batch.into_iter().collect();
    info!(queries = batch.len(), modules = queued.len(), "answering external queries");
    let answers = self.executor.answer(&batch)?;
    if answers.len() < batch.len() {
      warn!(unanswered = batch.len() - answers.len(), "external executor left queries unanswered");
    }

    for id in queued {
      let own: HashMap<Query, String> = graph
        .provider::<QueuedQueries>(id)
        .0
        .iter()
        .filter_map(|q| answers.get(q).map(|a| (q.clone(), a.clone())))
        .collect();
      graph.publish(id, MIXED_QUEUE_PHASE, PendingProvider::new(ExternalAnswers(own)));
    }
    Ok(())
  }
}

/// Lets every module that queued queries read its answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MixedConsume;

impl Phase for MixedConsume {
  fn name(&self) -> &'static str {
    MIXED_CONSUME_PHASE
  }

  fn order(&self) -> Order {
    Order::BottomUp
  }

  fn run(&self, ctx: &StepContext<'_>) -> Result<StepOutput, ModuleError> {
    if ctx.try_provider::<QueuedQueries>().is_none() {
      return Ok(StepOutput::new());
    }
    let Some(builder) = mixed_builder(ctx) else {
      return Ok(StepOutput::new());
    };

    let empty = HashMap::new();
    let answers = ctx.try_provider::<ExternalAnswers>().map_or(&empty, |a| &a.0);
    let mut consume_ctx = ConsumeContext::new(ctx.module(), ctx.graph.label_for(ctx.id), ctx.config, answers);
    builder.consume(&mut consume_ctx)?;
    Ok(StepOutput::new().with_providers(consume_ctx.into_providers()))
  }
}

fn mixed_builder<'a>(ctx: &StepContext<'a>) -> Option<&'a dyn MixedBuilder> {
  ctx
    .registry
    .get(&ctx.module().module_type)
    .and_then(|spec| spec.capability.mixed())
    .map(|builder| &**builder)
}
