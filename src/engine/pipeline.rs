//! Linear pipeline assembly and lifecycle.
//!
//! A pipeline is `source, transform*, sink` with one buffer on every edge.
//! Stages only share those buffers and the [`PipelineContext`]; the
//! controller watches the exception handler and tears everything down on the
//! first fatal condition.

use super::context::PipelineContext;
use super::control::{ControlCommand, ControlResponse, QueueDepth};
use super::ingest::StreamIngestionAdapter;
use super::scheduler::{StageExit, StageScheduler};
use super::stages::{IngestStage, SinkStage, TransformStage};
use super::state::PipelineState;
use crate::buffers::{BufferKind, SharedBuffer};
use crate::config::{PipelineConfig, StageConfig};
use crate::core::{PipelineStage, RecordHook, RecordMapper, RecordSink};
use crate::error::{PipelineError, Result};
use crate::observability::{MetricsCollector, PipelineReport};
use crate::registry::ComponentRegistry;
use crate::resilience::{DataFaultPolicy, FatalCondition};
use crate::sources::StreamSource;
use std::collections::HashSet;
use std::time::{Duration, Instant};

const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

enum StagePlan {
    Source {
        name: String,
        source: Box<dyn StreamSource>,
        batch_size: usize,
    },
    Transform {
        name: String,
        mapper: Box<dyn RecordMapper>,
        batch_size: usize,
        policy: DataFaultPolicy,
    },
    Sink {
        name: String,
        sink: Box<dyn RecordSink>,
        batch_size: usize,
    },
}

impl StagePlan {
    fn name(&self) -> &str {
        match self {
            StagePlan::Source { name, .. }
            | StagePlan::Transform { name, .. }
            | StagePlan::Sink { name, .. } => name,
        }
    }

    fn batch_size(&self) -> usize {
        match self {
            StagePlan::Source { batch_size, .. }
            | StagePlan::Transform { batch_size, .. }
            | StagePlan::Sink { batch_size, .. } => *batch_size,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            StagePlan::Source { .. } => "source",
            StagePlan::Transform { .. } => "transform",
            StagePlan::Sink { .. } => "sink",
        }
    }
}

/// Collects stages in order, then wires them with buffers.
pub struct PipelineBuilder {
    context: PipelineContext,
    buffer_kind: BufferKind,
    idle_interval: Duration,
    drain_timeout: Duration,
    hook: Option<Box<dyn RecordHook>>,
    plans: Vec<StagePlan>,
}

impl PipelineBuilder {
    pub fn new(context: PipelineContext) -> Self {
        Self {
            context,
            buffer_kind: BufferKind::default(),
            idle_interval: DEFAULT_IDLE_INTERVAL,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            hook: None,
            plans: Vec::new(),
        }
    }

    pub fn buffer_kind(mut self, kind: BufferKind) -> Self {
        self.buffer_kind = kind;
        self
    }

    pub fn idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    /// Longest a clean [`Pipeline::stop`] waits for queued records
    pub fn drain_timeout(mut self, limit: Duration) -> Self {
        self.drain_timeout = limit;
        self
    }

    pub fn source(
        mut self,
        name: impl Into<String>,
        source: Box<dyn StreamSource>,
        batch_size: usize,
    ) -> Self {
        self.plans.push(StagePlan::Source {
            name: name.into(),
            source,
            batch_size,
        });
        self
    }

    /// Per-record hook for the source's ingestion adapter
    pub fn hook(mut self, hook: impl RecordHook + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn transform(
        mut self,
        name: impl Into<String>,
        mapper: Box<dyn RecordMapper>,
        batch_size: usize,
        policy: DataFaultPolicy,
    ) -> Self {
        self.plans.push(StagePlan::Transform {
            name: name.into(),
            mapper,
            batch_size,
            policy,
        });
        self
    }

    pub fn sink(mut self, name: impl Into<String>, sink: Box<dyn RecordSink>, batch_size: usize) -> Self {
        self.plans.push(StagePlan::Sink {
            name: name.into(),
            sink,
            batch_size,
        });
        self
    }

    fn check_layout(&self) -> Result<()> {
        if self.plans.len() < 2 {
            return Err(PipelineError::Layout(
                "a pipeline needs at least a source and a sink".to_string(),
            ));
        }

        let last = self.plans.len() - 1;
        let mut names = HashSet::new();
        for (index, plan) in self.plans.iter().enumerate() {
            let expected = match index {
                0 => "source",
                i if i == last => "sink",
                _ => "transform",
            };
            if plan.kind() != expected {
                return Err(PipelineError::Layout(format!(
                    "stage {} ('{}') is a {}, expected a {}",
                    index,
                    plan.name(),
                    plan.kind(),
                    expected
                )));
            }
            if !names.insert(plan.name()) {
                return Err(PipelineError::Layout(format!(
                    "duplicate stage name '{}'",
                    plan.name()
                )));
            }
            if plan.batch_size() == 0 {
                return Err(PipelineError::Layout(format!(
                    "stage '{}' has a zero batch size",
                    plan.name()
                )));
            }
        }
        Ok(())
    }

    pub fn build(self) -> Result<Pipeline> {
        self.check_layout()?;

        let buffers: Vec<SharedBuffer> = self
            .plans
            .windows(2)
            .map(|pair| self.buffer_kind.create(pair[0].name(), pair[1].name()))
            .collect();

        let mut collector = MetricsCollector::new();
        let mut stages: Vec<Box<dyn PipelineStage>> = Vec::with_capacity(self.plans.len());
        let mut hook = self.hook;

        for (index, plan) in self.plans.into_iter().enumerate() {
            let metrics = collector.register(plan.name());

            let stage: Box<dyn PipelineStage> = match plan {
                StagePlan::Source {
                    name,
                    source,
                    batch_size,
                } => {
                    let mut adapter =
                        StreamIngestionAdapter::new(name, source, batch_size, self.context.clone());
                    if let Some(hook) = hook.take() {
                        adapter = adapter.with_boxed_hook(hook);
                    }
                    Box::new(IngestStage::new(adapter, buffers[0].clone()))
                }
                StagePlan::Transform {
                    name,
                    mapper,
                    batch_size,
                    policy,
                } => Box::new(
                    TransformStage::new(
                        name,
                        buffers[index - 1].clone(),
                        buffers[index].clone(),
                        mapper,
                        batch_size,
                    )
                    .with_policy(policy)
                    .with_metrics(metrics),
                ),
                StagePlan::Sink {
                    name,
                    sink,
                    batch_size,
                } => Box::new(SinkStage::new(
                    name,
                    buffers[index - 1].clone(),
                    sink,
                    batch_size,
                )),
            };
            stages.push(stage);
        }

        tracing::debug!(
            "pipeline '{}' assembled: {} stages, {} {:?} buffers",
            self.context.name(),
            stages.len(),
            buffers.len(),
            self.buffer_kind
        );

        Ok(Pipeline {
            context: self.context,
            state: PipelineState::Idle,
            idle_interval: self.idle_interval,
            drain_timeout: self.drain_timeout,
            stage_names: stages.iter().map(|s| s.name().to_string()).collect(),
            pending: stages,
            buffers,
            collector,
            scheduler: None,
        })
    }
}

pub struct Pipeline {
    context: PipelineContext,
    state: PipelineState,
    idle_interval: Duration,
    drain_timeout: Duration,
    stage_names: Vec<String>,
    pending: Vec<Box<dyn PipelineStage>>,
    buffers: Vec<SharedBuffer>,
    collector: MetricsCollector,
    scheduler: Option<StageScheduler>,
}

impl Pipeline {
    pub fn builder(context: PipelineContext) -> PipelineBuilder {
        PipelineBuilder::new(context)
    }

    pub fn from_config(config: &PipelineConfig, registry: &ComponentRegistry) -> Result<Self> {
        Self::from_config_in(config, registry, PipelineContext::new(&config.name))
    }

    /// Assemble from configuration inside an existing context. Component
    /// construction failures are reported as initialization faults before
    /// being returned.
    pub fn from_config_in(
        config: &PipelineConfig,
        registry: &ComponentRegistry,
        context: PipelineContext,
    ) -> Result<Self> {
        config.validate()?;

        let mut builder = Pipeline::builder(context.clone())
            .buffer_kind(config.buffer)
            .idle_interval(config.idle_interval())
            .drain_timeout(config.drain_timeout());

        for stage in &config.stages {
            builder = match add_stage(builder, stage, registry) {
                Ok(builder) => builder,
                Err(e) => {
                    context.report(FatalCondition::from_error(stage.name(), &e));
                    return Err(e);
                }
            };
        }
        builder.build()
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn buffers(&self) -> &[SharedBuffer] {
        &self.buffers
    }

    pub fn stage_names(&self) -> &[String] {
        &self.stage_names
    }

    pub fn report(&self) -> PipelineReport {
        let depths: Vec<usize> = self.buffers.iter().map(|b| b.event_count()).collect();
        PipelineReport::new(
            self.context.name(),
            self.state.name(),
            self.context.streams_opened(),
            self.collector.snapshot(),
            &depths,
        )
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.collector
    }

    fn transition_to(&mut self, next: PipelineState) -> Result<()> {
        if !self.state.can_transition_to(&next) {
            return Err(PipelineError::InvalidTransition {
                from: self.state.name().to_string(),
                to: next.name().to_string(),
            });
        }
        tracing::debug!(
            "pipeline '{}': {} -> {}",
            self.context.name(),
            self.state.name(),
            next.name()
        );
        self.state = next;
        Ok(())
    }

    /// Spawn every stage. Must be called inside a tokio runtime.
    pub async fn start(&mut self) -> Result<()> {
        self.transition_to(PipelineState::Initializing)?;

        if self.pending.is_empty() {
            let cause = "pipeline has already been run".to_string();
            self.transition_to(PipelineState::Failed {
                cause: cause.clone(),
            })?;
            return Err(PipelineError::Layout(cause));
        }

        let mut scheduler = StageScheduler::new(self.context.clone(), self.idle_interval);
        for stage in self.pending.drain(..) {
            let metrics = match self.collector.get(stage.name()) {
                Some(metrics) => metrics,
                None => self.collector.register(stage.name()),
            };
            scheduler.spawn(stage, metrics);
        }
        self.scheduler = Some(scheduler);

        self.transition_to(PipelineState::Running {
            start_time: Some(Instant::now()),
        })?;
        tracing::info!(
            "pipeline '{}' running with {} stages",
            self.context.name(),
            self.stage_names.len()
        );
        Ok(())
    }

    /// Resolve once any stage has reported a fatal condition.
    pub async fn wait_for_fault(&self, poll_interval: Duration) {
        let exceptions = self.context.exceptions();
        while !exceptions.has_error() {
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Run until the first fatal condition, then abort every stage and
    /// return that condition.
    pub async fn supervise(&mut self, poll_interval: Duration) -> Result<()> {
        self.wait_for_fault(poll_interval).await;

        for condition in self.context.exceptions().exception_list() {
            tracing::error!("pipeline '{}': {}", self.context.name(), condition);
        }
        if self.state.is_running() {
            self.abort().await?;
        }
        self.context.exceptions().rethrow_exception()
    }

    /// Clean stop: the source is stopped first and every downstream stage is
    /// stopped once its input buffer has drained, so records already read are
    /// delivered.
    pub async fn stop(&mut self) -> Result<()> {
        self.transition_to(PipelineState::Stopping)?;

        let exits = match self.scheduler.as_mut() {
            Some(scheduler) => scheduler.drain(self.drain_timeout).await,
            None => Vec::new(),
        };
        self.finish(exits)
    }

    /// Immediate stop: every stage is signalled at once and records still
    /// queued are dropped. Used on the fault path.
    pub async fn abort(&mut self) -> Result<()> {
        self.transition_to(PipelineState::Stopping)?;

        let exits = match self.scheduler.as_mut() {
            Some(scheduler) => scheduler.shutdown().await,
            None => Vec::new(),
        };
        let dropped: usize = self.buffers.iter().map(|b| b.event_count()).sum();
        if dropped > 0 {
            tracing::warn!(
                "pipeline '{}': dropped {} queued records",
                self.context.name(),
                dropped
            );
        }
        self.finish(exits)
    }

    fn finish(&mut self, exits: Vec<(String, StageExit)>) -> Result<()> {
        for (stage, exit) in &exits {
            if *exit == StageExit::Failed {
                tracing::warn!("stage '{}' ended after a failure", stage);
            }
        }

        let records_consumed = self
            .stage_names
            .last()
            .and_then(|sink| self.collector.get(sink))
            .map(|metrics| metrics.records())
            .unwrap_or(0);

        let exceptions = self.context.exceptions();
        if exceptions.has_error() {
            let cause = exceptions
                .exception_list()
                .first()
                .map(|c| c.to_string())
                .unwrap_or_default();
            self.transition_to(PipelineState::Failed { cause })?;
        } else {
            self.transition_to(PipelineState::Stopped { records_consumed })?;
        }

        tracing::info!(
            "pipeline '{}' stopped: sink consumed {} records, {} streams opened",
            self.context.name(),
            records_consumed,
            self.context.streams_opened()
        );
        Ok(())
    }

    pub fn active_stages(&self) -> usize {
        self.scheduler
            .as_ref()
            .map(|s| s.active_count())
            .unwrap_or(0)
    }

    pub fn queue_depths(&self) -> Vec<QueueDepth> {
        self.buffers
            .iter()
            .map(|buffer| {
                let supplier = buffer.supplier();
                let consumer = buffer.consumer();
                QueueDepth {
                    buffer: format!("{}->{}", supplier, consumer),
                    supplier,
                    consumer,
                    depth: buffer.event_count(),
                }
            })
            .collect()
    }

    pub fn handle_control(&self, command: ControlCommand) -> ControlResponse {
        match command {
            ControlCommand::QueueDepth { buffer: None } => ControlResponse::QueueDepths {
                buffers: self.queue_depths(),
            },
            ControlCommand::QueueDepth {
                buffer: Some(filter),
            } => {
                let buffers: Vec<QueueDepth> = self
                    .queue_depths()
                    .into_iter()
                    .filter(|q| q.buffer == filter || q.supplier == filter || q.consumer == filter)
                    .collect();
                if buffers.is_empty() {
                    ControlResponse::error(format!("no buffer matches '{}'", filter))
                } else {
                    ControlResponse::QueueDepths { buffers }
                }
            }
            ControlCommand::ListErrors => ControlResponse::Errors {
                errors: self.context.exceptions().exception_list(),
            },
            ControlCommand::ClearErrors => ControlResponse::Cleared {
                count: self.context.exceptions().clear_exceptions(),
            },
            ControlCommand::Status => ControlResponse::Status {
                pipeline: self.context.name().to_string(),
                state: self.state.name().to_string(),
                active_stages: self.active_stages(),
                streams_opened: self.context.streams_opened(),
                has_error: self.context.exceptions().has_error(),
            },
            ControlCommand::Metrics => ControlResponse::Metrics {
                stages: self.collector.snapshot(),
            },
        }
    }
}

fn add_stage(
    builder: PipelineBuilder,
    stage: &StageConfig,
    registry: &ComponentRegistry,
) -> Result<PipelineBuilder> {
    Ok(match stage {
        StageConfig::Source {
            name,
            source_type,
            batch_size,
            config,
        } => builder.source(
            name.as_str(),
            registry.create_source(source_type, config)?,
            *batch_size,
        ),
        StageConfig::Transform {
            name,
            mapper_type,
            batch_size,
            on_data_fault,
            config,
        } => builder.transform(
            name.as_str(),
            registry.create_mapper(mapper_type, config)?,
            *batch_size,
            *on_data_fault,
        ),
        StageConfig::Sink {
            name,
            sink_type,
            batch_size,
            config,
        } => builder.sink(
            name.as_str(),
            registry.create_sink(sink_type, name, config)?,
            *batch_size,
        ),
    })
}
