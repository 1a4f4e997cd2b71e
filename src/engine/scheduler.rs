use super::context::PipelineContext;
use crate::buffers::{SharedBuffer, WakeMonitor};
use crate::core::{CycleOutcome, PipelineStage};
use crate::observability::StageMetrics;
use crate::resilience::FatalCondition;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};

const DRAIN_POLL: Duration = Duration::from_millis(5);

/// How a stage task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageExit {
    /// Shutdown was requested
    Shutdown,

    /// A cycle failed and the failure was reported
    Failed,
}

struct StageTask {
    name: String,
    input: Option<SharedBuffer>,
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<StageExit>,
}

/// Runs one cooperative loop per stage on the tokio runtime
pub struct StageScheduler {
    context: PipelineContext,
    idle_interval: Duration,
    tasks: Vec<StageTask>,
}

impl StageScheduler {
    pub fn new(context: PipelineContext, idle_interval: Duration) -> Self {
        Self {
            context,
            idle_interval,
            tasks: Vec::new(),
        }
    }

    /// Spawn the loop for `stage`. An idle stage sleeps until its input buffer
    /// is pushed to, `idle_interval` elapses, or shutdown is signalled.
    pub fn spawn(&mut self, mut stage: Box<dyn PipelineStage>, metrics: Arc<StageMetrics>) {
        let name = stage.name().to_string();
        let wake = Arc::new(WakeMonitor::new());
        let input = stage.input();
        if let Some(input) = &input {
            input.register_monitor(wake.clone());
        }

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let context = self.context.clone();
        let idle_interval = self.idle_interval;

        let handle = tokio::spawn(async move {
            tracing::debug!("stage '{}' started", stage.name());

            let exit = loop {
                if shutdown_rx.try_recv().is_ok() {
                    break StageExit::Shutdown;
                }

                let start = metrics.start_cycle();
                match stage.run_cycle().await {
                    Ok(CycleOutcome::Progress(records)) => {
                        metrics.finish_cycle(start, records);
                        tokio::task::yield_now().await;
                    }
                    Ok(CycleOutcome::Idle) => {
                        metrics.finish_cycle(start, 0);
                        tokio::select! {
                            _ = wake.wait() => {}
                            _ = tokio::time::sleep(idle_interval) => {}
                            _ = shutdown_rx.recv() => break StageExit::Shutdown,
                        }
                    }
                    Err(e) => {
                        metrics.record_error();
                        context.report(FatalCondition::from_error(stage.name(), &e));
                        break StageExit::Failed;
                    }
                }
            };

            if let Err(e) = stage.on_destroy().await {
                metrics.record_error();
                context.report(FatalCondition::from_error(stage.name(), &e));
            }
            tracing::debug!("stage '{}' stopped ({:?})", stage.name(), exit);
            exit
        });

        self.tasks.push(StageTask {
            name,
            input,
            shutdown_tx,
            handle,
        });
    }

    pub fn active_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.handle.is_finished()).count()
    }

    pub fn stage_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every stage to stop at once and wait for them, in spawn order.
    /// Records still queued in buffers are dropped.
    pub async fn shutdown(&mut self) -> Vec<(String, StageExit)> {
        for task in &self.tasks {
            let _ = task.shutdown_tx.send(());
        }

        let mut exits = Vec::with_capacity(self.tasks.len());
        for task in std::mem::take(&mut self.tasks) {
            exits.push(self.join(task).await);
        }
        exits
    }

    /// Stop stages one at a time in spawn order. Each stage is signalled only
    /// once its upstream has exited and its input buffer is empty, so queued
    /// records reach the sink. Whatever is still queued at `limit` is dropped.
    pub async fn drain(&mut self, limit: Duration) -> Vec<(String, StageExit)> {
        let deadline = Instant::now() + limit;

        let mut exits = Vec::with_capacity(self.tasks.len());
        for task in std::mem::take(&mut self.tasks) {
            if let Some(input) = &task.input {
                let emptied = timeout_at(deadline, async {
                    while input.event_count() > 0 && !task.handle.is_finished() {
                        tokio::time::sleep(DRAIN_POLL).await;
                    }
                })
                .await;
                if emptied.is_err() {
                    tracing::warn!(
                        "stage '{}': drain timed out with {} records queued",
                        task.name,
                        input.event_count()
                    );
                }
            }

            let _ = task.shutdown_tx.send(());
            exits.push(self.join(task).await);
        }
        exits
    }

    async fn join(&self, task: StageTask) -> (String, StageExit) {
        match task.handle.await {
            Ok(exit) => (task.name, exit),
            Err(e) => {
                self.context.report(FatalCondition::processing(
                    &task.name,
                    format!("stage task aborted: {}", e),
                ));
                (task.name, StageExit::Failed)
            }
        }
    }
}

impl Drop for StageScheduler {
    fn drop(&mut self) {
        // can't await here; tasks still notice the signal at their next cycle
        for task in &self.tasks {
            let _ = task.shutdown_tx.send(());
        }
    }
}
