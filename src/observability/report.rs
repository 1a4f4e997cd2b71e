use super::MetricsSnapshot;
use serde::Serialize;
use std::fmt;

/// One stage's row in a [`PipelineReport`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    #[serde(flatten)]
    pub metrics: MetricsSnapshot,

    /// Records waiting in the stage's input buffer. `None` for the source.
    pub queued: Option<usize>,
}

/// Point-in-time view of a pipeline: lifecycle state, then one row per stage
/// in flow order with its metrics and input backlog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub pipeline: String,
    pub state: String,
    pub streams_opened: u64,
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    /// Pair each stage with its input depth. `input_depths[i]` belongs to
    /// the stage after the first, so it is one shorter than `stages`.
    pub fn new(
        pipeline: impl Into<String>,
        state: impl Into<String>,
        streams_opened: u64,
        stages: Vec<MetricsSnapshot>,
        input_depths: &[usize],
    ) -> Self {
        let stages = stages
            .into_iter()
            .enumerate()
            .map(|(index, metrics)| StageReport {
                metrics,
                queued: index
                    .checked_sub(1)
                    .and_then(|input| input_depths.get(input).copied()),
            })
            .collect();

        Self {
            pipeline: pipeline.into(),
            state: state.into(),
            streams_opened,
            stages,
        }
    }

    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.metrics.stage == name)
    }

    /// Records still sitting in buffers
    pub fn total_queued(&self) -> usize {
        self.stages.iter().filter_map(|s| s.queued).sum()
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "pipeline '{}' {} ({} streams opened)",
            self.pipeline, self.state, self.streams_opened
        )?;
        writeln!(
            f,
            "{:<16} {:>8} {:>10} {:>10} {:>7} {:>9} {:>10}",
            "stage", "queued", "records", "cycles", "errors", "discarded", "busy_us"
        )?;
        for stage in &self.stages {
            let m = &stage.metrics;
            let queued = stage
                .queued
                .map(|q| q.to_string())
                .unwrap_or_else(|| "-".to_string());
            writeln!(
                f,
                "{:<16} {:>8} {:>10} {:>10} {:>7} {:>9} {:>10}",
                m.stage, queued, m.records, m.cycles, m.errors, m.discarded, m.avg_busy_latency_us
            )?;
        }
        Ok(())
    }
}
