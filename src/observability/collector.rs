use super::StageMetrics;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub stage: String,
    pub cycles: u64,
    pub idle_cycles: u64,
    pub records: u64,
    pub errors: u64,
    pub discarded: u64,
    pub avg_busy_latency_us: u64,
}

/// Stage metrics in pipeline order
#[derive(Clone, Default)]
pub struct MetricsCollector {
    metrics: Vec<Arc<StageMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and track metrics for `stage`.
    pub fn register(&mut self, stage: impl Into<String>) -> Arc<StageMetrics> {
        let metrics = Arc::new(StageMetrics::new(stage));
        self.metrics.push(metrics.clone());
        metrics
    }

    pub fn snapshot(&self) -> Vec<MetricsSnapshot> {
        self.metrics
            .iter()
            .map(|m| MetricsSnapshot {
                stage: m.stage().to_string(),
                cycles: m.cycles(),
                idle_cycles: m.idle_cycles(),
                records: m.records(),
                errors: m.errors(),
                discarded: m.discarded(),
                avg_busy_latency_us: m.avg_busy_latency_us(),
            })
            .collect()
    }

    pub fn get(&self, stage: &str) -> Option<Arc<StageMetrics>> {
        self.metrics.iter().find(|m| m.stage() == stage).cloned()
    }
}
