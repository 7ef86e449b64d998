//! Prometheus metrics for pipeline observability.
//!
//! The core emits signals through the [`MetricsSink`] trait and never
//! depends on a concrete registry, so tests can substitute a no-op or
//! recording sink. Implementations must not block the caller.

use prometheus::{IntCounterVec, Opts, Registry};

use crate::models::TaskState;

/// Side-channel sink for task lifecycle signals.
pub trait MetricsSink: Send + Sync {
    /// Count one task observed in `state`.
    fn record_state(&self, state: TaskState);

    /// Count one completed task of the given type.
    fn record_processed(&self, kind: i32);
}

/// Sink that discards every signal.
#[derive(Debug, Default)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn record_state(&self, _state: TaskState) {}
    fn record_processed(&self, _kind: i32) {}
}

/// Prometheus-backed sink.
///
/// Registers `tasks_processed_total{type}` and `tasks_state_count{state}`
/// with the given registry; counter increments are lock-free.
pub struct PrometheusMetricsSink {
    tasks_processed: IntCounterVec,
    task_state: IntCounterVec,
}

impl PrometheusMetricsSink {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let tasks_processed = IntCounterVec::new(
            Opts::new("tasks_processed_total", "Total number of tasks processed"),
            &["type"],
        )?;
        let task_state = IntCounterVec::new(
            Opts::new("tasks_state_count", "Number of tasks in each state"),
            &["state"],
        )?;
        registry.register(Box::new(tasks_processed.clone()))?;
        registry.register(Box::new(task_state.clone()))?;
        Ok(Self {
            tasks_processed,
            task_state,
        })
    }
}

impl MetricsSink for PrometheusMetricsSink {
    fn record_state(&self, state: TaskState) {
        self.task_state.with_label_values(&[state.as_str()]).inc();
    }

    fn record_processed(&self, kind: i32) {
        self.tasks_processed
            .with_label_values(&[kind.to_string().as_str()])
            .inc();
    }
}

/// Sink that remembers every signal, for asserting emission order in tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingMetricsSink {
    pub states: std::sync::Mutex<Vec<TaskState>>,
    pub processed: std::sync::Mutex<Vec<i32>>,
}

#[cfg(test)]
impl MetricsSink for RecordingMetricsSink {
    fn record_state(&self, state: TaskState) {
        self.states.lock().unwrap().push(state);
    }

    fn record_processed(&self, kind: i32) {
        self.processed.lock().unwrap().push(kind);
    }
}
