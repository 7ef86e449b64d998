//! Task processor: drives one task through its full lifecycle per dispatch
//! call, from admission through simulated work to persistence.
//!
//! The suspension stands in for variable-cost work. Its placement after
//! admission and before persistence is deliberate: admission control must
//! throttle concurrency before expensive work begins, and the store only
//! ever records fully-completed work.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;

use crate::error::{PipelineError, PipelineResult};
use crate::limiter::AdmissionLimiter;
use crate::metrics::MetricsSink;
use crate::models::{NewTask, TaskState};
use crate::store::TaskStore;

/// Suspension primitive for the simulated-work delay.
///
/// Swappable so unit tests are not required to wait real milliseconds.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real suspension on the tokio timer.
#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Orchestrates one task's lifecycle using the limiter, store and metrics
/// sink handed to it at startup. Holds no global state.
pub struct TaskProcessor {
    limiter: Arc<AdmissionLimiter>,
    store: Arc<dyn TaskStore>,
    metrics: Arc<dyn MetricsSink>,
    sleeper: Arc<dyn Sleeper>,
}

impl TaskProcessor {
    pub fn new(
        limiter: Arc<AdmissionLimiter>,
        store: Arc<dyn TaskStore>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self::with_sleeper(limiter, store, metrics, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(
        limiter: Arc<AdmissionLimiter>,
        store: Arc<dyn TaskStore>,
        metrics: Arc<dyn MetricsSink>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            limiter,
            store,
            metrics,
            sleeper,
        }
    }

    /// Drive one task from `received` to `done` and persist the outcome.
    ///
    /// The task is written to the store exactly once, after reaching `done`;
    /// a deadline hit at either suspension point (the limiter wait or the
    /// simulated work) aborts with nothing persisted. `value` is the
    /// simulated processing duration in milliseconds; negative values are
    /// accepted on the wire and treated as zero cost.
    pub async fn process(
        &self,
        kind: i32,
        value: i32,
        deadline: Option<Instant>,
    ) -> PipelineResult<()> {
        let now = Utc::now();
        let mut task = NewTask {
            kind,
            value,
            state: TaskState::Received,
            created_at: now,
            updated_at: now,
        };
        self.metrics.record_state(task.state);

        self.limiter.acquire(deadline).await?;

        let cost = Duration::from_millis(value.max(0) as u64);
        match deadline {
            Some(d) => tokio::time::timeout_at(d, self.sleeper.sleep(cost))
                .await
                .map_err(|_| PipelineError::ProcessingCancelled)?,
            None => self.sleeper.sleep(cost).await,
        }

        task.state = TaskState::Done;
        task.updated_at = Utc::now();
        self.metrics.record_state(task.state);

        self.store
            .insert(task)
            .await
            .map_err(PipelineError::PersistenceFailed)?;
        self.metrics.record_processed(kind);
        log::info!("task persisted: type={} value={} state=done", kind, value);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::metrics::{NoopMetricsSink, RecordingMetricsSink};
    use crate::store::MemoryTaskStore;
    use futures_util::future::join_all;

    fn processor_with(
        rate: f64,
        burst: u32,
        store: Arc<dyn TaskStore>,
        metrics: Arc<dyn MetricsSink>,
    ) -> TaskProcessor {
        TaskProcessor::new(Arc::new(AdmissionLimiter::new(rate, burst)), store, metrics)
    }

    /// Store whose writes always fail, for exercising the persistence path.
    struct BrokenStore;

    #[async_trait]
    impl TaskStore for BrokenStore {
        async fn insert(&self, _task: NewTask) -> Result<(), StoreError> {
            Err(StoreError::Pool("connection refused".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_process_persists_one_done_row() {
        let store = Arc::new(MemoryTaskStore::new());
        let processor = processor_with(10.0, 5, store.clone(), Arc::new(NoopMetricsSink));

        let start = Instant::now();
        processor.process(2, 50, None).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(50));
        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, 2);
        assert_eq!(rows[0].value, 50);
        assert_eq!(rows[0].state, TaskState::Done);
        assert!(rows[0].updated_at >= rows[0].created_at);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_value_skips_the_suspension() {
        let store = Arc::new(MemoryTaskStore::new());
        let processor = processor_with(10.0, 5, store.clone(), Arc::new(NoopMetricsSink));

        let start = Instant::now();
        processor.process(1, 0, None).await.unwrap();

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(store.rows()[0].state, TaskState::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn negative_value_is_treated_as_zero_cost() {
        let store = Arc::new(MemoryTaskStore::new());
        let processor = processor_with(10.0, 5, store.clone(), Arc::new(NoopMetricsSink));

        processor.process(3, -5, None).await.unwrap();
        assert_eq!(store.rows().len(), 1);
        assert_eq!(store.rows()[0].value, -5);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_cancels_admission_without_persisting() {
        let store = Arc::new(MemoryTaskStore::new());
        let processor = processor_with(1.0, 1, store.clone(), Arc::new(NoopMetricsSink));

        let res = processor.process(1, 0, Some(Instant::now())).await;
        assert!(matches!(res, Err(PipelineError::AdmissionCancelled)));
        assert!(store.rows().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_limiter_wait_cancels_admission() {
        let store = Arc::new(MemoryTaskStore::new());
        let processor = processor_with(1.0, 1, store.clone(), Arc::new(NoopMetricsSink));

        // Drain the only burst token, then ask for another with a deadline
        // shorter than the refill interval.
        processor.process(1, 0, None).await.unwrap();
        let res = processor
            .process(1, 0, Some(Instant::now() + Duration::from_millis(100)))
            .await;

        assert!(matches!(res, Err(PipelineError::AdmissionCancelled)));
        assert_eq!(store.rows().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_simulated_work_cancels_processing() {
        let store = Arc::new(MemoryTaskStore::new());
        let processor = processor_with(10.0, 5, store.clone(), Arc::new(NoopMetricsSink));

        let res = processor
            .process(1, 5_000, Some(Instant::now() + Duration::from_millis(100)))
            .await;

        assert!(matches!(res, Err(PipelineError::ProcessingCancelled)));
        assert!(store.rows().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_failure_is_surfaced_not_swallowed() {
        let metrics = Arc::new(RecordingMetricsSink::default());
        let processor = processor_with(10.0, 5, Arc::new(BrokenStore), metrics.clone());

        let res = processor.process(4, 0, None).await;
        assert!(matches!(res, Err(PipelineError::PersistenceFailed(_))));

        // Both state observations fired, but no processed count: the task
        // never made it into the store.
        assert_eq!(
            *metrics.states.lock().unwrap(),
            vec![TaskState::Received, TaskState::Done]
        );
        assert!(metrics.processed.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn signals_are_emitted_in_lifecycle_order() {
        let store = Arc::new(MemoryTaskStore::new());
        let metrics = Arc::new(RecordingMetricsSink::default());
        let processor = processor_with(10.0, 5, store, metrics.clone());

        processor.process(2, 0, None).await.unwrap();

        assert_eq!(
            *metrics.states.lock().unwrap(),
            vec![TaskState::Received, TaskState::Done]
        );
        assert_eq!(*metrics.processed.lock().unwrap(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_calls_all_persist_under_rate_limit() {
        let store = Arc::new(MemoryTaskStore::new());
        let processor = Arc::new(processor_with(
            1.0,
            2,
            store.clone(),
            Arc::new(NoopMetricsSink),
        ));

        let start = Instant::now();
        let handles: Vec<_> = (0..5)
            .map(|i| {
                let processor = processor.clone();
                tokio::spawn(async move { processor.process(i, 0, None).await })
            })
            .collect();
        for res in join_all(handles).await {
            res.unwrap().unwrap();
        }

        // Two admitted from the burst, the rest at one per second.
        assert_eq!(store.rows().len(), 5);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
