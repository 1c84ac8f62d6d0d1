use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use orbit_model::PipelineResult;

use crate::orchestrator::PipelineOrchestrator;

const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(60);
const DEFAULT_FACTOR: u32 = 2;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Exponential backoff schedule for re-enqueued cycles.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_delay: Duration,
    factor: u32,
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            factor: DEFAULT_FACTOR,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, factor: u32, max_attempts: u32) -> Self {
        Self {
            base_delay,
            factor,
            max_attempts,
        }
    }

    /// Delay before retry number `attempt` (zero-based), or `None` once
    /// the attempt budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(self.base_delay * self.factor.pow(attempt))
    }
}

/// Queue-runtime boundary around the orchestrator.
///
/// The orchestrator itself never signals retries through errors; it tags
/// results instead. This adapter is the one place that inspects the
/// marker and re-enqueues, so retry handling stays out of the
/// orchestration logic.
pub struct CycleJob {
    orchestrator: Arc<PipelineOrchestrator>,
    policy: RetryPolicy,
}

impl CycleJob {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        Self {
            orchestrator,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run a scheduled cycle, re-running retryable failures with backoff.
    ///
    /// `skipped`, `noData` and `processingFailed` are legitimate outcomes
    /// and return immediately; only results tagged retryable burn an
    /// attempt. Returns the last result when the budget runs out.
    pub async fn run(&self, force_refresh: bool) -> PipelineResult {
        let mut attempt = 0;
        loop {
            let result = self.orchestrator.run_scraping_cycle(force_refresh).await;
            if !result.retryable {
                return result;
            }
            match self.policy.delay_for(attempt) {
                Some(delay) => {
                    warn!(
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "cycle failed, re-enqueueing"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    info!(attempt, "retry budget exhausted");
                    return result;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use orbit_lock::LockManager;
    use orbit_model::{PipelineStatus, ProcessedRecord, RawRecord};
    use orbit_store::MemoryStore;

    use crate::error::StageError;
    use crate::stages::{PersistOutput, Persister, SourceFetcher, TransformOutput, Transformer};

    struct PassThrough;

    #[async_trait]
    impl Transformer for PassThrough {
        async fn transform(&self, records: Vec<RawRecord>) -> Result<TransformOutput, StageError> {
            Ok(TransformOutput {
                records: records
                    .into_iter()
                    .enumerate()
                    .map(|(i, r)| ProcessedRecord {
                        slug: format!("rec-{i}"),
                        payload: r.payload,
                    })
                    .collect(),
                dropped: 0,
                conflicts: 0,
            })
        }
    }

    struct SilentPersister;

    #[async_trait]
    impl Persister for SilentPersister {
        async fn persist(&self, records: Vec<ProcessedRecord>) -> Result<PersistOutput, StageError> {
            Ok(PersistOutput {
                created: records.len(),
                updated: 0,
            })
        }
    }

    /// Fails the first `failures` fetches, then returns one record.
    struct FlakyFetcher {
        failures: usize,
        calls: AtomicUsize,
    }

    impl FlakyFetcher {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceFetcher for FlakyFetcher {
        fn name(&self) -> &str {
            "press-site"
        }

        async fn fetch(&self, _force_refresh: bool) -> Result<Vec<RawRecord>, StageError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(StageError::fetch("upstream returned 503"));
            }
            Ok(vec![RawRecord {
                source: "press-site".to_string(),
                fetched_at: std::time::SystemTime::now(),
                payload: serde_json::json!({}),
            }])
        }
    }

    fn job(fetcher: Arc<FlakyFetcher>) -> CycleJob {
        let store = Arc::new(MemoryStore::new());
        let orch = PipelineOrchestrator::new(
            Arc::new(LockManager::new(store)),
            vec![fetcher],
            Arc::new(PassThrough),
            Arc::new(SilentPersister),
        );
        CycleJob::new(Arc::new(orch))
    }

    #[test]
    fn backoff_doubles_and_then_stops() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Some(Duration::from_secs(60)));
        assert_eq!(policy.delay_for(1), Some(Duration::from_secs(120)));
        assert_eq!(policy.delay_for(2), Some(Duration::from_secs(240)));
        assert_eq!(policy.delay_for(3), None);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_until_it_succeeds() {
        let fetcher = FlakyFetcher::new(2);
        let result = job(fetcher.clone()).run(false).await;

        assert_eq!(result.status, PipelineStatus::Success);
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_returns_the_last_failure() {
        let fetcher = FlakyFetcher::new(usize::MAX);
        let result = job(fetcher.clone()).run(false).await;

        assert_eq!(result.status, PipelineStatus::Failed);
        assert!(result.retryable);
        // Initial attempt plus the three scheduled retries.
        assert_eq!(fetcher.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn expected_outcomes_are_never_retried() {
        struct Empty;

        #[async_trait]
        impl SourceFetcher for Empty {
            fn name(&self) -> &str {
                "press-site"
            }

            async fn fetch(&self, _force_refresh: bool) -> Result<Vec<RawRecord>, StageError> {
                Ok(Vec::new())
            }
        }

        let store = Arc::new(MemoryStore::new());
        let orch = PipelineOrchestrator::new(
            Arc::new(LockManager::new(store)),
            vec![Arc::new(Empty)],
            Arc::new(PassThrough),
            Arc::new(SilentPersister),
        );
        let result = CycleJob::new(Arc::new(orch)).run(false).await;

        assert_eq!(result.status, PipelineStatus::NoData);
    }
}
