use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info, warn};

use orbit_lock::{LockError, LockManager};
use orbit_model::{
    FetchSummary, PersistSummary, PipelineResult, PipelineStatistics, PipelineStatus,
    RawRecord, SourceOutcome, TransformSummary,
};
use orbit_store::keys;

use crate::error::StageError;
use crate::stages::{Persister, SourceFetcher, Transformer};

const CYCLE_LOCK_NAME: &str = "refresh_cycle";
const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(3600);

/// Sequences one refresh cycle (fetch, transform, persist) under the
/// fleet-wide cycle lock.
///
/// At most one scheduled cycle runs fleet-wide at a time; overlapping
/// schedules land on a `skipped` result instead of queueing up. Stage
/// collaborators are injected, so the orchestrator owns sequencing and
/// outcome classification and nothing else.
pub struct PipelineOrchestrator {
    locks: Arc<LockManager>,
    fetchers: Vec<Arc<dyn SourceFetcher>>,
    transformer: Arc<dyn Transformer>,
    persister: Arc<dyn Persister>,
    lock_ttl: Duration,
    lock_wait: Duration,
}

impl PipelineOrchestrator {
    pub fn new(
        locks: Arc<LockManager>,
        fetchers: Vec<Arc<dyn SourceFetcher>>,
        transformer: Arc<dyn Transformer>,
        persister: Arc<dyn Persister>,
    ) -> Self {
        Self {
            locks,
            fetchers,
            transformer,
            persister,
            lock_ttl: DEFAULT_LOCK_TTL,
            lock_wait: Duration::ZERO,
        }
    }

    /// Override the cycle lock TTL. It must stay generous enough to
    /// cover the worst-case cycle duration.
    pub fn with_lock_ttl(mut self, lock_ttl: Duration) -> Self {
        self.lock_ttl = lock_ttl;
        self
    }

    /// How long a scheduled cycle waits for the lock before skipping.
    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    /// Key guarding the scheduled refresh cycle.
    pub fn cycle_lock_key() -> String {
        keys::lock(CYCLE_LOCK_NAME)
    }

    /// Run one scheduled refresh cycle under the fleet lock.
    ///
    /// A contended lock yields `skipped` without invoking any stage;
    /// the lock is released on every other exit path.
    pub async fn run_scraping_cycle(&self, force_refresh: bool) -> PipelineResult {
        let started_at = SystemTime::now();
        let key = Self::cycle_lock_key();

        let guard = match self.locks.acquire(&key, self.lock_ttl, self.lock_wait).await {
            Ok(guard) => guard,
            Err(LockError::Busy { holder, .. }) => {
                info!(holder, "refresh cycle already in flight, skipping");
                return PipelineResult::skipped(started_at, holder);
            }
            Err(e) => {
                warn!(error = %e, "could not reach the lock store");
                return PipelineResult::failed(started_at, e.to_string(), true, SystemTime::now());
            }
        };

        let result = self.run_stages(started_at, force_refresh, None).await;

        if let Err(e) = self.locks.release(&guard).await {
            // The TTL already reclaimed the key; nothing to clean up.
            warn!(error = %e, "cycle lock was not ours to release");
        }

        info!(status = ?result.status, "refresh cycle finished");
        result
    }

    /// Run the stages immediately, without taking the fleet lock.
    ///
    /// Operator path: it may overlap a scheduled cycle, which is accepted
    /// and logged rather than guarded against. `sources` restricts the
    /// fetch stage to the named fetchers.
    pub async fn run_manual_refresh(&self, sources: Option<Vec<String>>) -> PipelineResult {
        warn!(?sources, "manual refresh requested, fleet lock bypassed");
        let started_at = SystemTime::now();
        self.run_stages(started_at, true, sources.as_deref()).await
    }

    async fn run_stages(
        &self,
        started_at: SystemTime,
        force_refresh: bool,
        sources: Option<&[String]>,
    ) -> PipelineResult {
        let cycle_start = Instant::now();

        // Fetch: fan out over the sources, tolerating partial failures.
        let fetch_start = Instant::now();
        let selected: Vec<&Arc<dyn SourceFetcher>> = self
            .fetchers
            .iter()
            .filter(|f| sources.is_none_or(|names| names.iter().any(|n| n == f.name())))
            .collect();
        if selected.is_empty() {
            return PipelineResult::failed(
                started_at,
                "no fetchers match the requested sources",
                false,
                SystemTime::now(),
            );
        }

        let mut outcomes = Vec::with_capacity(selected.len());
        let mut records: Vec<RawRecord> = Vec::new();
        for fetcher in &selected {
            match fetcher.fetch(force_refresh).await {
                Ok(batch) => {
                    debug!(source = fetcher.name(), records = batch.len(), "source fetched");
                    outcomes.push(SourceOutcome {
                        source: fetcher.name().to_string(),
                        records: batch.len(),
                        error: None,
                    });
                    records.extend(batch);
                }
                Err(e) => {
                    warn!(source = fetcher.name(), error = %e, "source fetch failed");
                    outcomes.push(SourceOutcome {
                        source: fetcher.name().to_string(),
                        records: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        let fetch = FetchSummary {
            records: records.len(),
            sources: outcomes,
            duration_secs: fetch_start.elapsed().as_secs_f64(),
        };

        if fetch.sources.iter().all(|s| s.error.is_some()) {
            return PipelineResult::failed(
                started_at,
                StageError::fetch("every source failed").to_string(),
                true,
                SystemTime::now(),
            );
        }
        if records.is_empty() {
            info!("no records fetched, ending cycle");
            return PipelineResult::no_data(started_at, fetch, SystemTime::now());
        }

        // Transform: validate, dedup, reconcile.
        let transform_start = Instant::now();
        let output = match self.transformer.transform(records).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "transform stage failed");
                return PipelineResult::failed(started_at, e.to_string(), true, SystemTime::now());
            }
        };
        let transform = TransformSummary {
            processed: output.records.len(),
            dropped: output.dropped,
            conflicts: output.conflicts,
            duration_secs: transform_start.elapsed().as_secs_f64(),
        };

        if output.records.is_empty() {
            warn!(
                dropped = transform.dropped,
                "transform yielded nothing usable, ending cycle"
            );
            return PipelineResult::processing_failed(
                started_at,
                fetch,
                transform,
                SystemTime::now(),
            );
        }

        // Persist: idempotent upsert by slug.
        let persist_start = Instant::now();
        let upserted = match self.persister.persist(output.records).await {
            Ok(upserted) => upserted,
            Err(e) => {
                warn!(error = %e, "persist stage failed");
                return PipelineResult::failed(started_at, e.to_string(), true, SystemTime::now());
            }
        };
        let persist = PersistSummary {
            created: upserted.created,
            updated: upserted.updated,
            total: upserted.created + upserted.updated,
            duration_secs: persist_start.elapsed().as_secs_f64(),
        };

        let statistics = PipelineStatistics {
            duration_secs: cycle_start.elapsed().as_secs_f64(),
            fetch_ok: fetch.sources.iter().all(|s| s.error.is_none()),
            transform_ok: true,
            persist_ok: true,
            records_fetched: fetch.records,
            records_processed: transform.processed,
            conflicts_detected: transform.conflicts,
            records_created: persist.created,
            records_updated: persist.updated,
        };

        PipelineResult {
            status: PipelineStatus::Success,
            fetch: Some(fetch),
            transform: Some(transform),
            persist: Some(persist),
            statistics: Some(statistics),
            started_at,
            finished_at: Some(SystemTime::now()),
            error: None,
            retryable: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use orbit_model::ProcessedRecord;
    use orbit_store::MemoryStore;

    use crate::stages::{PersistOutput, TransformOutput};

    fn raw(source: &str, slug: &str) -> RawRecord {
        RawRecord {
            source: source.to_string(),
            fetched_at: SystemTime::now(),
            payload: serde_json::json!({ "slug": slug }),
        }
    }

    struct StaticFetcher {
        name: String,
        slugs: Vec<&'static str>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StaticFetcher {
        fn new(name: &str, slugs: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                slugs,
                fail: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                slugs: Vec::new(),
                fail: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceFetcher for StaticFetcher {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self, _force_refresh: bool) -> Result<Vec<RawRecord>, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StageError::fetch("upstream returned 503"));
            }
            Ok(self.slugs.iter().map(|s| raw(&self.name, s)).collect())
        }
    }

    /// Sleeps before answering, to hold the cycle lock for a while.
    struct SlowFetcher {
        name: String,
        slugs: Vec<&'static str>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl SlowFetcher {
        fn new(name: &str, slugs: Vec<&'static str>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                slugs,
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceFetcher for SlowFetcher {
        fn name(&self) -> &str {
            &self.name
        }

        async fn fetch(&self, _force_refresh: bool) -> Result<Vec<RawRecord>, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(self.slugs.iter().map(|s| raw(&self.name, s)).collect())
        }
    }

    /// Dedups by slug across sources; counts extra occurrences as
    /// conflicts and anything without a slug as dropped.
    struct SlugTransformer {
        calls: AtomicUsize,
        drop_everything: bool,
        fail: bool,
    }

    impl SlugTransformer {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                drop_everything: false,
                fail: false,
            })
        }

        fn dropping_all() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                drop_everything: true,
                fail: false,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transformer for SlugTransformer {
        async fn transform(&self, records: Vec<RawRecord>) -> Result<TransformOutput, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StageError::transform("validation engine crashed"));
            }
            if self.drop_everything {
                return Ok(TransformOutput {
                    dropped: records.len(),
                    records: Vec::new(),
                    conflicts: 0,
                });
            }
            let total = records.len();
            let mut by_slug: BTreeMap<String, ProcessedRecord> = BTreeMap::new();
            let mut conflicts = 0;
            for rec in records {
                let slug = rec.payload["slug"].as_str().unwrap().to_string();
                if by_slug
                    .insert(
                        slug.clone(),
                        ProcessedRecord {
                            slug,
                            payload: rec.payload,
                        },
                    )
                    .is_some()
                {
                    conflicts += 1;
                }
            }
            Ok(TransformOutput {
                dropped: total - by_slug.len() - conflicts,
                records: by_slug.into_values().collect(),
                conflicts,
            })
        }
    }

    /// Upserts into an in-memory map so re-runs count as updates.
    struct MapPersister {
        rows: Mutex<BTreeMap<String, ProcessedRecord>>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl MapPersister {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(BTreeMap::new()),
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(BTreeMap::new()),
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Persister for MapPersister {
        async fn persist(&self, records: Vec<ProcessedRecord>) -> Result<PersistOutput, StageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StageError::persist("connection reset"));
            }
            let mut rows = self.rows.lock().unwrap();
            let mut out = PersistOutput {
                created: 0,
                updated: 0,
            };
            for rec in records {
                if rows.insert(rec.slug.clone(), rec).is_some() {
                    out.updated += 1;
                } else {
                    out.created += 1;
                }
            }
            Ok(out)
        }
    }

    fn orchestrator(
        store: &Arc<MemoryStore>,
        fetchers: Vec<Arc<dyn SourceFetcher>>,
        transformer: Arc<dyn Transformer>,
        persister: Arc<dyn Persister>,
    ) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            Arc::new(LockManager::new(store.clone())),
            fetchers,
            transformer,
            persister,
        )
    }

    #[tokio::test]
    async fn full_cycle_reports_merged_statistics() {
        let store = Arc::new(MemoryStore::new());
        let a = StaticFetcher::new("press-site", vec!["falcon-9-g10", "vulcan-2"]);
        let b = StaticFetcher::new("registry", vec!["falcon-9-g10", "ariane-64"]);
        let persister = MapPersister::new();
        let orch = orchestrator(
            &store,
            vec![a.clone(), b.clone()],
            SlugTransformer::new(),
            persister.clone(),
        );

        let result = orch.run_scraping_cycle(false).await;

        assert_eq!(result.status, PipelineStatus::Success);
        let stats = result.statistics.unwrap();
        assert_eq!(stats.records_fetched, 4);
        assert_eq!(stats.records_processed, 3);
        assert_eq!(stats.conflicts_detected, 1);
        // Every distinct slug lands exactly once on a fresh store.
        assert_eq!(stats.records_created, 3);
        assert_eq!(stats.records_updated, 0);
        assert!(stats.fetch_ok && stats.transform_ok && stats.persist_ok);
        assert!(result.finished_at.is_some());

        // A second cycle upserts the same slugs as updates.
        let result = orch.run_scraping_cycle(false).await;
        let stats = result.statistics.unwrap();
        assert_eq!(stats.records_created, 0);
        assert_eq!(stats.records_updated, 3);
        assert_eq!(persister.calls(), 2);
    }

    #[tokio::test]
    async fn held_lock_skips_without_invoking_stages() {
        let store = Arc::new(MemoryStore::new());
        let locks = LockManager::new(store.clone());
        let guard = locks
            .acquire(
                &PipelineOrchestrator::cycle_lock_key(),
                Duration::from_secs(3600),
                Duration::ZERO,
            )
            .await
            .unwrap();

        let fetcher = StaticFetcher::new("press-site", vec!["falcon-9-g10"]);
        let transformer = SlugTransformer::new();
        let persister = MapPersister::new();
        let orch = orchestrator(
            &store,
            vec![fetcher.clone()],
            transformer.clone(),
            persister.clone(),
        );

        let result = orch.run_scraping_cycle(false).await;

        assert_eq!(result.status, PipelineStatus::Skipped);
        assert!(!result.retryable);
        assert!(result.error.unwrap().contains(guard.token()));
        assert_eq!(fetcher.calls(), 0);
        assert_eq!(transformer.calls(), 0);
        assert_eq!(persister.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_cycles_run_one_and_skip_the_other() {
        let store = Arc::new(MemoryStore::new());
        let fetcher = SlowFetcher::new("press-site", vec!["falcon-9-g10"], Duration::from_secs(1));
        let orch = Arc::new(orchestrator(
            &store,
            vec![fetcher.clone()],
            SlugTransformer::new(),
            MapPersister::new(),
        ));

        let first = tokio::spawn({
            let orch = orch.clone();
            async move { orch.run_scraping_cycle(false).await }
        });
        // Let the first cycle take the lock and settle into its fetch.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let second = orch.run_scraping_cycle(false).await;
        let first = first.await.unwrap();

        assert_eq!(first.status, PipelineStatus::Success);
        assert_eq!(second.status, PipelineStatus::Skipped);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn empty_fetch_ends_with_no_data() {
        let store = Arc::new(MemoryStore::new());
        let transformer = SlugTransformer::new();
        let persister = MapPersister::new();
        let orch = orchestrator(
            &store,
            vec![StaticFetcher::new("press-site", vec![])],
            transformer.clone(),
            persister.clone(),
        );

        let result = orch.run_scraping_cycle(false).await;

        assert_eq!(result.status, PipelineStatus::NoData);
        assert!(!result.retryable);
        assert!(result.fetch.is_some());
        assert_eq!(transformer.calls(), 0);
        assert_eq!(persister.calls(), 0);
    }

    #[tokio::test]
    async fn all_dropped_ends_with_processing_failed() {
        let store = Arc::new(MemoryStore::new());
        let persister = MapPersister::new();
        let orch = orchestrator(
            &store,
            vec![StaticFetcher::new("press-site", vec!["falcon-9-g10"])],
            SlugTransformer::dropping_all(),
            persister.clone(),
        );

        let result = orch.run_scraping_cycle(false).await;

        assert_eq!(result.status, PipelineStatus::ProcessingFailed);
        assert!(!result.retryable);
        assert_eq!(result.transform.as_ref().unwrap().dropped, 1);
        assert_eq!(persister.calls(), 0);
    }

    #[tokio::test]
    async fn partial_source_failure_still_succeeds() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(
            &store,
            vec![
                StaticFetcher::new("press-site", vec!["falcon-9-g10"]),
                StaticFetcher::failing("registry"),
            ],
            SlugTransformer::new(),
            MapPersister::new(),
        );

        let result = orch.run_scraping_cycle(false).await;

        assert_eq!(result.status, PipelineStatus::Success);
        let fetch = result.fetch.unwrap();
        assert!(fetch.sources.iter().any(|s| s.error.is_some()));
        assert!(!result.statistics.unwrap().fetch_ok);
    }

    #[tokio::test]
    async fn every_source_failing_is_retryable() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(
            &store,
            vec![StaticFetcher::failing("press-site")],
            SlugTransformer::new(),
            MapPersister::new(),
        );

        let result = orch.run_scraping_cycle(false).await;

        assert_eq!(result.status, PipelineStatus::Failed);
        assert!(result.retryable);
        assert!(result.error.unwrap().contains("fetch stage"));
    }

    #[tokio::test]
    async fn persist_failure_is_retryable_and_releases_the_lock() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(
            &store,
            vec![StaticFetcher::new("press-site", vec!["falcon-9-g10"])],
            SlugTransformer::new(),
            MapPersister::failing(),
        );

        let result = orch.run_scraping_cycle(false).await;
        assert_eq!(result.status, PipelineStatus::Failed);
        assert!(result.retryable);
        assert!(result.error.unwrap().contains("persist stage"));

        // The lock must not leak into the next schedule slot.
        let result = orch.run_scraping_cycle(false).await;
        assert_ne!(result.status, PipelineStatus::Skipped);
    }

    #[tokio::test]
    async fn manual_refresh_ignores_the_lock_and_filters_sources() {
        let store = Arc::new(MemoryStore::new());
        let locks = LockManager::new(store.clone());
        locks
            .acquire(
                &PipelineOrchestrator::cycle_lock_key(),
                Duration::from_secs(3600),
                Duration::ZERO,
            )
            .await
            .unwrap();

        let press = StaticFetcher::new("press-site", vec!["falcon-9-g10"]);
        let registry = StaticFetcher::new("registry", vec!["ariane-64"]);
        let orch = orchestrator(
            &store,
            vec![press.clone(), registry.clone()],
            SlugTransformer::new(),
            MapPersister::new(),
        );

        let result = orch
            .run_manual_refresh(Some(vec!["press-site".to_string()]))
            .await;

        assert_eq!(result.status, PipelineStatus::Success);
        assert_eq!(press.calls(), 1);
        assert_eq!(registry.calls(), 0);
        assert_eq!(result.statistics.unwrap().records_fetched, 1);
    }

    #[tokio::test]
    async fn manual_refresh_with_unknown_source_fails_without_retry() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(
            &store,
            vec![StaticFetcher::new("press-site", vec!["falcon-9-g10"])],
            SlugTransformer::new(),
            MapPersister::new(),
        );

        let result = orch
            .run_manual_refresh(Some(vec!["telemetry".to_string()]))
            .await;

        assert_eq!(result.status, PipelineStatus::Failed);
        assert!(!result.retryable);
    }
}
