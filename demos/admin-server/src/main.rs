use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tracing::info;

use orbit_api::{CoordinationAdapter, HttpApi};
use orbit_limit::RateLimiter;
use orbit_lock::LockManager;
use orbit_model::{ProcessedRecord, RawRecord, TaskId, TaskStatus, WorkerName};
use orbit_monitor::{MonitorError, QueueIntrospection, TaskEventLog, TaskMonitor, TaskSnapshot};
use orbit_observe::{LoggerConfig, logger_init};
use orbit_pipeline::{
    PersistOutput, Persister, PipelineOrchestrator, SourceFetcher, StageError, TransformOutput,
    Transformer,
};
use orbit_store::RedisStore;

/// Demo fetcher returning a fixed batch of records.
struct DemoFetcher;

#[async_trait]
impl SourceFetcher for DemoFetcher {
    fn name(&self) -> &str {
        "demo-source"
    }

    async fn fetch(&self, _force_refresh: bool) -> Result<Vec<RawRecord>, StageError> {
        Ok(vec![RawRecord {
            source: "demo-source".to_string(),
            fetched_at: SystemTime::now(),
            payload: serde_json::json!({ "slug": "falcon-9-demo", "name": "Demo Launch" }),
        }])
    }
}

struct DemoTransformer;

#[async_trait]
impl Transformer for DemoTransformer {
    async fn transform(&self, records: Vec<RawRecord>) -> Result<TransformOutput, StageError> {
        let records = records
            .into_iter()
            .filter_map(|r| {
                let slug = r.payload.get("slug")?.as_str()?.to_string();
                Some(ProcessedRecord {
                    slug,
                    payload: r.payload,
                })
            })
            .collect::<Vec<_>>();
        Ok(TransformOutput {
            records,
            dropped: 0,
            conflicts: 0,
        })
    }
}

struct DemoPersister;

#[async_trait]
impl Persister for DemoPersister {
    async fn persist(&self, records: Vec<ProcessedRecord>) -> Result<PersistOutput, StageError> {
        for rec in &records {
            info!(slug = %rec.slug, "would upsert record");
        }
        Ok(PersistOutput {
            created: records.len(),
            updated: 0,
        })
    }
}

/// Demo queue: one idle worker, nothing in flight.
struct DemoQueue;

#[async_trait]
impl QueueIntrospection for DemoQueue {
    async fn ping_workers(&self) -> Result<Vec<WorkerName>, MonitorError> {
        Ok(vec!["demo-worker@localhost".to_string()])
    }

    async fn active(&self) -> Result<BTreeMap<WorkerName, Vec<TaskSnapshot>>, MonitorError> {
        Ok(BTreeMap::new())
    }

    async fn scheduled(&self) -> Result<BTreeMap<WorkerName, Vec<TaskSnapshot>>, MonitorError> {
        Ok(BTreeMap::new())
    }

    async fn reserved(&self) -> Result<BTreeMap<WorkerName, Vec<TaskSnapshot>>, MonitorError> {
        Ok(BTreeMap::new())
    }

    async fn task_state(&self, _id: &TaskId) -> Result<Option<TaskStatus>, MonitorError> {
        Ok(None)
    }

    async fn revoke(&self, _id: &TaskId, _terminate: bool) -> Result<(), MonitorError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logger_init(&LoggerConfig::default())?;
    info!("logger initialized");

    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let store = Arc::new(RedisStore::connect(&redis_url).await?);
    info!(redis_url, "coordination store connected");

    let locks = Arc::new(LockManager::new(store.clone()));
    let limiter = Arc::new(RateLimiter::new(store.clone()));
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        locks.clone(),
        vec![Arc::new(DemoFetcher)],
        Arc::new(DemoTransformer),
        Arc::new(DemoPersister),
    ));
    let monitor = Arc::new(TaskMonitor::new(Arc::new(DemoQueue)));
    let events = Arc::new(TaskEventLog::new(store.clone()));

    let adapter = Arc::new(CoordinationAdapter::new(
        locks,
        limiter,
        orchestrator,
        monitor,
        events,
    ));
    let router = HttpApi::new(adapter).router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
    info!("admin API listening on http://127.0.0.1:8080");
    info!("try: curl http://127.0.0.1:8080/api/v1/status");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down...");
        })
        .await?;

    Ok(())
}
