mod timestamp;
pub use timestamp::{epoch_secs, epoch_secs_opt};

mod task_id;
pub use task_id::TaskId;

mod task_status;
pub use task_status::TaskStatus;

mod task_info;
pub use task_info::TaskInfo;

mod worker;
pub use worker::{HealthStatus, SystemHealth, WorkerOverview, WorkerStats};

mod lock_info;
pub use lock_info::LockInfo;

mod rate_limit;
pub use rate_limit::{ActiveRateLimit, RateLimitDecision, RateLimitUsage};

mod record;
pub use record::{ProcessedRecord, RawRecord};

mod pipeline;
pub use pipeline::{
    FetchSummary, PersistSummary, PipelineResult, PipelineStatistics, PipelineStatus,
    SourceOutcome, TransformSummary,
};

mod statistics;
pub use statistics::{OutcomeCounts, TaskOutcome, TaskStatistics};

/// Worker identity as reported by the queue runtime (usually `name@host`).
pub type WorkerName = String;
