mod error;
mod orchestrator;
mod retry;
mod stages;

pub use error::{Stage, StageError};
pub use orchestrator::PipelineOrchestrator;
pub use retry::{CycleJob, RetryPolicy};
pub use stages::{Persister, PersistOutput, SourceFetcher, Transformer, TransformOutput};
