use thiserror::Error;

use orbit_model::TaskId;
use orbit_store::StoreError;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// The queue runtime knows nothing about the requested task.
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    /// The queue runtime's control channel failed or answered garbage.
    #[error("queue introspection failed: {0}")]
    Queue(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
