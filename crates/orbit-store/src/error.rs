use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("coordination store unreachable: {0}")]
    Unavailable(String),

    #[error("store command failed: {0}")]
    Command(String),
}

impl StoreError {
    /// Whether the failure is a connectivity problem rather than a bad command.
    ///
    /// Callers with a fail-open policy key off this.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() || e.is_timeout() || e.is_connection_dropped()
        {
            StoreError::Unavailable(e.to_string())
        } else {
            StoreError::Command(e.to_string())
        }
    }
}
