use std::fmt;

use thiserror::Error;

/// The pipeline stage an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Transform,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Transform => "transform",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Unexpected failure inside a stage collaborator, tagged by stage.
#[derive(Debug, Error)]
#[error("{stage} stage: {message}")]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

impl StageError {
    pub fn fetch(message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Fetch,
            message: message.into(),
        }
    }

    pub fn transform(message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Transform,
            message: message.into(),
        }
    }

    pub fn persist(message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Persist,
            message: message.into(),
        }
    }
}
