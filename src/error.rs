use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the note store and its collaborators.
#[derive(Debug, Error)]
pub enum NoteError {
    #[error("{0}")]
    Validation(String),

    #[error("No note found with ID {0}")]
    NotFound(u64),

    #[error("No note ids left to assign")]
    IdsExhausted,

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Preview unavailable: {0}")]
    PreviewUnavailable(String),
}

impl NoteError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        NoteError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, NoteError>;
