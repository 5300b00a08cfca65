use thiserror::Error;

/// Failures talking to the calendar or issue tracker.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Request(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Request(err.to_string())
    }
}

/// Errors surfaced to the command layer.
///
/// Malformed diary content never produces one of these; the parser degrades
/// to empty sections instead. Only caller misuse and collaborator failures do.
#[derive(Error, Debug)]
pub enum DiaryError {
    #[error("Unknown markdown style: {0}")]
    UnknownStyle(String),

    #[error("Unknown edit target: {0} (expected \"issue\" or \"comment\")")]
    UnknownTarget(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

pub type DiaryResult<T> = Result<T, DiaryError>;
