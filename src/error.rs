use thiserror::Error;

/// Error types for macro recording and code generation
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Start was called while a session is already open
    #[error("a recording session is already open")]
    AlreadyRecording,

    /// Stop was called with no open session
    #[error("no recording session is open")]
    NotRecording,

    /// An event was delivered with no open session to receive it
    #[error("no active session to record the event into")]
    NoActiveSession,

    /// Code generation was attempted on a session that is still open
    #[error("session has not been finalized")]
    SessionNotFinalized,

    /// Error while recording an event
    #[error("failed to record event: {0}")]
    RecordingError(String),

    /// Error when saving a session or generated script
    #[error("failed to save: {0}")]
    SaveError(String),

    /// Error when serializing or deserializing JSON
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for macro recorder operations
pub type Result<T> = std::result::Result<T, RecorderError>;
