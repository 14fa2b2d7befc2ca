//! Error types for the valet command router.

/// Top-level error type for the dispatch pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ValetError {
    /// Command text could not be parsed (malformed alarm/timer syntax etc.).
    #[error("parse error: {0}")]
    Parse(String),

    /// Dispatch-level failure (unit scheduling, batch collection).
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// System action engine failure (alarm, timer, stopwatch, volume, power).
    #[error("system error: {0}")]
    System(String),

    /// Platform collaborator failure (desktop control, alerts, app launch).
    #[error("platform error: {0}")]
    Platform(String),

    /// Adaptive policy failure (state load/store, unknown decision point).
    #[error("policy error: {0}")]
    Policy(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ValetError>;
