use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActorError {
    #[error("Failed to load actor config from TOML file: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Failed to find file: {0}")]
    FileError(#[from] tokio::io::Error),

    #[error("Unable to parse TOML file: {0}")]
    TomlDeserializationError(String),

    #[error("No tokio runtime available to spawn the actor loop")]
    NoRuntime,

    #[error("Actor is not running")]
    NotRunning,

    #[error("Actor loop is still shutting down from an earlier stop")]
    Stopping,

    #[error("Actor loop did not acknowledge stop within {0:?}")]
    StopTimedOut(Duration),

    #[error("Actor loop terminated abnormally: {0}")]
    LoopAborted(String),

    #[error("Actor loop state was lost by an earlier abnormal exit")]
    LoopLost,

    #[error("Timer period must be greater than zero")]
    InvalidTimerPeriod,

    #[error("Failed to encode message {id}: {reason}")]
    EncodeError { id: u32, reason: String },

    #[error("Handler failed: {0}")]
    HandlerFailed(String),

    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),
}

pub type Result<T> = std::result::Result<T, error_stack::Report<ActorError>>;
