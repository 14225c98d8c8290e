use error_stack::Result;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CLIError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read TOML from dir: {0}")]
    TomlRead(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration in {0}")]
    Config(String),

    #[error("Actor failure: {0}")]
    Actor(String),

    #[error("{0} file(s) failed validation")]
    Invalid(usize),

    #[error("Other error: {0}")]
    Other(String),
}

pub type CLIResult<T> = Result<T, CLIError>;
