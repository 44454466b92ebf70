use thiserror::Error;

#[derive(Error, Debug)]
pub enum CkhError {
    #[error("Executable not found on the activated PATH: {0}")]
    ExecutableNotFound(String),

    #[error("Failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = std::result::Result<T, CkhError>;
