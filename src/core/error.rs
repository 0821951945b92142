use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Duplicate node: {0}")]
    DuplicateNode(String),

    #[error("Invalid rail {from} - {to}: {reason}")]
    InvalidRail {
        from: String,
        to: String,
        reason: String,
    },

    #[error("No route from {from} to {to}")]
    Unroutable { from: String, to: String },

    #[error("Unknown train: {0}")]
    UnknownTrain(String),

    #[error("Unknown train state: {0}")]
    UnknownState(String),

    #[error("Invalid time of day: {0}")]
    InvalidTime(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Replay error: {0}")]
    Replay(String),

    #[error("Reload rejected: {0}")]
    ReloadRejected(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
