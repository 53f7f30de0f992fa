use thiserror::Error;

/// Startup-time configuration failures. Never recovered from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Duplicate alias '{alias}' under '{parent}'")]
    DuplicateAlias { parent: String, alias: String },

    #[error("Command node declares no names")]
    EmptyNames,

    #[error("Malformed alias '{0}'")]
    MalformedAlias(String),

    #[error("Unknown flag name '{name}' for spelling '{spelling}'")]
    UnknownFlag { spelling: String, name: String },

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("TOML error: {0}")]
    Toml(String),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
