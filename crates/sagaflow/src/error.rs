use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to determine current directory")]
    CurrentDir(#[source] std::io::Error),

    #[error("failed to read config file '{path}'")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid engine configuration in '{path}'")]
    EngineConfig {
        path: PathBuf,
        #[source]
        source: sagaflow_engine::ConfigError,
    },

    #[error("saga error")]
    Saga(#[from] sagaflow_engine::SagaError),

    #[error("no saga with id '{0}' in the store")]
    SagaNotFound(String),

    #[error("failed to render JSON output")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
