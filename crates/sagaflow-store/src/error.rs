use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid saga id '{0}'")]
    InvalidId(String),

    #[error("failed to create saga store directory '{path}'")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read saga record '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write saga record '{path}'")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to list saga records in '{path}'")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse saga record '{id}'")]
    Parse {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize saga record '{id}'")]
    Serialize {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::StoreError;

    #[test]
    fn read_error_includes_path() {
        let err = StoreError::Read {
            path: PathBuf::from("/sagas/abc.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };

        assert!(err.to_string().contains("/sagas/abc.json"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn invalid_id_names_the_id() {
        let err = StoreError::InvalidId("../etc".to_string());

        assert!(err.to_string().contains("../etc"));
    }
}
