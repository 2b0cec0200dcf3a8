use std::path::{Path, PathBuf};

use sagaflow_engine::EngineConfig;
use serde::Deserialize;

use crate::error::{CliError, Result};

pub(crate) const DEFAULT_CONFIG_FILE: &str = "sagaflow.toml";
const DEFAULT_STORE_DIR: &str = ".sagaflow/sagas";

#[derive(Debug, Default, Deserialize)]
struct StoreSection {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    store: StoreSection,
}

/// Resolved CLI settings: where the store lives and how the engine is tuned.
#[derive(Debug)]
pub(crate) struct Settings {
    store_dir: PathBuf,
    engine: EngineConfig,
}

impl Settings {
    /// Loads settings relative to `cwd`.
    ///
    /// An explicitly named config file must exist. Without one,
    /// `sagaflow.toml` in `cwd` is read if present. A relative store path
    /// in the file is resolved against the file's directory, and
    /// `store_override` beats both.
    pub(crate) fn load(
        cwd: &Path,
        config: Option<&Path>,
        store_override: Option<&Path>,
    ) -> Result<Self> {
        let (file, base) = match config {
            Some(path) => {
                let path = cwd.join(path);
                let file = read_file(&path)?;
                (Some((path.clone(), file)), parent_dir(&path, cwd))
            }
            None => {
                let path = cwd.join(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    let file = read_file(&path)?;
                    (Some((path, file)), cwd.to_path_buf())
                } else {
                    (None, cwd.to_path_buf())
                }
            }
        };

        let (store_path, engine) = match file {
            Some((path, content)) => parse(&path, &content)?,
            None => (None, EngineConfig::default()),
        };

        let store_dir = match store_override {
            Some(dir) => cwd.join(dir),
            None => base.join(store_path.unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR))),
        };

        Ok(Self { store_dir, engine })
    }

    pub(crate) fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub(crate) fn engine(&self) -> &EngineConfig {
        &self.engine
    }
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| CliError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })
}

fn parent_dir(path: &Path, fallback: &Path) -> PathBuf {
    path.parent()
        .map_or_else(|| fallback.to_path_buf(), Path::to_path_buf)
}

fn parse(path: &Path, content: &str) -> Result<(Option<PathBuf>, EngineConfig)> {
    let file: SettingsFile = toml::from_str(content).map_err(|source| CliError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    let engine =
        EngineConfig::from_toml_str(content).map_err(|source| CliError::EngineConfig {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((file.store.path, engine))
}
