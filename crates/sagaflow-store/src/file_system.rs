use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sagaflow_core::SagaRecord;
use tokio::fs;
use tracing::{debug, warn};

use crate::Result;
use crate::error::StoreError;
use crate::store::{SagaStore, sort_newest_first};

const RECORD_EXTENSION: &str = "json";

/// Stores each saga as `<dir>/<saga id>.json`.
///
/// Writes go to a temporary file that is then renamed over the record, so a
/// crash mid-write leaves the previous transition intact.
#[derive(Debug, Clone)]
pub struct FileSystemSagaStore {
    dir: PathBuf,
}

impl FileSystemSagaStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, saga_id: &str) -> Result<PathBuf> {
        validate_id(saga_id)?;
        Ok(self.dir.join(format!("{saga_id}.{RECORD_EXTENSION}")))
    }
}

fn validate_id(saga_id: &str) -> Result<()> {
    let valid = !saga_id.is_empty()
        && saga_id != "."
        && saga_id != ".."
        && !saga_id.contains(['/', '\\'])
        && !saga_id.contains("..");
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(saga_id.to_string()))
    }
}

async fn read_record(path: &Path, id: &str) -> Result<Option<SagaRecord>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let record = serde_json::from_str(&content).map_err(|source| StoreError::Parse {
        id: id.to_string(),
        source,
    })?;

    Ok(Some(record))
}

#[async_trait]
impl SagaStore for FileSystemSagaStore {
    async fn upsert(&self, record: &SagaRecord) -> Result<()> {
        let path = self.record_path(&record.id)?;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;

        let content =
            serde_json::to_string_pretty(record).map_err(|source| StoreError::Serialize {
                id: record.id.clone(),
                source,
            })?;

        let tmp_path = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));
        fs::write(&tmp_path, content)
            .await
            .map_err(|source| StoreError::Write {
                path: tmp_path.clone(),
                source,
            })?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;

        debug!(saga_id = %record.id, status = %record.status, path = %path.display(), "saga record written");
        Ok(())
    }

    async fn load(&self, saga_id: &str) -> Result<Option<SagaRecord>> {
        let path = self.record_path(saga_id)?;
        read_record(&path, saga_id).await
    }

    async fn list(&self) -> Result<Vec<SagaRecord>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::List {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut records = Vec::new();
        loop {
            let entry = entries
                .next_entry()
                .await
                .map_err(|source| StoreError::List {
                    path: self.dir.clone(),
                    source,
                })?;
            let Some(entry) = entry else {
                break;
            };

            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                warn!(path = %path.display(), "skipping saga record with non UTF-8 name");
                continue;
            };
            let id = id.to_string();
            if let Some(record) = read_record(&path, &id).await? {
                records.push(record);
            }
        }

        sort_newest_first(&mut records);
        Ok(records)
    }
}
