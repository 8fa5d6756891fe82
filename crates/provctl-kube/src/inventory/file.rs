//! File-based inventory
//!
//! Stores one JSON document per instance at `<dir>/<namespace>/<label>.json`.
//! Useful for development and testing without a Kubernetes cluster.
//! The token is a per-record generation counter.

use async_trait::async_trait;
use provctl_core::{InstanceKey, ProviderInstance};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::InventoryStore;
use crate::error::{KubeError, Result};

/// On-disk record
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    generation: u64,
    updated_at: chrono::DateTime<chrono::Utc>,
    instance: ProviderInstance,
}

/// File-based inventory
pub struct FileInventory {
    base_dir: PathBuf,
    /// Serializes read-check-write sequences within this process
    write_lock: Mutex<()>,
}

impl FileInventory {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Default location: `<config dir>/provctl/inventory`
    pub fn default_location() -> Option<Self> {
        dirs::config_dir().map(|d| Self::new(d.join("provctl").join("inventory")))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn record_path(&self, key: &InstanceKey) -> PathBuf {
        self.base_dir
            .join(&key.namespace)
            .join(format!("{}.json", key.manifest_label))
    }

    async fn read_record(&self, path: &Path) -> Result<Option<Record>> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, path: &Path, record: &Record) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(record)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    fn from_record(record: Record) -> ProviderInstance {
        let mut instance = record.instance;
        instance.resource_version = Some(record.generation.to_string());
        instance
    }
}

#[async_trait]
impl InventoryStore for FileInventory {
    async fn ensure_schema(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ProviderInstance>> {
        let mut instances = Vec::new();
        let mut namespaces = match tokio::fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(instances),
            Err(e) => return Err(e.into()),
        };

        while let Some(ns) = namespaces.next_entry().await? {
            if !ns.file_type().await?.is_dir() {
                continue;
            }
            let mut files = tokio::fs::read_dir(ns.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let path = file.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Some(record) = self.read_record(&path).await? {
                    instances.push(Self::from_record(record));
                }
            }
        }

        instances.sort_by_key(|i| i.key());
        Ok(instances)
    }

    async fn get(&self, key: &InstanceKey) -> Result<Option<ProviderInstance>> {
        Ok(self
            .read_record(&self.record_path(key))
            .await?
            .map(Self::from_record))
    }

    async fn create(&self, instance: &ProviderInstance) -> Result<ProviderInstance> {
        let _guard = self.write_lock.lock().await;
        let key = instance.key();
        let path = self.record_path(&key);
        let current = self.read_record(&path).await?;

        let generation = match (&instance.resource_version, &current) {
            (None, None) => 1,
            (None, Some(_)) => {
                return Err(KubeError::conflict(
                    &key.manifest_label,
                    &key.namespace,
                    "instance already exists",
                ));
            }
            (Some(expected), Some(record)) if *expected == record.generation.to_string() => {
                record.generation + 1
            }
            (Some(expected), _) => {
                return Err(KubeError::conflict(
                    &key.manifest_label,
                    &key.namespace,
                    format!(
                        "expected generation {}, found {}",
                        expected,
                        current
                            .as_ref()
                            .map(|r| r.generation.to_string())
                            .unwrap_or_else(|| "none".to_string())
                    ),
                ));
            }
        };

        let mut stored = instance.clone();
        stored.resource_version = None;
        let record = Record {
            generation,
            updated_at: chrono::Utc::now(),
            instance: stored,
        };
        self.write_record(&path, &record).await?;
        tracing::debug!(path = %path.display(), generation, "wrote inventory record");
        Ok(Self::from_record(record))
    }
}
