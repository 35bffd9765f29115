//! File-backed device store.
//!
//! One JSON document per device under the data directory, keyed by a
//! generated 24-hex-char id.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use rand::RngCore;
use regex::Regex;
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::types::{DeviceRecord, FieldValue, NewDevice};

use super::{DeviceStore, FieldSchema};

/// Regex for valid device ids: 24 lowercase hex chars
const ID_PATTERN: &str = r"^[a-f0-9]{24}$";

/// File-backed device store.
///
/// Takes a `PathBuf` in the constructor so each consumer can provide the
/// correct data directory.
pub struct FileStore {
    device_dir: PathBuf,
    id_regex: Regex,
    // Serializes read-modify-write cycles so concurrent single-field
    // updates never clobber each other's siblings.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Create a new FileStore rooted at the given directory.
    pub fn new(dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&dir).map_err(StorageError::Io)?;

        Ok(Self {
            device_dir: dir,
            id_regex: Regex::new(ID_PATTERN).unwrap(),
            write_lock: Mutex::new(()),
        })
    }

    fn validate_id(&self, id: &str) -> Result<(), StorageError> {
        if !self.id_regex.is_match(id) {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        Ok(())
    }

    fn device_path(&self, id: &str) -> PathBuf {
        self.device_dir.join(format!("{}.json", id))
    }

    fn generate_id() -> String {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    async fn read_record(&self, id: &str) -> Result<DeviceRecord, StorageError> {
        let path = self.device_path(id);

        if !path.exists() {
            return Err(StorageError::NotFound(id.to_string()));
        }

        let content = fs::read_to_string(&path).await.map_err(StorageError::Io)?;
        serde_json::from_str(&content).map_err(StorageError::Serialization)
    }

    async fn write_record(&self, record: &DeviceRecord) -> Result<(), StorageError> {
        let path = self.device_path(&record.id);
        let content =
            serde_json::to_string_pretty(record).map_err(StorageError::Serialization)?;

        fs::write(&path, content).await.map_err(StorageError::Io)?;

        Ok(())
    }
}

#[async_trait]
impl DeviceStore for FileStore {
    async fn insert(&self, device: NewDevice) -> Result<String, StorageError> {
        let id = Self::generate_id();
        let record = DeviceRecord {
            id: id.clone(),
            name: device.name,
            device_type: device.device_type,
            fields: device.fields,
            registered_at: Utc::now(),
        };

        self.write_record(&record).await?;

        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<DeviceRecord, StorageError> {
        self.validate_id(id)?;
        self.read_record(id).await
    }

    async fn list(&self) -> Result<Vec<DeviceRecord>, StorageError> {
        let mut devices = Vec::new();
        let mut entries = fs::read_dir(&self.device_dir)
            .await
            .map_err(StorageError::Io)?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let id = match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) => stem.to_string(),
                None => continue,
            };

            if self.validate_id(&id).is_err() {
                continue;
            }

            devices.push(self.read_record(&id).await?);
        }

        devices.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(devices)
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.validate_id(id)?;

        let path = self.device_path(id);

        if !path.exists() {
            return Err(StorageError::NotFound(id.to_string()));
        }

        fs::remove_file(&path).await.map_err(StorageError::Io)?;

        Ok(())
    }

    async fn update_field(
        &self,
        id: &str,
        field: &str,
        value: FieldValue,
    ) -> Result<(), StorageError> {
        self.validate_id(id)?;

        let _guard = self.write_lock.lock().await;

        let mut record = self.read_record(id).await?;
        let entry = record
            .fields
            .iter_mut()
            .find(|f| f.name == field)
            .ok_or_else(|| StorageError::FieldNotFound {
                device: id.to_string(),
                field: field.to_string(),
            })?;
        entry.value = value;

        self.write_record(&record).await
    }

    async fn field_schema(&self, id: &str) -> Result<Vec<FieldSchema>, StorageError> {
        let record = self.get(id).await?;

        Ok(record
            .fields
            .iter()
            .map(|f| FieldSchema {
                name: f.name.clone(),
                field_type: f.field_type,
                min: f.min,
                max: f.max,
            })
            .collect())
    }
}
