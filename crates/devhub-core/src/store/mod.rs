//! Device persistence.
//!
//! `DeviceStore` is the boundary the registration saga and the control
//! dispatcher talk to; `FileStore` is the file-backed implementation.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StorageError;
use crate::types::{DeviceRecord, FieldType, FieldValue, NewDevice};

pub mod file;

pub use file::FileStore;

/// Field schema row used by the control path for validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Id-keyed device CRUD plus the field-scoped operations the control path
/// relies on.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Persist a new device and return the assigned id.
    async fn insert(&self, device: NewDevice) -> Result<String, StorageError>;

    async fn get(&self, id: &str) -> Result<DeviceRecord, StorageError>;

    async fn list(&self) -> Result<Vec<DeviceRecord>, StorageError>;

    async fn delete(&self, id: &str) -> Result<(), StorageError>;

    /// Write a single field's value without touching sibling fields.
    async fn update_field(
        &self,
        id: &str,
        field: &str,
        value: FieldValue,
    ) -> Result<(), StorageError>;

    /// Field schema (name, type, min, max) for a device.
    async fn field_schema(&self, id: &str) -> Result<Vec<FieldSchema>, StorageError>;
}
