//! Control-path dispatcher.
//!
//! Validates requested field changes against the stored schema and drives
//! them to the device one at a time over the command transport. Each field
//! is persisted as soon as the device confirms it, so an error later in the
//! batch leaves earlier fields already applied - there is no batch-level
//! rollback.

use std::sync::Arc;

use tracing::info;

use crate::error::{ControlError, StorageError};
use crate::protocol::{device_topic, CommandMessage, FieldChange};
use crate::store::{DeviceStore, FieldSchema};
use crate::transport::CommandTransport;
use crate::types::{DeviceRecord, FieldValue};

/// Applies ordered field-change batches to a device.
pub struct ControlDispatcher {
    store: Arc<dyn DeviceStore>,
    transport: Arc<dyn CommandTransport>,
}

impl ControlDispatcher {
    pub fn new(store: Arc<dyn DeviceStore>, transport: Arc<dyn CommandTransport>) -> Self {
        Self { store, transport }
    }

    /// Apply `changes` in order.
    ///
    /// Aborts the batch on the first unknown field, out-of-range or
    /// mistyped value, or unconfirmed command; fields confirmed before the
    /// abort stay persisted. On full success returns the updated record.
    pub async fn apply(
        &self,
        device_id: &str,
        changes: &[FieldChange],
    ) -> Result<DeviceRecord, ControlError> {
        let schema = self.store.field_schema(device_id).await.map_err(|e| match e {
            StorageError::NotFound(_) | StorageError::InvalidId(_) => {
                ControlError::UnknownDevice(device_id.to_string())
            }
            other => ControlError::Storage(other),
        })?;

        let topic = device_topic(device_id);

        for change in changes {
            let field = schema
                .iter()
                .find(|f| f.name == change.name)
                .ok_or_else(|| ControlError::InvalidField {
                    device: device_id.to_string(),
                    field: change.name.clone(),
                })?;

            let value = validate_change(field, &change.value)?;

            let command = CommandMessage::update(&FieldChange {
                name: change.name.clone(),
                value: value.clone(),
            });

            if let Err(e) = self.transport.send_command(&topic, &command).await {
                return Err(ControlError::Connection {
                    field: change.name.clone(),
                    source: e,
                });
            }

            // Confirmed by the device: commit this field right away, scoped
            // so sibling fields are never clobbered.
            self.store
                .update_field(device_id, &change.name, value)
                .await
                .map_err(ControlError::Storage)?;
            info!("device {}: field `{}` updated", device_id, change.name);
        }

        self.store.get(device_id).await.map_err(ControlError::Storage)
    }
}

/// Check a requested value against the field schema.
///
/// Integers widen to float for float fields; numeric values must lie within
/// the field's inclusive [min, max].
fn validate_change(field: &FieldSchema, value: &FieldValue) -> Result<FieldValue, ControlError> {
    let value = value
        .conform_to(field.field_type)
        .ok_or_else(|| ControlError::InvalidValue {
            field: field.name.clone(),
            reason: format!("expected a {} value", field.field_type.as_str()),
        })?;

    if field.field_type.is_numeric() {
        // Numeric fields always carry a range; registration enforces it.
        let min = field.min.unwrap_or(f64::NEG_INFINITY);
        let max = field.max.unwrap_or(f64::INFINITY);

        if let Some(number) = value.as_f64() {
            if number < min || number > max {
                return Err(ControlError::InvalidValue {
                    field: field.name.clone(),
                    reason: format!("must be between {} and {}", min, max),
                });
            }
        }
    }

    Ok(value)
}
