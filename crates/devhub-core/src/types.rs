//! Device data model: onboarding specifications and persisted records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Role of a device on the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Plain actuator; consumes commands, publishes nothing.
    Device,
    /// Sensor; additionally publishes telemetry on its confirmation topic.
    Sensor,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Device => "device",
            DeviceType::Sensor => "sensor",
        }
    }
}

/// Declared type of a device field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Int,
    Float,
    Str,
    Bool,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Str => "str",
            FieldType::Bool => "bool",
        }
    }

    /// Int and float fields carry a [min, max] range.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }
}

/// A field value as it appears on the wire and in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl FieldValue {
    /// The value a freshly registered field starts with.
    pub fn default_for(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Int => FieldValue::Int(0),
            FieldType::Float => FieldValue::Float(0.0),
            FieldType::Str => FieldValue::Str(String::new()),
            FieldType::Bool => FieldValue::Bool(false),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Coerce this value to the declared field type.
    ///
    /// An integer addressed to a float field is widened; every other
    /// mismatch is rejected so a stored value always matches its type.
    pub fn conform_to(&self, field_type: FieldType) -> Option<FieldValue> {
        match (self, field_type) {
            (FieldValue::Int(v), FieldType::Int) => Some(FieldValue::Int(*v)),
            (FieldValue::Int(v), FieldType::Float) => Some(FieldValue::Float(*v as f64)),
            (FieldValue::Float(v), FieldType::Float) => Some(FieldValue::Float(*v)),
            (FieldValue::Str(v), FieldType::Str) => Some(FieldValue::Str(v.clone())),
            (FieldValue::Bool(v), FieldType::Bool) => Some(FieldValue::Bool(*v)),
            _ => None,
        }
    }
}

/// Field declaration inside an onboarding specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Where the device wants the credential payload delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEndpoint {
    pub address: String,
    pub port: u16,
}

impl std::fmt::Display for ResponseEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Onboarding input sent by an unregistered device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSpecification {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub fields: Vec<FieldSpec>,
    pub response_endpoint: ResponseEndpoint,
}

impl DeviceSpecification {
    /// Semantic validation, run before anything is persisted.
    ///
    /// Numeric fields must carry a full [min, max] range.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        for field in &self.fields {
            if !field.field_type.is_numeric() {
                continue;
            }
            match (field.min, field.max) {
                (Some(min), Some(max)) => {
                    if min > max {
                        return Err(ValidationError::InvertedRange {
                            field: field.name.clone(),
                            min,
                            max,
                        });
                    }
                }
                _ => return Err(ValidationError::MissingRange(field.name.clone())),
            }
        }
        Ok(())
    }
}

/// A persisted device field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub value: FieldValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// A device waiting for its store-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDevice {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub fields: Vec<FieldRecord>,
}

impl NewDevice {
    /// Build the record content for a validated specification.
    ///
    /// Values start at type defaults; min/max are copied through.
    pub fn from_specification(spec: &DeviceSpecification) -> Self {
        let fields = spec
            .fields
            .iter()
            .map(|field| FieldRecord {
                name: field.name.clone(),
                field_type: field.field_type,
                value: FieldValue::default_for(field.field_type),
                min: field.min,
                max: field.max,
            })
            .collect();

        Self {
            name: spec.name.clone(),
            device_type: spec.device_type,
            fields,
        }
    }
}

/// A registered device as persisted by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub fields: Vec<FieldRecord>,
    pub registered_at: DateTime<Utc>,
}

impl DeviceRecord {
    pub fn field(&self, name: &str) -> Option<&FieldRecord> {
        self.fields.iter().find(|f| f.name == name)
    }
}
