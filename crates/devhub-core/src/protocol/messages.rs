//! JSON message shapes exchanged with devices.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::FieldValue;

/// Command published to a device's private topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub command: String,
    pub content: Value,
}

impl CommandMessage {
    /// An "update" command carrying a single field change.
    pub fn update(change: &FieldChange) -> Self {
        Self {
            command: "update".to_string(),
            content: json!({
                "name": change.name,
                "value": change.value,
            }),
        }
    }
}

/// Confirmation sent by a device.
///
/// Used both for the MQTT command channel (`{status, message}`) and for the
/// onboarding handshake, where the device sends a bare `{status}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationMessage {
    pub status: bool,
    #[serde(default)]
    pub message: Value,
}

/// Structured error reply on the onboarding connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub detail: String,
}

impl ErrorReply {
    pub fn failure(kind: &str, detail: &str) -> Self {
        Self {
            status: "failure".to_string(),
            kind: kind.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Everything a freshly registered device needs to reach the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialPayload {
    pub host: String,
    pub port: u16,
    #[serde(rename = "clientId")]
    pub client_id: String,
    pub password: String,
    pub topic: String,
}

/// Unicast answer to a discovery probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReply {
    pub ip: String,
    pub port: u16,
}

/// One requested field mutation on the control path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub name: String,
    pub value: FieldValue,
}
