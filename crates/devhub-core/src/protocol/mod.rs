//! Wire protocol shared with devices.
//!
//! JSON payloads for discovery, onboarding, and the MQTT command channel,
//! plus the topic naming convention that correlates replies to requests.

pub mod messages;
pub mod topics;

pub use messages::{
    CommandMessage, ConfirmationMessage, CredentialPayload, DiscoveryReply, ErrorReply, FieldChange,
};
pub use topics::{confirm_topic, device_topic};
