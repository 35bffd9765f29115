//! UDP device discovery.
//!
//! Answers broadcast probes from unconfigured devices with the onboarding
//! listener's endpoint.

pub mod responder;

pub use responder::{local_ip, BroadcastResponder, DISCOVERY_PORT};
