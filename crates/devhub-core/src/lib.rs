//! DevHub core library.
//!
//! Everything needed to onboard IoT devices onto a local MQTT broker and to
//! mutate their state afterward: the UDP discovery responder, the TCP
//! onboarding handshake, the registration saga, the broker command
//! transport, and the control dispatcher.

pub mod broker;
pub mod control;
pub mod discovery;
pub mod error;
pub mod onboarding;
pub mod protocol;
pub mod registration;
pub mod store;
pub mod transport;
pub mod types;

pub use error::{HubError, Result};
