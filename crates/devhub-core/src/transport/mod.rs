//! Broker command transport.
//!
//! Publishes commands to device topics and awaits correlated confirmations.

pub mod command;

pub use command::{CommandTransport, MqttCommandSender, COMMAND_TIMEOUT};
