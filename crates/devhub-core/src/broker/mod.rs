//! Broker admin integration.
//!
//! Credential and ACL provisioning against the broker's admin API.

pub mod admin;

pub use admin::{AclAction, AclPermission, AclPolicy, AclRule, BrokerAdmin, EmqxAdmin};
