//! Device registration saga.
//!
//! Provisions a device identity across the persistence store and the broker
//! admin API, with ordered compensating rollback on failure.

pub mod password;
pub mod registrar;

pub use password::{generate_password, DEFAULT_PASSWORD_LEN};
pub use registrar::Registrar;
