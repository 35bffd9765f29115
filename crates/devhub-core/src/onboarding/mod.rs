//! TCP onboarding handshake.
//!
//! Devices that learned the hub's endpoint via discovery connect here with
//! a specification; valid ones become pending offers the caller can commit.

pub mod listener;

pub use listener::{OnboardingListener, PendingOnboarding, ONBOARDING_PORT};
