//! Control path: validated field updates pushed to devices.

pub mod dispatcher;

pub use dispatcher::ControlDispatcher;
