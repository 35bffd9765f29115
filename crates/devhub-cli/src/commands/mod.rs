//! Command implementations.

mod devices;
mod onboard;
mod remove;
mod set;

pub use devices::{run_list, run_show};
pub use onboard::run_onboard;
pub use remove::run_remove;
pub use set::run_set;
