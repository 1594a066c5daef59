//! CLI command handlers, one file per command.

mod add;
mod control;
mod remove;
mod run;
mod status;

pub use add::run_add;
pub use control::{send_control, ControlAction};
pub use remove::run_remove;
pub use run::run_coordinator;
pub use status::run_status;
