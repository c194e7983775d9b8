mod errors;
mod launch;
pub(crate) mod shutdown;

pub use errors::LaunchError;
pub use launch::{report_failure, run_daemon, run_daemon_with};
pub use shutdown::{ShutdownError, ShutdownSignal, ShutdownTrigger, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
