//! Actor core of the drover job engine.
//!
//! The daemon accepts TCP connections, decodes JSONL frames and hands each
//! message to a [`Dispatch`] along with an [`Upstream`] through which the
//! response is streamed back. All socket work for one [`Actor`] happens on a
//! single worker thread driven by a [`Reactor`].
//!
//! ## Ownership
//!
//! Channels are owned by the actor's worker thread. Upstreams only hold weak
//! references, so a disconnected or terminated channel turns every
//! outstanding upstream into a no-op instead of keeping the socket alive.
//!
//! ## Termination
//!
//! [`Actor::terminate`] is the only cross-thread entry point. It signals the
//! worker, waits for it to exit and closes every connection the worker owned.

mod actor;
mod channel;
mod connector;
pub mod dispatch;
mod process;
mod reactor;
pub mod telemetry;
mod upstream;

pub use actor::{Actor, ActorError};
pub use dispatch::{Dispatch, ResponseStream, Router, UNKNOWN_EVENT, builtin_router};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, ShutdownTrigger, SystemShutdownSignal,
    report_failure, run_daemon, run_daemon_with,
};
pub use reactor::Reactor;
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use upstream::Upstream;
