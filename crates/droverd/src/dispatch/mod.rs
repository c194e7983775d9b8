//! Request handling seams.
//!
//! The actor hands every decoded [`Message`] to a [`Dispatch`] together with
//! an [`Upstream`] bound to the message's band. What runs next is up to the
//! dispatch; the actor neither inspects payloads nor originates responses.
//!
//! Dispatch is invoked synchronously on the reactor thread. A slow
//! implementation stalls every connection served by the same actor.

mod builtin;
mod router;

use drover_proto::Message;

use crate::Upstream;

pub use self::builtin::builtin_router;
pub use self::router::{Handler, Router, UNKNOWN_EVENT};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Receives every inbound message together with its response handle.
pub trait Dispatch: Send + Sync + 'static {
    /// Handles one message. Responses, if any, go through `upstream`.
    fn invoke(&self, message: Message, upstream: Upstream);
}

/// Emits response frames for one request.
///
/// Well-behaved callers emit any number of chunks, at most one error, and
/// finish with exactly one close. The stream itself does not enforce this.
#[cfg_attr(test, mockall::automock)]
pub trait ResponseStream {
    /// Sends one `chunk` frame.
    fn write(&self, chunk: &[u8]);

    /// Sends an `error` frame.
    fn error(&self, code: i32, reason: &str);

    /// Sends the terminal `choke` frame.
    fn close(&self);
}
