//! Event-name routing table.
//!
//! The router is assembled before the actor starts and is immutable
//! afterwards, so the reactor thread reads it without locking.

use std::collections::HashMap;
use std::fmt;

use drover_proto::{Message, Payload};
use tracing::debug;

use super::{DISPATCH_TARGET, Dispatch, ResponseStream};
use crate::Upstream;

/// Error code sent when an `invoke` names an unregistered event.
pub const UNKNOWN_EVENT: i32 = 1;

/// Handler registered for one event name.
///
/// The handler owns the response stream and may keep it past the call, as
/// long as it stays on the reactor thread.
pub type Handler = Box<dyn Fn(&Message, Box<dyn ResponseStream>) + Send + Sync>;

/// Dispatch that routes `invoke` messages by event name.
#[derive(Default)]
pub struct Router {
    handlers: HashMap<String, Handler>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event`, replacing any previous registration.
    #[must_use]
    pub fn on<F>(mut self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Message, Box<dyn ResponseStream>) + Send + Sync + 'static,
    {
        self.handlers.insert(event.into(), Box::new(handler));
        self
    }

    /// Registered event names in lexical order.
    #[must_use]
    pub fn events(&self) -> Vec<&str> {
        let mut events: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        events.sort_unstable();
        events
    }

    /// Routes one message to its handler.
    ///
    /// Unknown events are answered with an [`UNKNOWN_EVENT`] error followed by
    /// a close. Messages other than `invoke` are ignored.
    pub fn route(&self, message: &Message, stream: Box<dyn ResponseStream>) {
        let Payload::Invoke { event } = message.payload() else {
            debug!(
                target: DISPATCH_TARGET,
                band = %message.band(),
                kind = message.payload().kind(),
                "ignoring non-invoke message"
            );
            return;
        };

        if let Some(handler) = self.handlers.get(event) {
            debug!(
                target: DISPATCH_TARGET,
                band = %message.band(),
                event = event.as_str(),
                "routing invocation"
            );
            handler(message, stream);
        } else {
            debug!(
                target: DISPATCH_TARGET,
                band = %message.band(),
                event = event.as_str(),
                "rejecting unknown event"
            );
            stream.error(UNKNOWN_EVENT, &format!("unknown event '{event}'"));
            stream.close();
        }
    }
}

impl Dispatch for Router {
    fn invoke(&self, message: Message, upstream: Upstream) {
        self.route(&message, Box::new(upstream));
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Router")
            .field("events", &self.events())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use drover_proto::Band;
    use mockall::Sequence;

    use super::*;
    use crate::dispatch::MockResponseStream;

    #[test]
    fn routes_invocations_to_registered_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let router = Router::new().on("ping", move |message, stream| {
            assert_eq!(message.band(), Band::new(7));
            counter.fetch_add(1, Ordering::SeqCst);
            stream.write(b"pong");
            stream.close();
        });

        let mut stream = MockResponseStream::new();
        let mut sequence = Sequence::new();
        stream
            .expect_write()
            .withf(|chunk| chunk.to_vec() == b"pong".to_vec())
            .times(1)
            .in_sequence(&mut sequence)
            .return_const(());
        stream
            .expect_close()
            .times(1)
            .in_sequence(&mut sequence)
            .return_const(());
        stream.expect_error().never();

        router.route(&Message::invoke(Band::new(7), "ping"), Box::new(stream));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_event_gets_error_then_close() {
        let router = Router::new();
        let mut stream = MockResponseStream::new();
        let mut sequence = Sequence::new();
        stream
            .expect_error()
            .withf(|code, reason| *code == UNKNOWN_EVENT && reason.contains("missing"))
            .times(1)
            .in_sequence(&mut sequence)
            .return_const(());
        stream
            .expect_close()
            .times(1)
            .in_sequence(&mut sequence)
            .return_const(());
        stream.expect_write().never();

        router.route(&Message::invoke(Band::new(1), "missing"), Box::new(stream));
    }

    #[test]
    fn ignores_non_invoke_messages() {
        let router = Router::new().on("ping", |_, _| panic!("must not be routed"));
        let mut stream = MockResponseStream::new();
        stream.expect_write().never();
        stream.expect_error().never();
        stream.expect_close().never();

        router.route(&Message::choke(Band::new(2)), Box::new(stream));
    }

    #[test]
    fn lists_registered_events_in_order() {
        let router = Router::new()
            .on("version", |_, _| {})
            .on("ping", |_, _| {});
        assert_eq!(router.events(), vec!["ping", "version"]);
    }
}
