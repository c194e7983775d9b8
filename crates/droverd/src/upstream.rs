//! Per-request response handles.

use std::fmt;
use std::rc::Weak;

use drover_proto::{Band, Message};

use crate::channel::Channel;
use crate::dispatch::ResponseStream;

/// Response handle for one inbound request.
///
/// An upstream writes `chunk`, `error` and `choke` frames tagged with the
/// request's band back onto the connection that delivered it. It only holds a
/// weak reference to that connection: once the actor tears the connection
/// down, every call becomes a silent no-op.
///
/// Upstreams are confined to the reactor thread, so they are neither `Send`
/// nor `Sync`.
#[derive(Clone)]
pub struct Upstream {
    channel: Weak<Channel>,
    band: Band,
}

impl Upstream {
    pub(crate) const fn new(channel: Weak<Channel>, band: Band) -> Self {
        Self { channel, band }
    }

    /// Band of the request this handle answers.
    #[must_use]
    pub const fn band(&self) -> Band {
        self.band
    }

    /// Reports whether the originating connection is still alive.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.channel.strong_count() > 0
    }

    fn send(&self, message: &Message) {
        if let Some(channel) = self.channel.upgrade() {
            channel.send(message);
        }
    }
}

impl ResponseStream for Upstream {
    fn write(&self, chunk: &[u8]) {
        self.send(&Message::chunk(self.band, chunk));
    }

    fn error(&self, code: i32, reason: &str) {
        self.send(&Message::error(self.band, code, reason));
    }

    fn close(&self) {
        self.send(&Message::choke(self.band));
    }
}

impl fmt::Debug for Upstream {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Upstream")
            .field("band", &self.band)
            .field("attached", &self.is_attached())
            .finish()
    }
}
