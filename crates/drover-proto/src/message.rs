//! Tagged frames exchanged over a connection.
//!
//! Every frame carries a [`Band`] that correlates it with one logical
//! request/response stream on its connection, plus a [`Payload`] naming the
//! frame kind. The same model is used in both directions: peers send
//! `invoke`/`chunk`/`choke` frames to start and feed requests, and the actor
//! answers with `chunk`, `error` and `choke` frames on the same band.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection-scoped correlation tag chosen by the remote peer.
///
/// Bands are not unique across connections; two peers may both use band `1`
/// for unrelated requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Band(u64);

impl Band {
    /// Wraps a raw tag value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw tag value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Band {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Band {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Frame body, discriminated by the `kind` field on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Starts a request named `event`.
    Invoke {
        /// Name of the requested event.
        event: String,
    },
    /// One unit of data for the band.
    Chunk {
        /// Opaque bytes.
        data: Vec<u8>,
    },
    /// The request on the band failed.
    Error {
        /// Numeric failure code defined by the handler.
        code: i32,
        /// Human readable reason.
        reason: String,
    },
    /// No more frames follow for the band.
    Choke,
    /// Liveness check.
    Heartbeat,
    /// The peer is going away.
    Terminate {
        /// Numeric termination code.
        code: i32,
        /// Human readable reason.
        reason: String,
    },
}

impl Payload {
    /// Short name of the frame kind, as written on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Invoke { .. } => "invoke",
            Self::Chunk { .. } => "chunk",
            Self::Error { .. } => "error",
            Self::Choke => "choke",
            Self::Heartbeat => "heartbeat",
            Self::Terminate { .. } => "terminate",
        }
    }
}

/// A decoded frame: a band plus its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    band: Band,
    payload: Payload,
}

impl Message {
    /// Builds a message from its parts.
    #[must_use]
    pub const fn new(band: Band, payload: Payload) -> Self {
        Self { band, payload }
    }

    /// Builds an `invoke` frame.
    #[must_use]
    pub fn invoke(band: Band, event: impl Into<String>) -> Self {
        Self::new(
            band,
            Payload::Invoke {
                event: event.into(),
            },
        )
    }

    /// Builds a `chunk` frame.
    #[must_use]
    pub fn chunk(band: Band, data: impl Into<Vec<u8>>) -> Self {
        Self::new(band, Payload::Chunk { data: data.into() })
    }

    /// Builds an `error` frame.
    #[must_use]
    pub fn error(band: Band, code: i32, reason: impl Into<String>) -> Self {
        Self::new(
            band,
            Payload::Error {
                code,
                reason: reason.into(),
            },
        )
    }

    /// Builds a `choke` frame.
    #[must_use]
    pub const fn choke(band: Band) -> Self {
        Self::new(band, Payload::Choke)
    }

    /// Correlation tag of the frame.
    #[must_use]
    pub const fn band(&self) -> Band {
        self.band
    }

    /// Frame body.
    #[must_use]
    pub const fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Splits the message into its parts.
    #[must_use]
    pub fn into_parts(self) -> (Band, Payload) {
        (self.band, self.payload)
    }
}
