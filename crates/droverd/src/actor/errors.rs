//! Error types for actor lifecycle operations.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced by [`Actor`](crate::Actor) lifecycle calls.
///
/// Connection-level failures never appear here; they only ever tear down the
/// affected connection.
#[derive(Debug, Error)]
pub enum ActorError {
    /// An endpoint could not be bound.
    #[error("unable to bind at '{endpoint}': {source}")]
    Configuration {
        /// Endpoint that failed to bind.
        endpoint: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A bound listener could not be registered with the reactor.
    #[error("failed to register connector at '{endpoint}': {source}")]
    Register {
        /// Endpoint of the listener.
        endpoint: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The termination signal could not be registered with the reactor.
    #[error("failed to register termination signal: {source}")]
    Signal {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The termination signal could not be delivered.
    #[error("failed to wake reactor thread: {source}")]
    Wake {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The worker thread could not be started.
    ///
    /// The reactor had already been handed to the thread closure and is
    /// dropped with it, so later runs fail with
    /// [`ActorError::ReactorUnavailable`].
    #[error("failed to spawn reactor thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The event loop stopped on a polling failure.
    #[error("reactor loop failed: {source}")]
    Reactor {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The worker thread panicked; its reactor is lost.
    #[error("reactor thread panicked")]
    WorkerPanicked,
    /// A previous failure lost the reactor, so the actor cannot run again.
    ///
    /// Follows [`ActorError::Spawn`] and [`ActorError::WorkerPanicked`].
    #[error("reactor is unavailable after an earlier failure")]
    ReactorUnavailable,
}

impl ActorError {
    /// Returns `true` for bind failures caused by the supplied endpoints.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}
