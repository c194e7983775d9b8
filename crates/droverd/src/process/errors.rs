//! Defines the error surface for daemon launch and supervision.

use thiserror::Error;

use drover_config::EndpointError;

use crate::actor::ActorError;
use crate::telemetry::TelemetryError;

use super::shutdown::ShutdownError;

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Telemetry could not be installed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// A configured endpoint did not resolve.
    #[error("failed to resolve listen endpoint: {source}")]
    Endpoint {
        /// Underlying resolution error.
        #[source]
        source: EndpointError,
    },
    /// The reactor could not be created.
    #[error("failed to create reactor: {source}")]
    Reactor {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The actor failed to start or stop.
    #[error("actor failed: {source}")]
    Actor {
        /// Underlying actor error.
        #[source]
        source: ActorError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
}

impl From<TelemetryError> for LaunchError {
    fn from(source: TelemetryError) -> Self {
        Self::Telemetry { source }
    }
}

impl From<EndpointError> for LaunchError {
    fn from(source: EndpointError) -> Self {
        Self::Endpoint { source }
    }
}

impl From<ActorError> for LaunchError {
    fn from(source: ActorError) -> Self {
        Self::Actor { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}
