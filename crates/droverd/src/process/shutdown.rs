//! Termination signal handling for the daemon process.

use std::fmt;
use std::io;
use std::sync::{Mutex, PoisonError};

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use signal_hook::low_level::signal_name;
use thiserror::Error;
use tracing::{debug, info};

use super::PROCESS_TARGET;

/// Signals that stop the actor and end the process.
const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until the actor should be terminated.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] when the notification source fails.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Waits for SIGTERM, SIGINT, SIGQUIT or SIGHUP.
///
/// Handlers are installed by [`SystemShutdownSignal::install`], before the
/// actor starts listening, so a signal arriving during start-up is held until
/// [`ShutdownSignal::wait`] picks it up.
pub struct SystemShutdownSignal {
    signals: Mutex<Signals>,
}

impl SystemShutdownSignal {
    /// Installs the termination signal handlers.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::Install`] when the handlers cannot be
    /// registered.
    pub fn install() -> Result<Self, ShutdownError> {
        let signals =
            Signals::new(TERMINATION_SIGNALS).map_err(|source| ShutdownError::Install { source })?;
        Ok(Self {
            signals: Mutex::new(signals),
        })
    }

    /// Returns a trigger that releases [`ShutdownSignal::wait`] without a
    /// signal.
    #[must_use]
    pub fn trigger(&self) -> ShutdownTrigger {
        let signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        ShutdownTrigger(signals.handle())
    }
}

impl fmt::Debug for SystemShutdownSignal {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SystemShutdownSignal")
            .field("signals", &TERMINATION_SIGNALS)
            .finish()
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        match signals.forever().next() {
            Some(signal) => info!(
                target: PROCESS_TARGET,
                signal,
                name = signal_name(signal).unwrap_or("unknown"),
                "shutdown signal received"
            ),
            None => debug!(target: PROCESS_TARGET, "shutdown triggered"),
        }
        Ok(())
    }
}

/// Ends a pending [`SystemShutdownSignal`] wait from another thread.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger(Handle);

impl ShutdownTrigger {
    /// Releases the waiter. Later waits return immediately.
    pub fn fire(&self) {
        self.0.close();
    }
}
