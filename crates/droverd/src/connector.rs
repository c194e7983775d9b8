//! Listening sockets bound to the actor's endpoints.

use std::io;
use std::net::SocketAddr;

use mio::net::{TcpListener, TcpStream};
use mio::{Interest, Registry, Token};
use tracing::{info, warn};

use crate::actor::ACTOR_TARGET;

/// One bound listening socket.
#[derive(Debug)]
pub(crate) struct Connector {
    listener: TcpListener,
    endpoint: SocketAddr,
    last_error: Option<io::ErrorKind>,
}

impl Connector {
    /// Binds a non-blocking listener at `endpoint`.
    pub(crate) fn bind(endpoint: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(endpoint)?;
        let endpoint = listener.local_addr()?;
        Ok(Self {
            listener,
            endpoint,
            last_error: None,
        })
    }

    /// Address the listener is bound to, with any wildcard port resolved.
    pub(crate) const fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub(crate) fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        registry.register(&mut self.listener, token, Interest::READABLE)?;
        info!(
            target: ACTOR_TARGET,
            endpoint = %self.endpoint,
            "connector active"
        );
        Ok(())
    }

    /// Accepts every pending connection, handing each to `on_connection`.
    ///
    /// Accept errors are logged once per distinct error kind and end the
    /// current drain; the next readiness event retries.
    pub(crate) fn accept_pending<F>(&mut self, mut on_connection: F)
    where
        F: FnMut(TcpStream, SocketAddr),
    {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    self.last_error = None;
                    on_connection(stream, peer);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    let kind = error.kind();
                    if self.last_error != Some(kind) {
                        warn!(
                            target: ACTOR_TARGET,
                            endpoint = %self.endpoint,
                            error = %error,
                            "socket accept error"
                        );
                    }
                    self.last_error = Some(kind);
                    return;
                }
            }
        }
    }
}
