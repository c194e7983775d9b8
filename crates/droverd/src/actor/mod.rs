//! TCP actor: connectors, channels and the worker thread that drives them.
//!
//! An [`Actor`] owns a [`Reactor`] and a [`Dispatch`]. [`Actor::run`] binds
//! every endpoint, moves the reactor onto a dedicated worker thread and
//! returns. From then on all socket work (accepting, reading, writing and
//! dispatching) happens on that thread. [`Actor::terminate`] wakes the
//! thread, waits for it to exit and takes the reactor back, closing every
//! connector and channel on the way.

mod errors;
mod event_loop;

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::{fmt, io};

use mio::Waker;
use tracing::{debug, info, warn};

pub use self::errors::ActorError;
use self::event_loop::{EventLoop, TERMINATE, connector_token};
use crate::connector::Connector;
use crate::dispatch::Dispatch;
use crate::reactor::Reactor;

/// Tracing target for actor lifecycle and connection events.
pub(crate) const ACTOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::actor");

const WORKER_NAME: &str = "drover-reactor";

/// State returned by the worker thread when its loop ends.
struct LoopExit {
    reactor: Reactor,
    connectors: Vec<Connector>,
    result: io::Result<()>,
}

/// Accepts TCP connections and hands their messages to a dispatch.
///
/// The actor alternates between two states. While idle it owns its reactor
/// and has no connectors. While running the reactor lives on the worker
/// thread and [`Actor::endpoints`] reports the bound addresses.
///
/// The actor keeps its dispatch as the concrete type `D`, so the owner can
/// still configure or inspect it through [`Actor::dispatch`].
///
/// Dropping a running actor terminates it.
pub struct Actor<D: Dispatch> {
    reactor: Option<Reactor>,
    dispatch: Arc<D>,
    terminate: Waker,
    endpoints: Vec<SocketAddr>,
    worker: Option<JoinHandle<LoopExit>>,
}

impl<D: Dispatch> Actor<D> {
    /// Creates an idle actor around `reactor` and `dispatch`.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Signal`] when the termination signal cannot be
    /// registered with the reactor.
    pub fn new(reactor: Reactor, dispatch: D) -> Result<Self, ActorError> {
        Self::with_shared(reactor, Arc::new(dispatch))
    }

    /// Creates an idle actor around an already shared dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Signal`] when the termination signal cannot be
    /// registered with the reactor.
    pub fn with_shared(reactor: Reactor, dispatch: Arc<D>) -> Result<Self, ActorError> {
        let terminate = Waker::new(reactor.registry(), TERMINATE)
            .map_err(|source| ActorError::Signal { source })?;
        Ok(Self {
            reactor: Some(reactor),
            dispatch,
            terminate,
            endpoints: Vec::new(),
            worker: None,
        })
    }

    /// Binds every endpoint and starts serving them on the worker thread.
    ///
    /// Binding is all-or-nothing: when any endpoint fails, the listeners bound
    /// so far are closed and the actor stays idle. Port `0` asks the operating
    /// system for a port; [`Actor::endpoints`] reports the one it picked.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Configuration`] naming the first endpoint that
    /// could not be bound. Registration and thread start-up failures are
    /// reported through their own variants. A failed thread start-up loses the
    /// reactor, after which every `run` returns
    /// [`ActorError::ReactorUnavailable`].
    ///
    /// # Panics
    ///
    /// Panics when the actor is already running or `endpoints` is empty.
    pub fn run(&mut self, endpoints: &[SocketAddr]) -> Result<(), ActorError> {
        assert!(self.worker.is_none(), "actor is already running");
        assert!(!endpoints.is_empty(), "actor needs at least one endpoint");

        let Some(reactor) = self.reactor.as_ref() else {
            return Err(ActorError::ReactorUnavailable);
        };
        let connectors = bind_all(reactor, endpoints)?;
        let bound: Vec<SocketAddr> = connectors.iter().map(Connector::endpoint).collect();

        let Some(mut reactor) = self.reactor.take() else {
            return Err(ActorError::ReactorUnavailable);
        };
        let dispatch: Arc<dyn Dispatch> = Arc::<D>::clone(&self.dispatch);
        let worker = thread::Builder::new()
            .name(WORKER_NAME.to_owned())
            .spawn(move || {
                let mut event_loop = EventLoop::new(connectors, dispatch);
                let result = reactor.run(&mut event_loop);
                LoopExit {
                    reactor,
                    connectors: event_loop.into_connectors(),
                    result,
                }
            })
            .map_err(|source| ActorError::Spawn { source })?;

        info!(
            target: ACTOR_TARGET,
            endpoints = ?bound,
            "actor running"
        );
        self.endpoints = bound;
        self.worker = Some(worker);
        Ok(())
    }

    /// Stops the worker thread and closes every connector and channel.
    ///
    /// Returns once the worker has exited. Upstreams handed out during the
    /// run become inert. The actor may be run again afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Reactor`] when the loop had stopped on a polling
    /// failure, [`ActorError::WorkerPanicked`] when the worker panicked and
    /// [`ActorError::Wake`] when the worker could not be signalled.
    ///
    /// # Panics
    ///
    /// Panics when the actor is not running.
    pub fn terminate(&mut self) -> Result<(), ActorError> {
        let Some(worker) = self.worker.take() else {
            panic!("actor is not running");
        };

        if let Err(source) = self.terminate.wake() {
            self.worker = Some(worker);
            return Err(ActorError::Wake { source });
        }

        let joined = worker.join();
        self.endpoints.clear();
        let LoopExit {
            reactor,
            connectors,
            result,
        } = joined.map_err(|_| ActorError::WorkerPanicked)?;

        self.reactor = Some(reactor);
        drop(connectors);
        info!(target: ACTOR_TARGET, "actor terminated");
        result.map_err(|source| ActorError::Reactor { source })
    }

    /// Addresses of the bound connectors, in the order they were requested.
    ///
    /// # Panics
    ///
    /// Panics when the actor has no connectors, that is when it is idle.
    #[must_use]
    pub fn endpoints(&self) -> Vec<SocketAddr> {
        assert!(!self.endpoints.is_empty(), "actor has no bound connectors");
        self.endpoints.clone()
    }

    /// The dispatch receiving this actor's messages.
    ///
    /// While the actor runs, the worker thread shares the same instance, so
    /// any configuration changes must go through `D`'s own synchronisation.
    #[must_use]
    pub fn dispatch(&self) -> &D {
        &self.dispatch
    }

    /// Returns `true` between a successful [`Actor::run`] and the matching
    /// [`Actor::terminate`].
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl<D: Dispatch> Drop for Actor<D> {
    fn drop(&mut self) {
        if self.is_running()
            && let Err(error) = self.terminate()
        {
            warn!(target: ACTOR_TARGET, error = %error, "failed to terminate actor on drop");
        }
    }
}

impl<D: Dispatch> fmt::Debug for Actor<D> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Actor")
            .field("running", &self.is_running())
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

/// Binds and registers one connector per endpoint, or none at all.
fn bind_all(reactor: &Reactor, endpoints: &[SocketAddr]) -> Result<Vec<Connector>, ActorError> {
    let mut connectors = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        let connector = Connector::bind(*endpoint).map_err(|source| {
            debug!(
                target: ACTOR_TARGET,
                endpoint = %endpoint,
                bound = connectors.len(),
                "bind failed; releasing earlier connectors"
            );
            ActorError::Configuration {
                endpoint: *endpoint,
                source,
            }
        })?;
        connectors.push(connector);
    }
    for (index, connector) in connectors.iter_mut().enumerate() {
        let endpoint = connector.endpoint();
        connector
            .register(reactor.registry(), connector_token(index))
            .map_err(|source| ActorError::Register { endpoint, source })?;
    }
    Ok(connectors)
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::{Ipv4Addr, TcpListener, TcpStream};

    use drover_proto::{Band, Message, Payload};
    use rstest::{fixture, rstest};

    use super::*;
    use crate::dispatch::{Router, builtin_router};

    fn loopback() -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
    }

    #[fixture]
    fn actor() -> Actor<Router> {
        Actor::new(Reactor::new().expect("reactor"), builtin_router()).expect("actor")
    }

    #[rstest]
    fn reports_os_assigned_ports(mut actor: Actor<Router>) {
        actor.run(&[loopback(), loopback()]).expect("run");
        let endpoints = actor.endpoints();
        assert_eq!(endpoints.len(), 2);
        assert!(endpoints.iter().all(|endpoint| endpoint.port() != 0));
        assert_ne!(endpoints[0], endpoints[1]);
        actor.terminate().expect("terminate");
        assert!(!actor.is_running());
    }

    #[rstest]
    fn failed_bind_leaves_actor_idle(mut actor: Actor<Router>) {
        let occupied = TcpListener::bind(loopback()).expect("occupy port");
        let taken = occupied.local_addr().expect("address");

        let error = actor.run(&[loopback(), taken]).expect_err("bind must fail");
        assert!(error.is_configuration());
        assert!(error.to_string().contains(&taken.to_string()));
        assert!(!actor.is_running());

        actor.run(&[loopback()]).expect("actor remains runnable");
        actor.terminate().expect("terminate");
    }

    #[rstest]
    fn serves_builtin_ping(mut actor: Actor<Router>) {
        actor.run(&[loopback()]).expect("run");
        let endpoint = actor.endpoints()[0];

        let mut client = TcpStream::connect(endpoint).expect("connect");
        client
            .write_all(br#"{"band":3,"payload":{"kind":"invoke","event":"ping"}}"#)
            .and_then(|()| client.write_all(b"\n"))
            .expect("send invoke");

        let mut reader = BufReader::new(client);
        let mut frames = Vec::new();
        for _ in 0..2 {
            let mut line = String::new();
            reader.read_line(&mut line).expect("read frame");
            frames.push(serde_json::from_str::<Message>(&line).expect("decode frame"));
        }

        assert_eq!(frames[0], Message::chunk(Band::new(3), b"pong".to_vec()));
        assert_eq!(frames[1].payload(), &Payload::Choke);
        actor.terminate().expect("terminate");
    }

    #[rstest]
    #[should_panic(expected = "actor is not running")]
    fn terminate_requires_running_actor(mut actor: Actor<Router>) {
        let _ = actor.terminate();
    }

    #[rstest]
    #[should_panic(expected = "actor has no bound connectors")]
    fn idle_actor_has_no_endpoints(actor: Actor<Router>) {
        let _ = actor.endpoints();
    }

    #[rstest]
    fn exposes_the_concrete_dispatch(mut actor: Actor<Router>) {
        assert_eq!(actor.dispatch().events(), vec!["ping", "version"]);
        actor.run(&[loopback()]).expect("run");
        assert_eq!(actor.dispatch().events(), vec!["ping", "version"]);
        actor.terminate().expect("terminate");
    }

    #[rstest]
    fn lost_reactor_makes_actor_unrunnable(mut actor: Actor<Router>) {
        drop(actor.reactor.take());
        let error = actor.run(&[loopback()]).expect_err("run needs a reactor");
        assert!(matches!(error, ActorError::ReactorUnavailable));
        assert!(!actor.is_running());
    }

    #[rstest]
    fn drop_terminates_running_actor(mut actor: Actor<Router>) {
        actor.run(&[loopback()]).expect("run");
        let endpoint = actor.endpoints()[0];
        drop(actor);
        assert!(
            TcpStream::connect(endpoint).is_err(),
            "listener must be closed once the actor is dropped"
        );
    }
}
