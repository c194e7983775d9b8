//! Readiness-driven event loop executed on the actor's worker thread.

use std::io;
use std::time::Duration;

use mio::event::Event;
use mio::{Events, Poll, Registry};

const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Tells the reactor whether to keep polling after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

/// Receives every readiness event observed by the reactor.
pub(crate) trait EventHandler {
    fn on_event(&mut self, registry: &Registry, event: &Event) -> Flow;

    /// Runs after each batch. Returning `true` reports leftover work, and the
    /// next poll then returns immediately instead of blocking.
    fn after_batch(&mut self) -> bool {
        false
    }
}

/// Single-threaded readiness poller owned by an [`Actor`](crate::Actor).
///
/// The reactor is moved onto the actor's worker thread for the duration of a
/// run and handed back once the thread exits, so one reactor serves every
/// run/terminate cycle of its actor.
#[derive(Debug)]
pub struct Reactor {
    poll: Poll,
    events: Events,
}

impl Reactor {
    /// Creates a reactor with the default event batch size.
    ///
    /// # Errors
    ///
    /// Returns the operating system error raised while creating the poller.
    pub fn new() -> io::Result<Self> {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates a reactor that processes at most `capacity` events per poll.
    ///
    /// # Errors
    ///
    /// Returns the operating system error raised while creating the poller.
    pub fn with_capacity(capacity: usize) -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(capacity.max(1)),
        })
    }

    pub(crate) fn registry(&self) -> &Registry {
        self.poll.registry()
    }

    /// Polls until the handler asks to stop.
    ///
    /// The stop request takes effect once the current batch of events has been
    /// handled, before any leftover work. Interrupted polls are retried.
    pub(crate) fn run<H: EventHandler>(&mut self, handler: &mut H) -> io::Result<()> {
        let mut pending = false;
        loop {
            let timeout = pending.then_some(Duration::ZERO);
            match self.poll.poll(&mut self.events, timeout) {
                Ok(()) => {}
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(error),
            }

            let mut flow = Flow::Continue;
            for event in &self.events {
                if handler.on_event(self.poll.registry(), event) == Flow::Stop {
                    flow = Flow::Stop;
                }
            }
            if flow == Flow::Stop {
                return Ok(());
            }
            pending = handler.after_batch();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use mio::{Token, Waker};

    use super::*;

    struct StopOnWake {
        seen: usize,
    }

    impl EventHandler for StopOnWake {
        fn on_event(&mut self, _registry: &Registry, event: &Event) -> Flow {
            self.seen += 1;
            if event.token() == Token(0) {
                Flow::Stop
            } else {
                Flow::Continue
            }
        }
    }

    /// Reports leftover work on every turn and wakes itself on the third.
    struct Busy {
        turns: usize,
        waker: Waker,
    }

    impl EventHandler for Busy {
        fn on_event(&mut self, _registry: &Registry, event: &Event) -> Flow {
            if event.token() == Token(0) {
                Flow::Stop
            } else {
                Flow::Continue
            }
        }

        fn after_batch(&mut self) -> bool {
            self.turns += 1;
            if self.turns == 3 {
                self.waker.wake().expect("wake reactor");
            }
            true
        }
    }

    #[test]
    fn leftover_work_polls_without_blocking() {
        let mut reactor = Reactor::with_capacity(8).expect("create reactor");
        let waker = Waker::new(reactor.registry(), Token(0)).expect("create waker");

        // One readiness edge starts the first batch; later turns only happen
        // because the handler reports leftover work.
        let mut listener =
            mio::net::TcpListener::bind("127.0.0.1:0".parse().expect("address")).expect("bind");
        reactor
            .registry()
            .register(&mut listener, Token(1), mio::Interest::READABLE)
            .expect("register listener");
        let _client =
            std::net::TcpStream::connect(listener.local_addr().expect("address")).expect("connect");

        let mut handler = Busy { turns: 0, waker };
        reactor.run(&mut handler).expect("run reactor");
        assert_eq!(handler.turns, 3);
    }

    #[test]
    fn run_returns_after_cross_thread_wake() {
        let mut reactor = Reactor::with_capacity(8).expect("create reactor");
        let waker = Arc::new(Waker::new(reactor.registry(), Token(0)).expect("create waker"));

        let remote = Arc::clone(&waker);
        let signaller = thread::spawn(move || remote.wake().expect("wake reactor"));

        let mut handler = StopOnWake { seen: 0 };
        reactor.run(&mut handler).expect("run reactor");
        signaller.join().expect("join signaller");
        assert_eq!(handler.seen, 1);
    }
}
