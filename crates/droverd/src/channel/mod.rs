//! Reader/writer pair over one accepted connection.
//!
//! A channel is owned by the actor's channel table. Everything else, most
//! notably [`Upstream`](crate::Upstream) handles, holds a [`Weak`](std::rc::Weak)
//! reference and must tolerate the channel disappearing at any time. Channels
//! live entirely on the reactor thread, hence `Rc`/`RefCell` rather than their
//! thread-safe counterparts.

mod reader;
mod writer;

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;

use drover_proto::{FrameError, Message};
use mio::Token;
use mio::net::TcpStream;
use thiserror::Error;

use self::reader::{READS_PER_TURN, Reader};
use self::writer::Writer;

pub(crate) const CHANNEL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::channel");

/// Invoked for every decoded inbound message, in arrival order.
pub(crate) type MessageHandler = Rc<dyn Fn(Message)>;

/// Invoked when either half of the channel stops working.
pub(crate) type DisconnectHandler = Rc<dyn Fn(&Disconnect)>;

/// Identifier of a live connection within one actor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ConnectionId(usize);

impl ConnectionId {
    pub(crate) const fn token(self) -> Token {
        Token(self.0)
    }
}

impl From<Token> for ConnectionId {
    fn from(token: Token) -> Self {
        Self(token.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

/// Why a channel stopped.
#[derive(Debug, Error)]
pub(crate) enum Disconnect {
    #[error("peer closed the connection")]
    PeerClosed,
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error("undecodable inbound frame: {0}")]
    Decode(#[source] FrameError),
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

pub(crate) struct Channel {
    id: ConnectionId,
    peer: SocketAddr,
    socket: TcpStream,
    rd: RefCell<Reader>,
    wr: RefCell<Writer>,
}

impl Channel {
    pub(crate) fn new(id: ConnectionId, peer: SocketAddr, socket: TcpStream) -> Self {
        Self {
            id,
            peer,
            socket,
            rd: RefCell::new(Reader::new()),
            wr: RefCell::new(Writer::new()),
        }
    }

    pub(crate) const fn id(&self) -> ConnectionId {
        self.id
    }

    pub(crate) const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Binds the inbound callbacks.
    pub(crate) fn bind_reader(&self, on_message: MessageHandler, on_disconnect: DisconnectHandler) {
        self.rd.borrow_mut().bind(on_message, on_disconnect);
    }

    /// Binds the outbound failure callback.
    pub(crate) fn bind_writer(&self, on_disconnect: DisconnectHandler) {
        self.wr.borrow_mut().bind(on_disconnect);
    }

    /// Runs one budgeted read turn and fires the reader callbacks.
    ///
    /// Returns `true` when the budget ran out with bytes possibly still
    /// queued in the socket; the caller must schedule another turn because
    /// edge-triggered readiness will not fire again for them.
    ///
    /// No borrow of the channel is held while callbacks run, so they may write
    /// to this very channel.
    pub(crate) fn on_readable(&self) -> bool {
        let outcome = self
            .rd
            .borrow_mut()
            .read_available(&self.socket, READS_PER_TURN);
        let Some((on_message, on_disconnect)) = self.rd.borrow().handlers() else {
            return false;
        };
        for message in outcome.messages {
            on_message(message);
        }
        match outcome.end {
            Some(reason) => {
                on_disconnect(&reason);
                false
            }
            None => outcome.exhausted,
        }
    }

    /// Continues flushing queued frames once the socket accepts more bytes.
    pub(crate) fn on_writable(&self) {
        let result = self.wr.borrow_mut().flush(&self.socket);
        if let Err(reason) = result {
            self.writer_failed(&reason);
        }
    }

    /// Queues a frame behind everything already sent on this channel.
    pub(crate) fn send(&self, message: &Message) {
        let result = self.wr.borrow_mut().write(&self.socket, message);
        if let Err(reason) = result {
            self.writer_failed(&reason);
        }
    }

    fn writer_failed(&self, reason: &Disconnect) {
        let handler = self.wr.borrow().on_disconnect();
        if let Some(on_disconnect) = handler {
            on_disconnect(reason);
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Channel")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Loopback socket pairs for channel-level tests.

    use std::net::{Ipv4Addr, TcpListener, TcpStream as StdTcpStream};

    use mio::net::TcpStream;

    use super::{Channel, ConnectionId};

    /// Returns a channel wrapping the server side plus the blocking client side.
    pub(crate) fn channel_pair(id: usize) -> (Channel, StdTcpStream) {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind listener");
        let addr = listener.local_addr().expect("listener address");
        let client = StdTcpStream::connect(addr).expect("connect client");
        let (server, peer) = listener.accept().expect("accept client");
        server.set_nonblocking(true).expect("non-blocking server");
        let channel = Channel::new(ConnectionId(id), peer, TcpStream::from_std(server));
        (channel, client)
    }
}
