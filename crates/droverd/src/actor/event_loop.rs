//! Reactor-thread state: connectors, the channel table and routing.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::mem;
use std::net::SocketAddr;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use drover_proto::Message;
use mio::event::Event;
use mio::net::TcpStream;
use mio::{Interest, Registry, Token};
use tracing::{debug, trace, warn};

use super::ACTOR_TARGET;
use crate::channel::{Channel, ConnectionId, Disconnect, DisconnectHandler, MessageHandler};
use crate::connector::Connector;
use crate::dispatch::Dispatch;
use crate::reactor::{EventHandler, Flow};
use crate::upstream::Upstream;

/// Token of the cross-thread termination signal.
pub(super) const TERMINATE: Token = Token(0);
const FIRST_CONNECTOR: usize = 1;

type ChannelTable = HashMap<ConnectionId, Rc<Channel>>;

/// Token under which the connector at `index` is registered.
pub(super) const fn connector_token(index: usize) -> Token {
    Token(FIRST_CONNECTOR + index)
}

/// Everything the reactor thread owns while the actor runs.
///
/// The channel table is the only strong owner of each channel. Callbacks and
/// upstreams reach it through weak references, so dropping the loop closes
/// every connection.
///
/// Channels that used up their read budget while still readable wait in
/// `backlog` and get another turn after each batch, so one busy peer cannot
/// starve other tokens, the termination signal included.
pub(super) struct EventLoop {
    connectors: Vec<Connector>,
    channels: Rc<RefCell<ChannelTable>>,
    dispatch: Arc<dyn Dispatch>,
    next_connection: usize,
    backlog: VecDeque<ConnectionId>,
}

impl EventLoop {
    /// Builds the loop around connectors registered via [`connector_token`].
    pub(super) fn new(connectors: Vec<Connector>, dispatch: Arc<dyn Dispatch>) -> Self {
        let next_connection = FIRST_CONNECTOR + connectors.len();
        Self {
            connectors,
            channels: Rc::new(RefCell::new(HashMap::new())),
            dispatch,
            next_connection,
            backlog: VecDeque::new(),
        }
    }

    /// Closes every live channel and hands the connectors back.
    pub(super) fn into_connectors(self) -> Vec<Connector> {
        let live = self.channels.borrow().len();
        if live > 0 {
            debug!(target: ACTOR_TARGET, channels = live, "closing live channels");
        }
        self.connectors
    }

    #[cfg(test)]
    pub(super) fn channel_count(&self) -> usize {
        self.channels.borrow().len()
    }

    fn connector_index(&self, token: Token) -> Option<usize> {
        token
            .0
            .checked_sub(FIRST_CONNECTOR)
            .filter(|index| *index < self.connectors.len())
    }

    fn on_acceptable(&mut self, registry: &Registry, index: usize) {
        let Some(connector) = self.connectors.get_mut(index) else {
            return;
        };
        let mut accepted = Vec::new();
        connector.accept_pending(|stream, peer| accepted.push((stream, peer)));
        for (stream, peer) in accepted {
            self.on_connection(registry, stream, peer);
        }
    }

    fn on_connection(&mut self, registry: &Registry, mut stream: TcpStream, peer: SocketAddr) {
        let id = ConnectionId::from(Token(self.next_connection));
        self.next_connection += 1;

        if let Err(error) = registry.register(
            &mut stream,
            id.token(),
            Interest::READABLE | Interest::WRITABLE,
        ) {
            warn!(
                target: ACTOR_TARGET,
                peer = %peer,
                error = %error,
                "failed to register accepted connection"
            );
            return;
        }

        let channel = Rc::new(Channel::new(id, peer, stream));
        let on_disconnect = disconnect_handler(&self.channels, id);
        channel.bind_reader(
            message_handler(&self.channels, &self.dispatch, id),
            Rc::clone(&on_disconnect),
        );
        channel.bind_writer(on_disconnect);

        debug!(
            target: ACTOR_TARGET,
            connection = %channel.id(),
            peer = %channel.peer(),
            "channel accepted"
        );
        self.channels.borrow_mut().insert(id, channel);
    }

    fn on_channel_event(&mut self, id: ConnectionId, event: &Event) {
        let channel = self.channels.borrow().get(&id).cloned();
        let Some(channel) = channel else {
            trace!(target: ACTOR_TARGET, connection = %id, "event for closed channel");
            return;
        };

        let readable = event.is_readable() || event.is_read_closed() || event.is_error();
        if readable && !self.backlog.contains(&id) && channel.on_readable() {
            self.backlog.push_back(id);
        }
        if event.is_writable() && self.channels.borrow().contains_key(&id) {
            channel.on_writable();
        }
    }

    /// Gives every backlogged channel one more read turn.
    fn drain_backlog(&mut self) {
        for id in mem::take(&mut self.backlog) {
            let channel = self.channels.borrow().get(&id).cloned();
            if let Some(channel) = channel
                && channel.on_readable()
            {
                self.backlog.push_back(id);
            }
        }
    }
}

impl EventHandler for EventLoop {
    fn on_event(&mut self, registry: &Registry, event: &Event) -> Flow {
        let token = event.token();
        if token == TERMINATE {
            debug!(target: ACTOR_TARGET, "termination signal received");
            return Flow::Stop;
        }
        match self.connector_index(token) {
            Some(index) => self.on_acceptable(registry, index),
            None => self.on_channel_event(ConnectionId::from(token), event),
        }
        Flow::Continue
    }

    fn after_batch(&mut self) -> bool {
        self.drain_backlog();
        if !self.backlog.is_empty() {
            trace!(target: ACTOR_TARGET, channels = self.backlog.len(), "read backlog pending");
        }
        !self.backlog.is_empty()
    }
}

fn message_handler(
    channels: &Rc<RefCell<ChannelTable>>,
    dispatch: &Arc<dyn Dispatch>,
    id: ConnectionId,
) -> MessageHandler {
    let channels = Rc::downgrade(channels);
    let dispatch = Arc::clone(dispatch);
    Rc::new(move |message: Message| route(&channels, dispatch.as_ref(), id, message))
}

fn disconnect_handler(channels: &Rc<RefCell<ChannelTable>>, id: ConnectionId) -> DisconnectHandler {
    let channels = Rc::downgrade(channels);
    Rc::new(move |reason: &Disconnect| teardown(&channels, id, reason))
}

/// Hands a message and a fresh upstream to the dispatch.
///
/// Skipped when the channel has already left the table.
fn route(
    channels: &Weak<RefCell<ChannelTable>>,
    dispatch: &dyn Dispatch,
    id: ConnectionId,
    message: Message,
) {
    let Some(table) = channels.upgrade() else {
        return;
    };
    let channel = table.borrow().get(&id).map(Rc::downgrade);
    let Some(channel) = channel else {
        trace!(
            target: ACTOR_TARGET,
            connection = %id,
            band = %message.band(),
            "dropping message for closed channel"
        );
        return;
    };

    let band = message.band();
    trace!(target: ACTOR_TARGET, connection = %id, band = %band, "dispatching message");
    dispatch.invoke(message, Upstream::new(channel, band));
}

/// Removes the channel from the table. Removing an absent channel is a no-op.
fn teardown(channels: &Weak<RefCell<ChannelTable>>, id: ConnectionId, reason: &Disconnect) {
    let Some(table) = channels.upgrade() else {
        return;
    };
    let removed = table.borrow_mut().remove(&id);
    let Some(channel) = removed else {
        return;
    };
    match reason {
        Disconnect::PeerClosed => debug!(
            target: ACTOR_TARGET,
            connection = %id,
            peer = %channel.peer(),
            "channel disconnected"
        ),
        Disconnect::Decode(_) => warn!(
            target: ACTOR_TARGET,
            connection = %id,
            peer = %channel.peer(),
            reason = %reason,
            "dropping channel after protocol violation"
        ),
        Disconnect::Read(_) | Disconnect::Write(_) => debug!(
            target: ACTOR_TARGET,
            connection = %id,
            peer = %channel.peer(),
            reason = %reason,
            "channel failed"
        ),
    }
}
