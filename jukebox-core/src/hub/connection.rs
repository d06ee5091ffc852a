use std::sync::Arc;

use async_trait::async_trait;
use crossbeam::atomic::AtomicCell;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::Id;

use super::{Payload, RoomTag, Scope};

pub type ConnectionId = Id<Connection>;

/// The lifecycle of a [Connection]. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, but not yet attached to a hub
    Connecting,
    /// Attached and receiving broadcasts
    Active,
    Closed,
}

/// Which broadcasts a connection wants to receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    /// Only messages scoped to this room, plus messages sent to everyone
    Room(RoomTag),
    /// Every message, regardless of scope
    Global,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Connection is closed")]
    Closed,
    #[error("Delivery timed out")]
    TimedOut,
    #[error("{0}")]
    Other(String),
}

/// The writing end of a live real-time channel.
#[async_trait]
pub trait Outlet: Send + Sync {
    /// Hands a message over to the underlying channel.
    /// An error means the channel is dead and will never accept messages again.
    async fn deliver(&self, payload: Payload) -> Result<(), DeliveryError>;
}

#[async_trait]
impl Outlet for mpsc::Sender<Payload> {
    async fn deliver(&self, payload: Payload) -> Result<(), DeliveryError> {
        self.send(payload).await.map_err(|_| DeliveryError::Closed)
    }
}

/// A live real-time connection known to the hub
pub struct Connection {
    pub id: ConnectionId,
    pub subscription: Subscription,
    state: AtomicCell<ConnectionState>,
    outlet: Box<dyn Outlet>,
}

impl Connection {
    pub fn new<O>(subscription: Subscription, outlet: O) -> Arc<Self>
    where
        O: Outlet + 'static,
    {
        Arc::new(Self {
            id: ConnectionId::new(),
            subscription,
            state: AtomicCell::new(ConnectionState::Connecting),
            outlet: Box::new(outlet),
        })
    }

    /// Creates a connection backed by a bounded channel, returning the receiving end.
    /// Whoever owns the receiver is responsible for writing the messages to the socket.
    pub fn channel(
        subscription: Subscription,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Payload>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        (Self::new(subscription, sender), receiver)
    }

    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    /// Whether a message with the given scope should reach this connection
    pub fn wants(&self, scope: &Scope) -> bool {
        match (scope, &self.subscription) {
            (Scope::All, _) => true,
            (Scope::Room(_), Subscription::Global) => true,
            (Scope::Room(room), Subscription::Room(subscribed)) => room == subscribed,
        }
    }

    pub(super) async fn deliver(&self, payload: Payload) -> Result<(), DeliveryError> {
        self.outlet.deliver(payload).await
    }

    /// Moves the connection from `Connecting` to `Active`.
    /// Returns false if the connection was already used.
    pub(super) fn activate(&self) -> bool {
        self.state
            .compare_exchange(ConnectionState::Connecting, ConnectionState::Active)
            .is_ok()
    }

    pub(super) fn close(&self) {
        self.state.store(ConnectionState::Closed)
    }
}
