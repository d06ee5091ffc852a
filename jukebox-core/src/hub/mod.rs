mod connection;

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use futures_util::future::join_all;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    time,
};

use crate::HubConfig;

pub use connection::*;

/// A serialized message, shared between every connection it is sent to.
pub type Payload = Arc<str>;

/// The key connections and messages are partitioned by.
pub type RoomTag = i64;

/// Who a published message is meant for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Connections subscribed to this room, and global subscribers
    Room(RoomTag),
    /// Every connection
    All,
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Connection {0} was already attached or closed")]
    NotConnecting(ConnectionId),
}

enum Command {
    Publish { scope: Scope, payload: Payload },
    Flush(oneshot::Sender<()>),
}

/// Fans messages out to every live connection.
///
/// Publishing only enqueues. A single worker drains the queue in order,
/// so every connection sees messages in the order they were published.
/// A connection whose delivery fails is closed and removed during the same pass.
pub struct Hub {
    config: HubConfig,
    connections: Mutex<HashMap<ConnectionId, Arc<Connection>>>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Hub {
    /// Creates the hub and spawns its publish worker.
    /// Must be called from within a tokio runtime.
    pub fn new(config: HubConfig) -> Arc<Self> {
        let (commands, receiver) = mpsc::unbounded_channel();

        Arc::new_cyclic(|me: &Weak<Self>| {
            tokio::spawn(run_publish_worker(me.clone(), receiver));

            Self {
                config,
                connections: Default::default(),
                commands,
            }
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Adds a connection to the active set.
    pub fn attach(&self, connection: Arc<Connection>) -> Result<(), HubError> {
        if !connection.activate() {
            return Err(HubError::NotConnecting(connection.id));
        }

        debug!(
            "Connection {} attached ({:?})",
            connection.id, connection.subscription
        );

        self.connections.lock().insert(connection.id, connection);
        Ok(())
    }

    /// Removes a connection from the active set. Detaching twice is harmless.
    pub fn detach(&self, id: ConnectionId) {
        if let Some(connection) = self.connections.lock().remove(&id) {
            connection.close();
            debug!("Connection {} detached", id);
        }
    }

    /// Queues a message for delivery. The payload is sent as-is, the hub does not look inside it.
    pub fn publish(&self, scope: Scope, payload: Value) {
        let payload: Payload = payload.to_string().into();

        if self.commands.send(Command::Publish { scope, payload }).is_err() {
            warn!("Publish worker is gone, dropping message");
        }
    }

    /// Resolves once every message published before this call has been delivered.
    pub async fn flush(&self) {
        let (sender, receiver) = oneshot::channel();

        if self.commands.send(Command::Flush(sender)).is_ok() {
            let _ = receiver.await;
        }
    }

    pub fn active_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Returns true if the connection is currently attached.
    pub fn is_attached(&self, id: ConnectionId) -> bool {
        self.connections.lock().contains_key(&id)
    }

    async fn broadcast(&self, scope: Scope, payload: Payload) {
        let targets: Vec<_> = self
            .connections
            .lock()
            .values()
            .filter(|c| c.wants(&scope))
            .cloned()
            .collect();

        let send_timeout = self.config.send_timeout;
        let attempts = targets.into_iter().map(|connection| {
            let payload = payload.clone();

            async move {
                let result = match time::timeout(send_timeout, connection.deliver(payload)).await {
                    Ok(result) => result,
                    Err(_) => Err(DeliveryError::TimedOut),
                };

                (connection, result)
            }
        });

        let results = join_all(attempts).await;
        let mut connections = self.connections.lock();

        for (connection, result) in results {
            if let Err(error) = result {
                warn!("Dropping connection {}: {}", connection.id, error);

                connection.close();
                connections.remove(&connection.id);
            }
        }
    }
}

async fn run_publish_worker(hub: Weak<Hub>, mut receiver: mpsc::UnboundedReceiver<Command>) {
    while let Some(command) = receiver.recv().await {
        let Some(hub) = hub.upgrade() else {
            break;
        };

        match command {
            Command::Publish { scope, payload } => hub.broadcast(scope, payload).await,
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }

    info!("Publish worker stopped");
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::mpsc::Receiver;

    use super::*;

    struct BrokenOutlet;

    #[async_trait]
    impl Outlet for BrokenOutlet {
        async fn deliver(&self, _payload: Payload) -> Result<(), DeliveryError> {
            Err(DeliveryError::Other("socket reset".to_string()))
        }
    }

    struct StalledOutlet;

    #[async_trait]
    impl Outlet for StalledOutlet {
        async fn deliver(&self, _payload: Payload) -> Result<(), DeliveryError> {
            std::future::pending().await
        }
    }

    fn drain(receiver: &mut Receiver<Payload>) -> Vec<String> {
        let mut messages = vec![];

        while let Ok(payload) = receiver.try_recv() {
            messages.push(payload.to_string())
        }

        messages
    }

    fn hub() -> Arc<Hub> {
        Hub::new(HubConfig {
            send_timeout: Duration::from_millis(100),
            outbox_capacity: 16,
        })
    }

    #[tokio::test]
    async fn failed_connection_is_pruned_and_others_still_receive() {
        let hub = hub();

        let (first, mut first_rx) = Connection::channel(Subscription::Global, 16);
        let broken = Connection::new(Subscription::Global, BrokenOutlet);
        let (third, mut third_rx) = Connection::channel(Subscription::Global, 16);

        hub.attach(first.clone()).unwrap();
        hub.attach(broken.clone()).unwrap();
        hub.attach(third.clone()).unwrap();
        assert_eq!(hub.active_count(), 3);

        hub.publish(Scope::All, json!({ "type": "next" }));
        hub.flush().await;

        assert_eq!(drain(&mut first_rx), vec![r#"{"type":"next"}"#]);
        assert_eq!(drain(&mut third_rx), vec![r#"{"type":"next"}"#]);
        assert_eq!(broken.state(), ConnectionState::Closed);
        assert!(!hub.is_attached(broken.id));
        assert_eq!(hub.active_count(), 2);

        hub.publish(Scope::All, json!({ "type": "prev" }));
        hub.flush().await;

        assert_eq!(drain(&mut first_rx), vec![r#"{"type":"prev"}"#]);
        assert_eq!(drain(&mut third_rx), vec![r#"{"type":"prev"}"#]);
    }

    #[tokio::test]
    async fn dropped_receiver_closes_connection() {
        let hub = hub();
        let (connection, receiver) = Connection::channel(Subscription::Global, 4);

        hub.attach(connection.clone()).unwrap();
        drop(receiver);

        hub.publish(Scope::All, json!({ "type": "pause" }));
        hub.flush().await;

        assert_eq!(connection.state(), ConnectionState::Closed);
        assert_eq!(hub.active_count(), 0);
    }

    #[tokio::test]
    async fn stalled_connection_does_not_block_the_rest() {
        let hub = hub();
        let stalled = Connection::new(Subscription::Global, StalledOutlet);
        let (healthy, mut healthy_rx) = Connection::channel(Subscription::Global, 4);

        hub.attach(stalled.clone()).unwrap();
        hub.attach(healthy.clone()).unwrap();

        hub.publish(Scope::All, json!({ "type": "now" }));
        hub.flush().await;

        assert_eq!(drain(&mut healthy_rx).len(), 1);
        assert_eq!(stalled.state(), ConnectionState::Closed);
        assert!(hub.is_attached(healthy.id));
    }

    #[tokio::test]
    async fn room_scope_only_reaches_matching_subscribers() {
        let hub = hub();
        let (room_one, mut room_one_rx) = Connection::channel(Subscription::Room(1), 4);
        let (room_two, mut room_two_rx) = Connection::channel(Subscription::Room(2), 4);
        let (global, mut global_rx) = Connection::channel(Subscription::Global, 4);

        hub.attach(room_one).unwrap();
        hub.attach(room_two).unwrap();
        hub.attach(global).unwrap();

        hub.publish(Scope::Room(1), json!({ "type": "next" }));
        hub.publish(Scope::All, json!({ "type": "notification", "message": "hi" }));
        hub.flush().await;

        assert_eq!(drain(&mut room_one_rx).len(), 2);
        assert_eq!(drain(&mut room_two_rx).len(), 1);
        assert_eq!(drain(&mut global_rx).len(), 2);
    }

    #[tokio::test]
    async fn messages_arrive_in_publish_order() {
        let hub = hub();
        let (connection, mut receiver) = Connection::channel(Subscription::Global, 16);
        hub.attach(connection).unwrap();

        for kind in ["next", "prev", "pause", "now"] {
            hub.publish(Scope::All, json!({ "type": kind }));
        }
        hub.flush().await;

        let received: Vec<_> = drain(&mut receiver)
            .into_iter()
            .map(|m| serde_json::from_str::<Value>(&m).unwrap()["type"].clone())
            .collect();

        assert_eq!(received, vec!["next", "prev", "pause", "now"]);
    }

    #[tokio::test]
    async fn late_attach_gets_no_backlog() {
        let hub = hub();

        hub.publish(Scope::All, json!({ "type": "next" }));
        hub.flush().await;

        let (connection, mut receiver) = Connection::channel(Subscription::Global, 4);
        hub.attach(connection).unwrap();
        hub.flush().await;

        assert!(drain(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn closed_connection_cannot_be_reattached() {
        let hub = hub();
        let (connection, _receiver) = Connection::channel(Subscription::Global, 4);

        hub.attach(connection.clone()).unwrap();
        hub.detach(connection.id);
        hub.detach(connection.id);

        assert_eq!(connection.state(), ConnectionState::Closed);
        assert!(hub.attach(connection).is_err());
        assert_eq!(hub.active_count(), 0);
    }

    #[tokio::test]
    async fn opaque_payloads_pass_through_untouched() {
        let hub = hub();
        let (connection, mut receiver) = Connection::channel(Subscription::Room(7), 4);
        hub.attach(connection).unwrap();

        let payload = json!({ "type": "confetti", "colors": ["red", "blue"] });
        hub.publish(Scope::Room(7), payload.clone());
        hub.flush().await;

        let received: Value = serde_json::from_str(&drain(&mut receiver)[0]).unwrap();
        assert_eq!(received, payload);
    }
}
