//! Connection registry and outbound fan-out for the game server
//!
//! This module tracks the transport side of every connected client:
//! - Connection id allocation (ids are never reused within a run)
//! - Per-connection outbound queues feeding each socket's writer task
//! - Unicast and broadcast delivery of server events
//!
//! Player state lives in the session manager; this module only knows where
//! to send things.

use log::{debug, info};
use shared::{ConnectionId, ServerEvent};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// Outbound queue feeding one socket's writer task.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// A connected client and the queue its writer task drains
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: ConnectionId,
    /// Remote address, when the transport knows it
    pub addr: Option<SocketAddr>,
    /// When the connection was accepted
    pub connected_at: Instant,
    sender: EventSender,
}

impl Client {
    pub fn new(id: ConnectionId, addr: Option<SocketAddr>, sender: EventSender) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            sender,
        }
    }

    /// Queues an event for this client
    ///
    /// Returns false if the writer task has already gone away.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Manages all connected clients and their outbound queues
///
/// Clients are kept in id order, so broadcasts reach them in the order
/// they connected.
pub struct ClientManager {
    /// Connected clients indexed by their connection id
    clients: BTreeMap<ConnectionId, Client>,
    /// Next id handed to a new connection
    next_client_id: ConnectionId,
}

impl Default for ClientManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientManager {
    /// Creates an empty registry. Ids start from 1.
    pub fn new() -> Self {
        Self {
            clients: BTreeMap::new(),
            next_client_id: 1,
        }
    }

    /// Registers a new connection and returns its id
    pub fn add_client(&mut self, addr: Option<SocketAddr>, sender: EventSender) -> ConnectionId {
        let client_id = self.next_client_id;
        self.next_client_id += 1;

        match addr {
            Some(addr) => info!("Client {} connected from {}", client_id, addr),
            None => info!("Client {} connected", client_id),
        }
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));

        client_id
    }

    /// Removes a client, returning true if it was still registered
    pub fn remove_client(&mut self, client_id: &ConnectionId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!(
                "Client {} disconnected after {:?}",
                client.id,
                client.connected_at.elapsed()
            );
            true
        } else {
            false
        }
    }

    /// Delivers an event to a single client
    pub fn send_to(&self, client_id: ConnectionId, event: ServerEvent) -> bool {
        match self.clients.get(&client_id) {
            Some(client) => client.send(event),
            None => {
                debug!(
                    "Dropping {} for unknown client {}",
                    event.name(),
                    client_id
                );
                false
            }
        }
    }

    /// Delivers an event to every client except `exclude`
    ///
    /// Returns the number of clients the event was queued for.
    pub fn broadcast(&self, event: &ServerEvent, exclude: Option<ConnectionId>) -> usize {
        self.clients
            .values()
            .filter(|client| Some(client.id) != exclude)
            .filter(|client| client.send(event.clone()))
            .count()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    #[test]
    fn test_client_manager_creation() {
        let manager = ClientManager::new();
        assert!(manager.is_empty());
        assert_eq!(manager.len(), 0);
    }

    #[test]
    fn test_add_client_assigns_sequential_ids() {
        let mut manager = ClientManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let first = manager.add_client(Some(test_addr()), tx.clone());
        let second = manager.add_client(None, tx);

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut manager = ClientManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let first = manager.add_client(None, tx.clone());
        assert!(manager.remove_client(&first));

        let second = manager.add_client(None, tx);
        assert_ne!(first, second);
    }

    #[test]
    fn test_remove_nonexistent_client() {
        let mut manager = ClientManager::new();
        assert!(!manager.remove_client(&999));
        assert!(manager.is_empty());
    }

    #[test]
    fn test_send_to_single_client() {
        let mut manager = ClientManager::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();

        let id1 = manager.add_client(None, tx1);
        manager.add_client(None, tx2);

        assert!(manager.send_to(id1, ServerEvent::KickedForInactivity));
        assert_eq!(rx1.try_recv().unwrap(), ServerEvent::KickedForInactivity);
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_send_to_unknown_client() {
        let manager = ClientManager::new();
        assert!(!manager.send_to(7, ServerEvent::KickedForInactivity));
    }

    #[test]
    fn test_broadcast_with_exclusion() {
        let mut manager = ClientManager::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();

        let id1 = manager.add_client(None, tx1);
        manager.add_client(None, tx2);
        manager.add_client(None, tx3);

        let event = ServerEvent::PlayerDisconnected(id1);
        assert_eq!(manager.broadcast(&event, Some(id1)), 2);

        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.try_recv().unwrap(), event);
        assert_eq!(rx3.try_recv().unwrap(), event);
    }

    #[test]
    fn test_broadcast_skips_closed_writers() {
        let mut manager = ClientManager::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();

        manager.add_client(None, tx1);
        manager.add_client(None, tx2);
        drop(rx1);

        assert_eq!(manager.broadcast(&ServerEvent::KickedForInactivity, None), 1);
        assert!(rx2.try_recv().is_ok());
    }
}
