//! Live connections and their outbound message sinks.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use vexport_models::{ConnectionId, ServerMessage};

use crate::error::DeliveryMiss;

/// Outbound half of a connection.
#[derive(Debug)]
struct Sink {
    tx: mpsc::UnboundedSender<ServerMessage>,
    connected_at: DateTime<Utc>,
}

/// Registered connections, keyed by id.
///
/// Sinks are unbounded so that emitting never waits on a slow client while
/// the queue lock is held.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sinks: HashMap<ConnectionId, Sink>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and return the receiving half of its sink.
    pub fn insert(&mut self, id: ConnectionId) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sinks.insert(
            id,
            Sink {
                tx,
                connected_at: Utc::now(),
            },
        );
        rx
    }

    /// Drop a connection's sink. Returns `false` if it was not registered.
    pub fn remove(&mut self, id: &ConnectionId) -> bool {
        self.sinks.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ConnectionId> {
        self.sinks.keys()
    }

    pub fn connected_at(&self, id: &ConnectionId) -> Option<DateTime<Utc>> {
        self.sinks.get(id).map(|sink| sink.connected_at)
    }

    /// Queue a message for one connection.
    ///
    /// Fails if the connection is unknown or its receiver has been dropped.
    pub fn send(&self, id: &ConnectionId, message: ServerMessage) -> Result<(), DeliveryMiss> {
        let sink = self
            .sinks
            .get(id)
            .ok_or_else(|| DeliveryMiss(id.clone()))?;
        sink.tx.send(message).map_err(|_| DeliveryMiss(id.clone()))
    }
}
