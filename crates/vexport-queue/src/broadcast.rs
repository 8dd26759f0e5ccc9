//! Event fan-out: owner-scoped events and per-recipient queue snapshots.

use tracing::debug;

use vexport_models::{ConnectionId, ServerMessage};

use crate::metrics;
use crate::registry::ConnectionRegistry;
use crate::store::JobStore;

/// Borrowed view over the registry and store used to emit events.
///
/// Only constructed while the queue lock is held, so every message reflects
/// the state right after the transition that produced it.
pub struct EventBroadcaster<'a> {
    registry: &'a ConnectionRegistry,
    store: &'a JobStore,
}

impl<'a> EventBroadcaster<'a> {
    pub fn new(registry: &'a ConnectionRegistry, store: &'a JobStore) -> Self {
        Self { registry, store }
    }

    /// Deliver a message to its owner only.
    ///
    /// A missing owner is a delivery miss: counted, logged at debug, never
    /// retried. Returns whether the message was queued for delivery.
    pub fn to_owner(&self, owner: &ConnectionId, message: ServerMessage) -> bool {
        let message_type = message.message_type().as_str();
        match self.registry.send(owner, message) {
            Ok(()) => true,
            Err(miss) => {
                metrics::record_delivery_miss(message_type);
                debug!(
                    connection_id = %owner,
                    message_type,
                    "Dropping event: {}", miss
                );
                false
            }
        }
    }

    /// Send a `queue_status` to every registered connection.
    ///
    /// Each recipient gets its own `your_position`. Returns the number of
    /// connections reached.
    pub fn queue_status(&self) -> usize {
        let snapshot = self.store.snapshot();
        metrics::record_snapshot(&snapshot);

        let mut delivered = 0;
        for id in self.registry.ids() {
            let your_position = self
                .store
                .active_job_of(id)
                .and_then(|job_id| self.store.position_of(job_id));

            // A closed receiver means the connection is on its way out
            if self
                .registry
                .send(id, ServerMessage::queue_status(snapshot, your_position))
                .is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }
}
