//! Broadcast registry for interactive-mode fan-out.
//!
//! In interactive mode every connected streaming client (live view, control
//! panel, ...) must see the same telemetry update. The registry tracks the
//! send half of each connection and fans one record out to all of them.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use crate::record::TelemetryRecord;

/// Opaque handle identifying one registered client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Marker error: the client connection is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("client connection closed")]
pub struct SinkClosed;

/// Delivery half of one connected streaming client.
#[async_trait]
pub trait RecordSink: Send {
    /// Deliver one record to the client.
    ///
    /// # Errors
    ///
    /// Returns [`SinkClosed`] when the client is gone; the registry prunes
    /// the entry after the current broadcast pass.
    async fn deliver(&mut self, record: &TelemetryRecord) -> Result<(), SinkClosed>;
}

/// The set of currently connected streaming clients.
///
/// Membership is only ever edited by `join`, `leave`, and the pruning at the
/// end of a broadcast pass — never mid-pass. One registry lives for one
/// relay run, owned by the orchestrator.
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientId, Box<dyn RecordSink>>>,
    next_id: AtomicU64,
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a connected client and return its handle.
    pub async fn join(&self, sink: Box<dyn RecordSink>) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.clients.lock().await.insert(id, sink);
        debug!(client = %id, "streaming client joined");
        id
    }

    /// Remove a client, returning whether it was still registered.
    pub async fn leave(&self, id: ClientId) -> bool {
        let removed = self.clients.lock().await.remove(&id).is_some();
        if removed {
            debug!(client = %id, "streaming client left");
        }
        removed
    }

    /// Number of currently registered clients.
    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }

    /// Deliver one record to every registered client.
    ///
    /// The membership set is the one in place when the pass starts; clients
    /// whose delivery fails are removed only after the full pass, so one dead
    /// connection never disrupts delivery to the others. Returns the number
    /// of successful deliveries.
    pub async fn broadcast(&self, record: &TelemetryRecord) -> usize {
        let mut clients = self.clients.lock().await;
        let mut dead = Vec::new();
        let mut delivered = 0;

        for (id, sink) in clients.iter_mut() {
            match sink.deliver(record).await {
                Ok(()) => delivered += 1,
                Err(SinkClosed) => {
                    debug!(client = %id, "pruning disconnected client");
                    dead.push(*id);
                }
            }
        }
        for id in dead {
            clients.remove(&id);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Records deliveries; fails permanently once `alive` is false.
    struct TestSink {
        delivered: Arc<Mutex<Vec<String>>>,
        alive: bool,
    }

    #[async_trait]
    impl RecordSink for TestSink {
        async fn deliver(&mut self, record: &TelemetryRecord) -> Result<(), SinkClosed> {
            if !self.alive {
                return Err(SinkClosed);
            }
            self.delivered.lock().await.push(record.to_line());
            Ok(())
        }
    }

    fn sink(alive: bool) -> (Box<dyn RecordSink>, Arc<Mutex<Vec<String>>>) {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(TestSink {
                delivered: delivered.clone(),
                alive,
            }),
            delivered,
        )
    }

    fn record(aoa: f64) -> TelemetryRecord {
        TelemetryRecord::from_value(serde_json::json!({ "AOA": aoa })).unwrap()
    }

    #[tokio::test]
    async fn test_join_and_leave() {
        let registry = ClientRegistry::new();
        let (s, _) = sink(true);
        let id = registry.join(s).await;
        assert_eq!(registry.client_count().await, 1);

        assert!(registry.leave(id).await);
        assert_eq!(registry.client_count().await, 0);
        assert!(!registry.leave(id).await);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_clients() {
        let registry = ClientRegistry::new();
        let (s1, d1) = sink(true);
        let (s2, d2) = sink(true);
        registry.join(s1).await;
        registry.join(s2).await;

        let delivered = registry.broadcast(&record(8.0)).await;
        assert_eq!(delivered, 2);
        assert_eq!(d1.lock().await.len(), 1);
        assert_eq!(d2.lock().await.len(), 1);
        assert_eq!(*d1.lock().await, *d2.lock().await);
    }

    #[tokio::test]
    async fn test_dead_client_does_not_disrupt_others() {
        let registry = ClientRegistry::new();
        let (before, d_before) = sink(true);
        let (dead, _) = sink(false);
        let (after, d_after) = sink(true);
        registry.join(before).await;
        let dead_id = registry.join(dead).await;
        registry.join(after).await;

        let delivered = registry.broadcast(&record(8.0)).await;
        assert_eq!(delivered, 2);
        assert_eq!(d_before.lock().await.len(), 1);
        assert_eq!(d_after.lock().await.len(), 1);

        // The dead client was pruned after the pass.
        assert_eq!(registry.client_count().await, 2);
        assert!(!registry.leave(dead_id).await);

        // A later pass only sees the live clients.
        let delivered = registry.broadcast(&record(9.0)).await;
        assert_eq!(delivered, 2);
        assert_eq!(d_before.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_registry() {
        let registry = ClientRegistry::new();
        assert_eq!(registry.broadcast(&record(1.0)).await, 0);
    }

    #[tokio::test]
    async fn test_client_ids_are_unique() {
        let registry = ClientRegistry::new();
        let (s1, _) = sink(true);
        let (s2, _) = sink(true);
        let a = registry.join(s1).await;
        let b = registry.join(s2).await;
        assert_ne!(a, b);
    }
}
