//! Live reload broadcasting.
//!
//! Browser clients subscribe over SSE; the watcher pushes `LOG` lines as it
//! classifies file events and a single `RELOAD` once a rebuild lands. Each
//! broadcast waits a short settle delay so the last artifact writes of a
//! cycle hit disk before any client refetches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// Delay between a broadcast request and delivery.
const SETTLE_DELAY: Duration = Duration::from_millis(10);

/// Wire protocol of one reload event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ReloadEvent {
    #[serde(rename = "LOG")]
    Log { message: String },
    #[serde(rename = "RELOAD")]
    Reload,
}

#[derive(Default)]
pub struct ReloadBroadcaster {
    clients: RwLock<HashMap<u64, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl ReloadBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new SSE client; the receiver yields serialized events.
    pub fn register(&self) -> (u64, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(32);
        self.clients.write().insert(id, tx);
        debug!(client = id, "reload client connected");
        (id, rx)
    }

    pub fn unregister(&self, id: u64) {
        self.clients.write().remove(&id);
        debug!(client = id, "reload client disconnected");
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Serialize and deliver an event to every open client after the settle
    /// delay. Clients whose channel is gone are pruned.
    pub async fn broadcast(&self, event: ReloadEvent) {
        let Ok(payload) = serde_json::to_string(&event) else {
            return;
        };
        tokio::time::sleep(SETTLE_DELAY).await;

        let targets: Vec<(u64, mpsc::Sender<String>)> = self
            .clients
            .read()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut dead = Vec::new();
        for (id, tx) in targets {
            if tx.send(payload.clone()).await.is_err() {
                dead.push(id);
            }
        }
        if !dead.is_empty() {
            let mut clients = self.clients.write();
            for id in dead {
                clients.remove(&id);
            }
        }
    }

    /// Fire-and-forget broadcast, usable from synchronous callbacks.
    pub fn notify(self: &Arc<Self>, event: ReloadEvent) {
        let broadcaster = Arc::clone(self);
        tokio::spawn(async move {
            broadcaster.broadcast(event).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let log = serde_json::to_string(&ReloadEvent::Log {
            message: "changed: src/a.ts".into(),
        })
        .unwrap();
        assert_eq!(log, r#"{"type":"LOG","message":"changed: src/a.ts"}"#);

        let reload = serde_json::to_string(&ReloadEvent::Reload).unwrap();
        assert_eq!(reload, r#"{"type":"RELOAD"}"#);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_clients_and_prunes_dead() {
        let broadcaster = ReloadBroadcaster::new();
        let (_a, mut rx_a) = broadcaster.register();
        let (b, rx_b) = broadcaster.register();
        assert_eq!(broadcaster.client_count(), 2);

        // Client b hangs up before the broadcast.
        drop(rx_b);
        broadcaster.broadcast(ReloadEvent::Reload).await;

        assert_eq!(rx_a.recv().await.unwrap(), r#"{"type":"RELOAD"}"#);
        assert_eq!(broadcaster.client_count(), 1);
        broadcaster.unregister(b);
    }
}
