//! Analysis registry and per-analysis progress channels
//!
//! The registry is the only state shared across concurrent analyses. It
//! maps an analysis id to its record plus a broadcast progress channel.
//! All record mutation funnels through the orchestrator via [`update`],
//! preserving the single-writer discipline; subscribers only ever read
//! snapshots and receive events.
//!
//! Publishing is fire-and-forget: a slow or absent subscriber never blocks
//! the orchestrator, and a lagging subscriber drops the oldest events
//! (bounded channel). The channel closes exactly once, when the analysis
//! reaches a terminal status; late subscribers get the final snapshot
//! instead of an error.
//!
//! [`update`]: AnalysisRegistry::update

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use pyro_common::events::AnalysisEvent;
use pyro_common::model::AnalysisRecord;
use pyro_common::{Error, Result};

struct AnalysisEntry {
    record: AnalysisRecord,
    /// Progress channel sender; `None` once the analysis is terminal
    sender: Option<broadcast::Sender<AnalysisEvent>>,
}

/// Outcome of a subscribe attempt
pub enum Subscription {
    /// Analysis in flight: receive events from this point forward
    Live(broadcast::Receiver<AnalysisEvent>),
    /// Channel already closed: the terminal snapshot stands in for the stream
    Closed(AnalysisRecord),
}

/// In-memory keyed store of analyses.
///
/// Entries are retained for the process lifetime; the demo scope has no
/// eviction policy.
#[derive(Clone)]
pub struct AnalysisRegistry {
    inner: Arc<RwLock<HashMap<Uuid, AnalysisEntry>>>,
    channel_capacity: usize,
}

impl AnalysisRegistry {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Register a new analysis and open its progress channel
    pub async fn insert(&self, record: AnalysisRecord) {
        let (sender, _) = broadcast::channel(self.channel_capacity);
        let mut inner = self.inner.write().await;
        inner.insert(
            record.id,
            AnalysisEntry {
                record,
                sender: Some(sender),
            },
        );
    }

    /// Current record snapshot
    pub async fn snapshot(&self, analysis_id: Uuid) -> Option<AnalysisRecord> {
        let inner = self.inner.read().await;
        inner.get(&analysis_id).map(|entry| entry.record.clone())
    }

    /// Mutate a record (orchestrator only) and return the updated snapshot
    pub async fn update<F>(&self, analysis_id: Uuid, mutate: F) -> Result<AnalysisRecord>
    where
        F: FnOnce(&mut AnalysisRecord),
    {
        let mut inner = self.inner.write().await;
        let entry = inner
            .get_mut(&analysis_id)
            .ok_or_else(|| Error::NotFound(format!("analysis {}", analysis_id)))?;
        mutate(&mut entry.record);
        Ok(entry.record.clone())
    }

    /// Publish a progress event; never blocks, tolerates zero receivers
    /// and a closed channel
    pub async fn publish(&self, analysis_id: Uuid, event: AnalysisEvent) {
        let inner = self.inner.read().await;
        let Some(entry) = inner.get(&analysis_id) else {
            tracing::warn!(%analysis_id, "publish for unknown analysis dropped");
            return;
        };
        if let Some(sender) = &entry.sender {
            // Err means no receivers are currently subscribed, which is fine
            let _ = sender.send(event);
        }
    }

    /// Subscribe to an analysis's progress. Returns `None` for unknown ids.
    pub async fn subscribe(&self, analysis_id: Uuid) -> Option<Subscription> {
        let inner = self.inner.read().await;
        let entry = inner.get(&analysis_id)?;
        match &entry.sender {
            Some(sender) => Some(Subscription::Live(sender.subscribe())),
            None => Some(Subscription::Closed(entry.record.clone())),
        }
    }

    /// Close the progress channel. Idempotent; called once per analysis by
    /// the orchestrator on reaching a terminal status.
    pub async fn close(&self, analysis_id: Uuid) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.get_mut(&analysis_id) {
            entry.sender = None;
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pyro_common::model::{AnalysisRequest, AnalysisStatus};

    fn test_record() -> AnalysisRecord {
        AnalysisRecord::new(AnalysisRequest {
            latitude: 20.8783,
            longitude: -156.6825,
            demo_mode: true,
        })
    }

    fn connected_event(analysis_id: Uuid) -> AnalysisEvent {
        AnalysisEvent::Connected {
            analysis_id,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_snapshot() {
        let registry = AnalysisRegistry::new(16);
        let record = test_record();
        let id = record.id;

        registry.insert(record).await;
        let snapshot = registry.snapshot(id).await.unwrap();
        assert_eq!(snapshot.id, id);
        assert_eq!(snapshot.status, AnalysisStatus::Processing);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_unknown_is_none() {
        let registry = AnalysisRegistry::new(16);
        assert!(registry.snapshot(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let registry = AnalysisRegistry::new(16);
        let result = registry.update(Uuid::new_v4(), |_| {}).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let registry = AnalysisRegistry::new(16);
        let record = test_record();
        let id = record.id;
        registry.insert(record).await;

        let Some(Subscription::Live(mut rx_a)) = registry.subscribe(id).await else {
            panic!("expected live subscription");
        };
        let Some(Subscription::Live(mut rx_b)) = registry.subscribe(id).await else {
            panic!("expected live subscription");
        };

        registry.publish(id, connected_event(id)).await;

        assert_eq!(rx_a.recv().await.unwrap().event_type(), "Connected");
        assert_eq!(rx_b.recv().await.unwrap().event_type(), "Connected");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_does_not_block() {
        let registry = AnalysisRegistry::new(16);
        let record = test_record();
        let id = record.id;
        registry.insert(record).await;

        // No receivers exist; publish must be a no-op
        registry.publish(id, connected_event(id)).await;
    }

    #[tokio::test]
    async fn test_subscribe_after_close_returns_snapshot() {
        let registry = AnalysisRegistry::new(16);
        let record = test_record();
        let id = record.id;
        registry.insert(record).await;

        registry
            .update(id, |r| {
                r.transition_to(AnalysisStatus::Completed);
            })
            .await
            .unwrap();
        registry.close(id).await;

        match registry.subscribe(id).await {
            Some(Subscription::Closed(snapshot)) => {
                assert_eq!(snapshot.status, AnalysisStatus::Completed);
            }
            _ => panic!("expected closed subscription with snapshot"),
        }
    }

    #[tokio::test]
    async fn test_close_ends_live_receivers() {
        let registry = AnalysisRegistry::new(16);
        let record = test_record();
        let id = record.id;
        registry.insert(record).await;

        let Some(Subscription::Live(mut rx)) = registry.subscribe(id).await else {
            panic!("expected live subscription");
        };

        registry.close(id).await;
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));

        // Closing again is a no-op
        registry.close(id).await;
    }

    #[tokio::test]
    async fn test_concurrent_analyses_do_not_interfere() {
        let registry = AnalysisRegistry::new(16);
        let record_a = test_record();
        let record_b = test_record();
        let (id_a, id_b) = (record_a.id, record_b.id);
        registry.insert(record_a).await;
        registry.insert(record_b).await;

        let Some(Subscription::Live(mut rx_b)) = registry.subscribe(id_b).await else {
            panic!("expected live subscription");
        };

        registry.publish(id_a, connected_event(id_a)).await;

        // Nothing published on B's channel
        assert!(matches!(
            rx_b.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
