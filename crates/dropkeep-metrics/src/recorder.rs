//! Best-effort event recording used by the pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use dropkeep_core::events::{EventKind, MetricEvent};

use crate::clients::ClientRegistry;
use crate::store::MetricsStore;

/// Receives lifecycle events. Implementations never fail the caller.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Record one event.
    async fn emit(&self, event: MetricEvent);
}

/// Writes events to the [`MetricsStore`] and tracks first-seen clients.
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    store: Arc<MetricsStore>,
    clients: Arc<ClientRegistry>,
}

impl MetricsRecorder {
    /// Create a recorder.
    pub fn new(store: Arc<MetricsStore>, clients: Arc<ClientRegistry>) -> Self {
        Self { store, clients }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<MetricsStore> {
        &self.store
    }
}

#[async_trait]
impl EventSink for MetricsRecorder {
    async fn emit(&self, event: MetricEvent) {
        if let Err(e) = self.store.append(&event).await {
            error!(kind = event.kind.name(), error = %e, "Failed to append metric event");
        }
        if let EventKind::UploadStarted { client, .. } = &event.kind {
            if let Err(e) = self.clients.record_first_seen(client, event.ts).await {
                error!(client = %client, error = %e, "Failed to update client registry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropkeep_core::types::week::IsoWeekKey;

    #[tokio::test]
    async fn test_started_event_registers_client() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MetricsStore::open(dir.path()).await.unwrap());
        let clients = Arc::new(ClientRegistry::new(dir.path()));
        let recorder = MetricsRecorder::new(Arc::clone(&store), Arc::clone(&clients));

        let event = MetricEvent::now(EventKind::UploadStarted {
            client: "@ann".into(),
            filename: "a.bin".into(),
            has_description: false,
        });
        let week = event.week();
        recorder.emit(event).await;

        assert_eq!(store.load_week(week).await.unwrap().len(), 1);
        assert_eq!(clients.first_seen_in(week).await, vec!["@ann".to_string()]);
        assert!(clients.first_seen_in(IsoWeekKey::new(1999, 1)).await.is_empty());
    }
}
