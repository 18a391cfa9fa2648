use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A committed row change on one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub record: Value,
    pub committed_at: DateTime<Utc>,
}

/// Equality filter on one column, written the PostgREST way: `thread_id=eq.<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    column: String,
    value: String,
}

impl ChangeFilter {
    pub fn eq(column: &str, value: impl ToString) -> Self {
        Self {
            column: column.to_string(),
            value: value.to_string(),
        }
    }

    pub fn parse(filter: &str) -> Option<Self> {
        let (column, rest) = filter.split_once('=')?;
        let value = rest.strip_prefix("eq.")?;
        if column.is_empty() {
            return None;
        }
        Some(Self::eq(column, value))
    }

    pub fn matches(&self, record: &Value) -> bool {
        match record.get(&self.column) {
            Some(Value::String(s)) => *s == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// Fan-out of row changes to in-process subscribers, one broadcast channel per table.
#[derive(Clone)]
pub struct RealtimeHub {
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<ChangeEvent>>>>,
    capacity: usize,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    async fn sender(&self, table: &str) -> broadcast::Sender<ChangeEvent> {
        if let Some(sender) = self.channels.read().await.get(table) {
            return sender.clone();
        }

        let mut channels = self.channels.write().await;
        channels
            .entry(table.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publish a change; returns how many subscribers received it.
    pub async fn publish(&self, table: &str, kind: ChangeKind, record: Value) -> usize {
        let event = ChangeEvent {
            table: table.to_string(),
            kind,
            record,
            committed_at: Utc::now(),
        };

        match self.sender(table).await.send(event) {
            Ok(receivers) => {
                debug!("Published {:?} on {} to {} subscribers", kind, table, receivers);
                receivers
            }
            Err(_) => 0,
        }
    }

    pub async fn subscribe(&self, table: &str, filter: Option<ChangeFilter>) -> Subscription {
        Subscription {
            table: table.to_string(),
            receiver: self.sender(table).await.subscribe(),
            filter,
        }
    }

    pub async fn subscriber_count(&self, table: &str) -> usize {
        self.channels
            .read()
            .await
            .get(table)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

pub struct Subscription {
    table: String,
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: Option<ChangeFilter>,
}

impl Subscription {
    /// Next matching event, or `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    let wanted = self.filter
                        .as_ref()
                        .map(|filter| filter.matches(&event.record))
                        .unwrap_or(true);
                    if wanted {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber on {} lagged, skipped {} changes", self.table, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_parse_and_match() {
        let filter = ChangeFilter::parse("thread_id=eq.abc").unwrap();
        assert!(filter.matches(&json!({ "thread_id": "abc" })));
        assert!(!filter.matches(&json!({ "thread_id": "xyz" })));
        assert!(!filter.matches(&json!({ "other": "abc" })));

        let numeric = ChangeFilter::eq("queue_number", 3);
        assert!(numeric.matches(&json!({ "queue_number": 3 })));

        assert!(ChangeFilter::parse("thread_id=neq.abc").is_none());
        assert!(ChangeFilter::parse("=eq.abc").is_none());
    }

    #[tokio::test]
    async fn test_publish_reaches_table_subscribers_only() {
        let hub = RealtimeHub::new();
        let mut appointments = hub.subscribe("appointments", None).await;
        let _messages = hub.subscribe("messages", None).await;

        let delivered = hub.publish("appointments", ChangeKind::Insert, json!({ "id": "1" })).await;
        assert_eq!(delivered, 1);

        let event = appointments.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.record["id"], "1");
        assert_eq!(hub.subscriber_count("messages").await, 1);
    }

    #[tokio::test]
    async fn test_filtered_subscription_skips_other_rows() {
        let hub = RealtimeHub::new();
        let mut thread = hub
            .subscribe("messages", ChangeFilter::parse("thread_id=eq.t1"))
            .await;

        hub.publish("messages", ChangeKind::Insert, json!({ "id": "m1", "thread_id": "t2" })).await;
        hub.publish("messages", ChangeKind::Insert, json!({ "id": "m2", "thread_id": "t1" })).await;

        let event = thread.next().await.unwrap();
        assert_eq!(event.record["id"], "m2");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let hub = RealtimeHub::new();
        assert_eq!(hub.publish("appointments", ChangeKind::Update, json!({})).await, 0);
    }
}
