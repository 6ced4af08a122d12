use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::broadcast::{ChannelId, Hub, MessageType};

/// Lifecycle events worth keeping a trail of. Failed lock attempts and
/// internal errors are recorded alongside the happy path so an operator can
/// see contention, not just outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    BookingSuccess,
    BookingTimeout,
    SeatReleased,
    LockFail,
    SystemError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub event: AuditEvent,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Append-only sink for audit entries. Append never fails and never blocks
/// the calling operation on downstream consumers.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn append(&self, event: AuditEvent, payload: serde_json::Value);

    /// Most recent entries, newest first
    async fn recent(&self, limit: usize) -> Vec<AuditEntry>;
}

/// Retention cap for the in-memory trail. Reads only ever page the newest
/// entries, so older ones are discarded once the buffer is full.
const MAX_ENTRIES: usize = 1_000;

/// In-memory recorder that also publishes every entry on the admin channel
pub struct InMemoryAuditRecorder {
    entries: Mutex<Vec<AuditEntry>>,
    hub: Arc<Hub>,
}

impl InMemoryAuditRecorder {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            hub,
        }
    }
}

#[async_trait]
impl AuditRecorder for InMemoryAuditRecorder {
    async fn append(&self, event: AuditEvent, payload: serde_json::Value) {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            event,
            payload,
            created_at: Utc::now(),
        };

        debug!(event = ?event, audit_id = %entry.id, "Audit entry appended");

        let published = serde_json::to_value(&entry).unwrap_or_default();
        {
            let mut entries = self.entries.lock().unwrap();
            entries.push(entry);
            if entries.len() > MAX_ENTRIES {
                let excess = entries.len() - MAX_ENTRIES;
                entries.drain(..excess);
            }
        }
        self.hub
            .publish(ChannelId::Admin, MessageType::AuditEvent, published);
    }

    async fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.lock().unwrap();
        entries.iter().rev().take(limit).cloned().collect()
    }
}
