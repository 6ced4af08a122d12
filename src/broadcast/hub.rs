use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::messages::{MessageType, WsMessage};
use crate::screening::{DeltaSink, ScreeningId, SeatView};

/// Outbound queue depth per subscriber. A consumer that falls this far behind
/// is dropped and must resync from a fresh snapshot.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 64;

/// One broadcast channel per screening, plus a single admin firehose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Screening(ScreeningId),
    Admin,
}

struct Channel {
    /// Next sequence number to stamp; per channel, gapless
    next_seq: u64,
    next_subscriber_id: u64,
    subscribers: HashMap<u64, mpsc::Sender<String>>,
}

impl Channel {
    fn new() -> Self {
        Self {
            next_seq: 0,
            next_subscriber_id: 0,
            subscribers: HashMap::new(),
        }
    }
}

/// A live subscription handle. `joined_seq` is the first sequence number this
/// subscriber can receive; a snapshot taken after subscribing plus all deltas
/// from `joined_seq` on reconstructs exact current state.
pub struct Subscription {
    pub subscriber_id: u64,
    pub joined_seq: u64,
    pub receiver: mpsc::Receiver<String>,
}

/// Fan-out hub for seat deltas and audit events.
///
/// Publishing stamps the sequence number and enqueues to every subscriber
/// under the channel lock, so subscribers observe messages in exactly the
/// order they were published. Sends never block: a full or closed queue gets
/// the subscriber removed instead.
pub struct Hub {
    channels: Mutex<HashMap<ChannelId, Channel>>,
    capacity: usize,
}

impl Hub {
    pub fn new() -> Self {
        Self::with_capacity(SUBSCRIBER_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    pub fn subscribe(&self, channel_id: ChannelId) -> Subscription {
        let mut channels = self.channels.lock().unwrap();
        let channel = channels.entry(channel_id).or_insert_with(Channel::new);

        let (sender, receiver) = mpsc::channel(self.capacity);
        let subscriber_id = channel.next_subscriber_id;
        channel.next_subscriber_id += 1;
        channel.subscribers.insert(subscriber_id, sender);

        debug!(
            channel = ?channel_id,
            subscriber_id,
            joined_seq = channel.next_seq,
            "Subscriber joined"
        );

        Subscription {
            subscriber_id,
            joined_seq: channel.next_seq,
            receiver,
        }
    }

    pub fn unsubscribe(&self, channel_id: ChannelId, subscriber_id: u64) {
        let mut channels = self.channels.lock().unwrap();
        if let Some(channel) = channels.get_mut(&channel_id) {
            channel.subscribers.remove(&subscriber_id);
            // A channel that has published keeps its sequence counter for
            // the channel's lifetime, even with no subscribers left; only a
            // never-used channel is dropped. Screenings are never deleted,
            // so this is one counter per screening, not a leak.
            if channel.subscribers.is_empty() && channel.next_seq == 0 {
                channels.remove(&channel_id);
            }
        }
    }

    pub fn subscriber_count(&self, channel_id: ChannelId) -> usize {
        let channels = self.channels.lock().unwrap();
        channels
            .get(&channel_id)
            .map(|c| c.subscribers.len())
            .unwrap_or(0)
    }

    /// Stamps the next sequence number and enqueues the message to every
    /// subscriber of the channel. Returns the assigned sequence number.
    pub fn publish(
        &self,
        channel_id: ChannelId,
        message_type: MessageType,
        payload: serde_json::Value,
    ) -> u64 {
        let mut channels = self.channels.lock().unwrap();
        let channel = channels.entry(channel_id).or_insert_with(Channel::new);

        let seq = channel.next_seq;
        channel.next_seq += 1;

        let text = WsMessage::new(message_type, payload, seq).to_json();

        let mut dropped = Vec::new();
        for (&subscriber_id, sender) in &channel.subscribers {
            if sender.try_send(text.clone()).is_err() {
                dropped.push(subscriber_id);
            }
        }
        for subscriber_id in dropped {
            // Closing the queue is the resync signal: the socket task sees
            // its receiver end and re-subscribes from a fresh snapshot
            channel.subscribers.remove(&subscriber_id);
            warn!(
                channel = ?channel_id,
                subscriber_id,
                seq,
                "Slow or gone subscriber dropped"
            );
        }

        seq
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

/// Seat deltas fan out straight from the registry's commit path. This runs
/// inside the seat table's critical section, which is what makes per-screening
/// delivery order equal commit order.
impl DeltaSink for Hub {
    fn seats_changed(&self, screening_id: ScreeningId, seats: &[SeatView]) {
        self.publish(
            ChannelId::Screening(screening_id),
            MessageType::SeatUpdate,
            json!({
                "screening_id": screening_id,
                "seats": seats,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn recv_seq(text: &str) -> u64 {
        let value: serde_json::Value = serde_json::from_str(text).unwrap();
        value["meta"]["seq"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn test_sequence_numbers_are_gapless_per_channel() {
        let hub = Hub::new();
        let channel = ChannelId::Screening(Uuid::new_v4());
        let mut sub = hub.subscribe(channel);
        assert_eq!(sub.joined_seq, 0);

        for i in 0..5 {
            let seq = hub.publish(channel, MessageType::SeatUpdate, json!({ "n": i }));
            assert_eq!(seq, i);
        }

        for expected in 0..5 {
            let text = sub.receiver.recv().await.unwrap();
            assert_eq!(recv_seq(&text), expected);
        }
    }

    #[tokio::test]
    async fn test_channels_are_independent() {
        let hub = Hub::new();
        let a = ChannelId::Screening(Uuid::new_v4());
        let b = ChannelId::Screening(Uuid::new_v4());

        hub.publish(a, MessageType::SeatUpdate, json!({}));
        hub.publish(a, MessageType::SeatUpdate, json!({}));
        let seq_b = hub.publish(b, MessageType::SeatUpdate, json!({}));
        assert_eq!(seq_b, 0);

        let sub_a = hub.subscribe(a);
        assert_eq!(sub_a.joined_seq, 2);
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_dropped_not_blocked() {
        let hub = Hub::with_capacity(2);
        let channel = ChannelId::Admin;
        let mut slow = hub.subscribe(channel);
        assert_eq!(hub.subscriber_count(channel), 1);

        // Two fit in the queue; the third overflows and drops the subscriber
        hub.publish(channel, MessageType::AuditEvent, json!({}));
        hub.publish(channel, MessageType::AuditEvent, json!({}));
        hub.publish(channel, MessageType::AuditEvent, json!({}));

        assert_eq!(hub.subscriber_count(channel), 0);

        // Queued messages still drain, then the closed sender ends the stream
        assert!(slow.receiver.recv().await.is_some());
        assert!(slow.receiver.recv().await.is_some());
        assert!(slow.receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let hub = Hub::new();
        let channel = ChannelId::Screening(Uuid::new_v4());
        let mut sub = hub.subscribe(channel);

        hub.unsubscribe(channel, sub.subscriber_id);
        hub.publish(channel, MessageType::SeatUpdate, json!({}));

        assert!(sub.receiver.recv().await.is_none());
    }
}
