use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, trace};
use uuid::Uuid;

use super::envelope::{ArenaEvent, Envelope};

/// Fan-out target for domain events. Publishing never waits on delivery.
pub trait EventSink: Send + Sync {
    fn publish(&self, recipients: &[i64], event: ArenaEvent);
}

/// A live subscription; dropping the receiver is enough to stop delivery,
/// the hub prunes closed senders on the next publish.
pub struct Subscription {
    pub token: Uuid,
    pub rx: UnboundedReceiver<Envelope>,
}

/// Per-user subscriber channels, keyed by user id then connection token.
#[derive(Default)]
pub struct EventHub {
    subscribers: DashMap<i64, DashMap<Uuid, UnboundedSender<Envelope>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, user_id: i64) -> Subscription {
        let (tx, rx) = unbounded_channel();
        let token = Uuid::new_v4();
        self.subscribers
            .entry(user_id)
            .or_default()
            .insert(token, tx);
        debug!(user_id, %token, "subscriber registered");
        Subscription { token, rx }
    }

    pub fn unsubscribe(&self, user_id: i64, token: Uuid) {
        if let Some(entry) = self.subscribers.get(&user_id) {
            entry.remove(&token);
        }
        self.subscribers.remove_if(&user_id, |_, subs| subs.is_empty());
    }

    pub fn subscriber_count(&self, user_id: i64) -> usize {
        self.subscribers.get(&user_id).map_or(0, |s| s.len())
    }
}

impl EventSink for EventHub {
    fn publish(&self, recipients: &[i64], event: ArenaEvent) {
        let envelope = Envelope::now(event);
        for user_id in recipients {
            let Some(subs) = self.subscribers.get(user_id) else {
                continue;
            };
            subs.retain(|_, tx| tx.send(envelope.clone()).is_ok());
            trace!(user_id, event = envelope.event.name(), delivered = subs.len());
        }
    }
}

/// Captures events in order for assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(Vec<i64>, ArenaEvent)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ArenaEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    pub fn events_for(&self, user_id: i64) -> Vec<ArenaEvent> {
        self.events
            .lock()
            .iter()
            .filter(|(to, _)| to.contains(&user_id))
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|(_, e)| e.name() == name)
            .count()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, recipients: &[i64], event: ArenaEvent) {
        self.events.lock().push((recipients.to_vec(), event));
    }
}
