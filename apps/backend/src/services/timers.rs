//! Keyed, cancellable one-shot timers.
//!
//! Arming a key supersedes whatever was armed for it before. Each arm gets a
//! fresh generation; handlers call [`TimerSlots::take_if_current`] before
//! acting so a timer that fired just as it was superseded does nothing.

use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::trace;

struct Slot {
    generation: u64,
    cancel: CancellationToken,
}

pub struct TimerSlots<K> {
    slots: DashMap<K, Slot>,
    next_generation: AtomicU64,
}

impl<K> Default for TimerSlots<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> TimerSlots<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Arm `key`, cancelling any earlier timer for it. `fire` receives the
    /// generation it was armed with.
    pub fn arm<F, Fut>(&self, key: K, delay: Duration, fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let previous = self.slots.insert(
            key.clone(),
            Slot {
                generation,
                cancel: cancel.clone(),
            },
        );
        if let Some(prev) = previous {
            prev.cancel.cancel();
        }
        trace!(?key, generation, delay_ms = delay.as_millis() as u64, "timer armed");

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => fire(generation).await,
            }
        });
        generation
    }

    /// Arm only if nothing is armed for `key`.
    pub fn arm_if_idle<F, Fut>(&self, key: K, delay: Duration, fire: F) -> Option<u64>
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.slots.contains_key(&key) {
            return None;
        }
        Some(self.arm(key, delay, fire))
    }

    pub fn is_armed(&self, key: &K) -> bool {
        self.slots.contains_key(key)
    }

    /// Consume the slot if `generation` is still the armed one.
    pub fn take_if_current(&self, key: &K, generation: u64) -> bool {
        self.slots
            .remove_if(key, |_, slot| slot.generation == generation)
            .is_some()
    }

    pub fn cancel(&self, key: &K) -> bool {
        match self.slots.remove(key) {
            Some((_, slot)) => {
                slot.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every timer whose key matches `pred`.
    pub fn cancel_where(&self, pred: impl Fn(&K) -> bool) {
        self.slots.retain(|key, slot| {
            if pred(key) {
                slot.cancel.cancel();
                false
            } else {
                true
            }
        });
    }
}
