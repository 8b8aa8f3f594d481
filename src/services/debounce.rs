//! Keyed debounced writes.
//!
//! `schedule(key, value)` parks the value and (re)starts the key's quiet
//! timer. When `delay` passes with no newer value for that key, the latest
//! value is handed to the sink exactly once. Keys are independent of each
//! other. Writes already handed to the sink are never cancelled.
//!
//! Each schedule spawns a sleeper tagged with a generation number; a sleeper
//! only fires if its generation is still the newest for its key.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Effect performed once a key has gone quiet.
#[async_trait::async_trait]
pub trait DebouncedSink<K, V>: Send + Sync + 'static {
    async fn write(&self, key: K, value: V);
}

struct Slot<V> {
    generation: u64,
    value: V,
}

struct Pending<K, V> {
    next_generation: u64,
    slots: HashMap<K, Slot<V>>,
}

pub struct Debouncer<K, V> {
    pending: Arc<Mutex<Pending<K, V>>>,
    sink: Arc<dyn DebouncedSink<K, V>>,
    delay: Duration,
}

impl<K, V> Clone for Debouncer<K, V> {
    fn clone(&self) -> Self {
        Self { pending: Arc::clone(&self.pending), sink: Arc::clone(&self.sink), delay: self.delay }
    }
}

impl<K, V> Debouncer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + 'static,
{
    #[must_use]
    pub fn new(delay: Duration, sink: Arc<dyn DebouncedSink<K, V>>) -> Self {
        Self {
            pending: Arc::new(Mutex::new(Pending { next_generation: 0, slots: HashMap::new() })),
            sink,
            delay,
        }
    }

    /// Replace the pending value for `key` and restart its timer.
    /// Must be called inside a Tokio runtime.
    pub fn schedule(&self, key: K, value: V) {
        let generation = {
            let mut pending = self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            pending.next_generation += 1;
            let generation = pending.next_generation;
            pending
                .slots
                .insert(key.clone(), Slot { generation, value });
            generation
        };

        let pending = Arc::clone(&self.pending);
        let sink = Arc::clone(&self.sink);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let value = {
                let mut pending = pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let still_latest = pending
                    .slots
                    .get(&key)
                    .is_some_and(|slot| slot.generation == generation);
                if !still_latest {
                    return;
                }
                match pending.slots.remove(&key) {
                    Some(slot) => slot.value,
                    None => return,
                }
            };
            sink.write(key, value).await;
        });
    }

    /// Number of keys waiting for their quiet period to end.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .len()
    }
}

#[cfg(test)]
#[path = "debounce_test.rs"]
mod tests;
