//! Single-assignment future
//!
//! A `Promise` is written at most once from a callback thread and awaited from
//! async code. A second write is rejected and reported as `false`, never as a panic;
//! the writer decides whether that is a protocol violation.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
enum Slot<T> {
    Empty,
    Full(T),
    /// Value was moved out by `try_take`; still counts as written
    Taken,
}

/// Write-once value cell shared between a producer and any number of consumers
#[derive(Debug)]
pub struct Promise<T> {
    slot: Arc<watch::Sender<Slot<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Promise<T> {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(Slot::Empty);
        Self {
            slot: Arc::new(slot),
        }
    }

    /// Write the value. Returns `false` if a value was already written.
    ///
    /// Never blocks, so it is safe to call from transport callbacks.
    pub fn complete(&self, value: T) -> bool {
        self.slot.send_if_modified(move |slot| {
            if matches!(slot, Slot::Empty) {
                *slot = Slot::Full(value);
                true
            } else {
                false
            }
        })
    }

    pub fn is_completed(&self) -> bool {
        !matches!(*self.slot.borrow(), Slot::Empty)
    }

    /// Move the value out, if present. Later writes are still rejected and
    /// pending `wait` calls never resolve, so use this only with a single consumer.
    pub fn try_take(&self) -> Option<T> {
        let mut taken = None;
        self.slot.send_if_modified(|slot| {
            if matches!(slot, Slot::Full(_)) {
                if let Slot::Full(value) = std::mem::replace(slot, Slot::Taken) {
                    taken = Some(value);
                }
            }
            false
        });
        taken
    }
}

impl<T: Clone> Promise<T> {
    /// Current value, without waiting
    pub fn get(&self) -> Option<T> {
        match &*self.slot.borrow() {
            Slot::Full(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Wait until the value is written
    pub async fn wait(&self) -> T {
        let mut receiver = self.slot.subscribe();
        let value = match receiver
            .wait_for(|slot| matches!(slot, Slot::Full(_)))
            .await
        {
            Ok(slot) => match &*slot {
                Slot::Full(value) => Some(value.clone()),
                _ => None,
            },
            // The sender lives as long as `self`, so the channel cannot close here
            Err(_) => None,
        };

        match value {
            Some(value) => value,
            None => std::future::pending().await,
        }
    }
}
