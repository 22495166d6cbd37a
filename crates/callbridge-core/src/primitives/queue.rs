//! Inbound message queue
//!
//! FIFO hand-off of a message sequence from transport callbacks to the run unit.
//! Entries are tagged so the producer can end the sequence normally or fail it
//! with a status. Sending never blocks; an optional capacity turns unbounded
//! growth into an explicit `CapacityExceeded` error for the producer.

use crate::{config::QueueCapacity, errors::QueueError, status::Status};
use futures::future::poll_fn;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{Context, Poll},
};
use tokio::sync::mpsc;

/// One queued entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEntry<T> {
    /// A data item
    Item(T),
    /// No more items will follow
    End,
    /// The sequence failed with this status
    Fail(Status),
}

/// Create a connected sender/receiver pair
pub fn inbound_queue<T>(capacity: QueueCapacity) -> (InboundSender<T>, InboundReceiver<T>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));

    (
        InboundSender {
            sender,
            pending: Arc::clone(&pending),
            capacity: capacity.limit(),
            terminated: false,
        },
        InboundReceiver { receiver, pending },
    )
}

// ----------------------------------------------------------------------------
// Producer Side
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub struct InboundSender<T> {
    sender: mpsc::UnboundedSender<InboundEntry<T>>,
    pending: Arc<AtomicUsize>,
    capacity: Option<usize>,
    terminated: bool,
}

impl<T> InboundSender<T> {
    /// Enqueue a data item
    pub fn offer(&mut self, item: T) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }
        if let Some(capacity) = self.capacity {
            if self.pending.load(Ordering::Acquire) >= capacity {
                return Err(QueueError::CapacityExceeded { capacity });
            }
        }

        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.sender.send(InboundEntry::Item(item)).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    /// Enqueue the end-of-stream marker. No entries are accepted afterwards.
    pub fn finish(&mut self) -> Result<(), QueueError> {
        self.terminate(InboundEntry::End)
    }

    /// Enqueue a failure marker. No entries are accepted afterwards.
    pub fn fail(&mut self, status: Status) -> Result<(), QueueError> {
        self.terminate(InboundEntry::Fail(status))
    }

    fn terminate(&mut self, entry: InboundEntry<T>) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }
        self.terminated = true;
        self.sender.send(entry).map_err(|_| QueueError::Closed)
    }

    /// True if the next `offer` would be accepted
    pub fn can_accept(&self) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.capacity {
            Some(capacity) => self.pending.load(Ordering::Acquire) < capacity,
            None => true,
        }
    }

    /// True once a terminal marker was sent or the receiver was closed
    pub fn is_closed(&self) -> bool {
        self.terminated || self.sender.is_closed()
    }

    /// Items enqueued but not yet received
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

// ----------------------------------------------------------------------------
// Consumer Side
// ----------------------------------------------------------------------------

#[derive(Debug)]
pub struct InboundReceiver<T> {
    receiver: mpsc::UnboundedReceiver<InboundEntry<T>>,
    pending: Arc<AtomicUsize>,
}

impl<T> InboundReceiver<T> {
    /// Poll for the next entry. `None` means every sender is gone.
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<InboundEntry<T>>> {
        let polled = self.receiver.poll_recv(cx);
        if let Poll::Ready(Some(InboundEntry::Item(_))) = &polled {
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
        polled
    }

    pub async fn recv(&mut self) -> Option<InboundEntry<T>> {
        poll_fn(|cx| self.poll_recv(cx)).await
    }

    /// Stop accepting entries. Entries already queued can still be received.
    pub fn close(&mut self) {
        self.receiver.close();
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_then_end() {
        let (mut sender, mut receiver) = inbound_queue(QueueCapacity::Unbounded);
        sender.offer("a").unwrap();
        sender.offer("b").unwrap();
        sender.finish().unwrap();

        assert_eq!(receiver.recv().await, Some(InboundEntry::Item("a")));
        assert_eq!(receiver.recv().await, Some(InboundEntry::Item("b")));
        assert_eq!(receiver.recv().await, Some(InboundEntry::End));
    }

    #[tokio::test]
    async fn test_rejects_after_terminal_marker() {
        let (mut sender, _receiver) = inbound_queue::<u8>(QueueCapacity::Unbounded);
        sender.fail(Status::internal("producer failed")).unwrap();
        assert_eq!(sender.offer(1), Err(QueueError::Closed));
        assert_eq!(sender.finish(), Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn test_capacity_counts_undelivered_items() {
        let (mut sender, mut receiver) = inbound_queue(QueueCapacity::Bounded(2));
        sender.offer(1).unwrap();
        sender.offer(2).unwrap();
        assert!(!sender.can_accept());
        assert_eq!(
            sender.offer(3),
            Err(QueueError::CapacityExceeded { capacity: 2 })
        );

        assert_eq!(receiver.recv().await, Some(InboundEntry::Item(1)));
        assert_eq!(sender.pending(), 1);
        sender.offer(3).unwrap();
        assert_eq!(receiver.pending(), 2);
    }

    #[tokio::test]
    async fn test_closed_receiver_rejects_offers() {
        let (mut sender, mut receiver) = inbound_queue(QueueCapacity::Unbounded);
        receiver.close();
        assert_eq!(sender.offer("late"), Err(QueueError::Closed));
        assert_eq!(sender.pending(), 0);
    }
}
