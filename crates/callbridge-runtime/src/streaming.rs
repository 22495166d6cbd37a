//! Streaming Call Driver
//!
//! Listener, request stream and run sequence for calls whose inbound request is a
//! stream of messages.
//!
//! ## Flow control
//!
//! One message is requested when the run unit starts and each delivered message
//! re-arms one more, so the transport never has more than the configured credit
//! outstanding.
//!
//! With a bounded inbound queue, queued messages plus outstanding credit never
//! exceed the capacity. Credit is re-armed by the listener while there is room
//! and by the request stream as it drains a full queue, so a transport that only
//! sends what was requested never overflows. Messages beyond the credit that do
//! not fit fail the stream with `RESOURCE_EXHAUSTED`.

use callbridge_core::{
    CallId, CallListener, InboundEntry, InboundReceiver, InboundSender, Metadata, Promise,
    QueueError, ServerCall, Status,
};
use futures::Stream;
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    task::{ready, Context, Poll},
};
use tracing::{debug, trace, warn};

pub(crate) const LISTENER_DROPPED: &str = "Call listener dropped before half-close";

// ----------------------------------------------------------------------------
// Flow Control
// ----------------------------------------------------------------------------

/// Credit requests on behalf of the listener and the request stream
trait RequestCredit: Send + Sync {
    fn request_credit(&self, n: usize);
}

impl<C: ServerCall> RequestCredit for C {
    fn request_credit(&self, n: usize) {
        self.request(n);
    }
}

/// Inbound credit shared by the listener and the request stream
///
/// Unbounded queues re-arm `refill` credit per delivered message. Bounded queues
/// keep `pending + outstanding <= capacity`, where `outstanding` is credit
/// requested from the transport and not yet delivered.
pub(crate) struct FlowControl {
    id: CallId,
    call: Arc<dyn RequestCredit>,
    capacity: Option<usize>,
    refill: usize,
    outstanding: AtomicUsize,
}

impl FlowControl {
    pub(crate) fn new<C: ServerCall>(
        id: CallId,
        call: Arc<C>,
        capacity: Option<usize>,
        refill: usize,
    ) -> Self {
        Self {
            id,
            call,
            capacity,
            refill,
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Request up to `wanted` messages given `pending` queued ones. Returns the
    /// credit actually requested.
    pub(crate) fn grant(&self, wanted: usize, pending: usize) -> usize {
        let Some(capacity) = self.capacity else {
            self.call.request_credit(wanted);
            return wanted;
        };

        let mut outstanding = self.outstanding.load(Ordering::Acquire);
        loop {
            let headroom = capacity.saturating_sub(pending.saturating_add(outstanding));
            let granted = wanted.min(headroom);
            if granted == 0 {
                trace!(call_id = %self.id, pending, outstanding, "No room for more credit");
                return 0;
            }
            match self.outstanding.compare_exchange_weak(
                outstanding,
                outstanding + granted,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.call.request_credit(granted);
                    return granted;
                }
                Err(current) => outstanding = current,
            }
        }
    }

    /// A message was queued by the listener
    fn delivered(&self, pending: usize) {
        if self.capacity.is_some() {
            // Uncredited deliveries leave the count at zero
            let _ = self
                .outstanding
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        }
        self.grant(self.refill, pending);
    }

    /// A message was taken off a bounded queue by the request stream
    fn drained(&self, pending: usize) {
        if self.capacity.is_some() {
            self.grant(self.refill, pending);
        }
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for FlowControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowControl")
            .field("capacity", &self.capacity)
            .field("refill", &self.refill)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Listener
// ----------------------------------------------------------------------------

/// Transport listener for a streaming-input call
pub struct StreamingCallListener<Req, C> {
    id: CallId,
    inbound: InboundSender<Req>,
    flow: Arc<FlowControl>,
    cancelled: Promise<()>,
    _call: std::marker::PhantomData<fn() -> C>,
}

impl<Req, C> StreamingCallListener<Req, C> {
    pub(crate) fn new(
        id: CallId,
        inbound: InboundSender<Req>,
        flow: Arc<FlowControl>,
        cancelled: Promise<()>,
    ) -> Self {
        Self {
            id,
            inbound,
            flow,
            cancelled,
            _call: std::marker::PhantomData,
        }
    }

    fn reject(&mut self, err: QueueError) {
        match err {
            QueueError::CapacityExceeded { capacity } => {
                warn!(
                    call_id = %self.id,
                    capacity, "Inbound queue overflow, failing request stream"
                );
                // Cannot fail: the queue was open a moment ago
                let _ = self.inbound.fail(Status::from(err));
            }
            QueueError::Closed => {
                debug!(call_id = %self.id, "Dropping message received after inbound queue closed");
            }
        }
    }
}

impl<Req, C> CallListener<Req> for StreamingCallListener<Req, C>
where
    Req: Send + 'static,
    C: ServerCall,
{
    fn on_message(&mut self, message: Req) {
        trace!(call_id = %self.id, pending = self.inbound.pending(), "on_message");
        match self.inbound.offer(message) {
            Ok(()) => self.flow.delivered(self.inbound.pending()),
            Err(err) => self.reject(err),
        }
    }

    fn on_half_close(&mut self) {
        trace!(call_id = %self.id, "on_half_close");
        if self.inbound.finish().is_err() {
            debug!(call_id = %self.id, "Half-close after inbound queue closed");
        }
    }

    fn on_cancel(&mut self) {
        trace!(call_id = %self.id, "on_cancel");
        self.cancelled.complete(());
    }
}

impl<Req, C> std::fmt::Debug for StreamingCallListener<Req, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingCallListener")
            .field("id", &self.id)
            .field("pending", &self.inbound.pending())
            .field("outstanding", &self.flow.outstanding())
            .field("closed", &self.inbound.is_closed())
            .field("cancelled", &self.cancelled.is_completed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Request Stream
// ----------------------------------------------------------------------------

/// Lazy sequence of inbound request messages
///
/// Yields messages in delivery order and ends after the client half-closes.
/// A failure marker ends the stream with `Err(status)`.
#[derive(Debug)]
pub struct RequestStream<Req> {
    receiver: InboundReceiver<Req>,
    flow: Arc<FlowControl>,
    done: bool,
}

impl<Req> RequestStream<Req> {
    pub(crate) fn new(receiver: InboundReceiver<Req>, flow: Arc<FlowControl>) -> Self {
        Self {
            receiver,
            flow,
            done: false,
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.receiver.close();
    }
}

// Never pin-projected
impl<Req> Unpin for RequestStream<Req> {}

impl<Req> Stream for RequestStream<Req> {
    type Item = Result<Req, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match ready!(this.receiver.poll_recv(cx)) {
            Some(InboundEntry::Item(message)) => {
                this.flow.drained(this.receiver.pending());
                Poll::Ready(Some(Ok(message)))
            }
            Some(InboundEntry::End) => {
                this.finish();
                Poll::Ready(None)
            }
            Some(InboundEntry::Fail(status)) => {
                this.finish();
                Poll::Ready(Some(Err(status)))
            }
            None => {
                this.finish();
                Poll::Ready(Some(Err(Status::cancelled(LISTENER_DROPPED))))
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Run Sequence
// ----------------------------------------------------------------------------

/// Issue the initial credit, send headers, then hand the request stream to the writer
pub(crate) async fn run_streaming<C, Req, W, Fut>(
    id: CallId,
    call: Arc<C>,
    metadata: Metadata,
    receiver: InboundReceiver<Req>,
    flow: Arc<FlowControl>,
    initial_credit: usize,
    writer: W,
) -> Result<(), Status>
where
    C: ServerCall,
    W: FnOnce(RequestStream<Req>, Metadata, Arc<C>) -> Fut,
    Fut: Future<Output = Result<(), Status>>,
{
    flow.grant(initial_credit, receiver.pending());
    call.send_headers(Metadata::new())?;
    debug!(call_id = %id, "Response headers sent");

    writer(RequestStream::new(receiver, flow), metadata, call).await
}
