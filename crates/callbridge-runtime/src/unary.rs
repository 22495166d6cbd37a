//! Unary Call Driver
//!
//! Listener and run sequence for calls whose inbound request is a single message.
//!
//! ## Protocol
//!
//! The run sequence requests two messages so that a client sending more than one
//! is observed instead of silently ignored. The listener writes the first message
//! into the request promise; a rejected second write fails the completion signal
//! with `INTERNAL: Too many requests`. Half-close resolves the completion signal
//! successfully if nothing failed it first.

use callbridge_core::{CallId, CallListener, Metadata, Promise, ServerCall, Status};
use std::{future::Future, sync::Arc};
use tracing::{debug, trace, warn};

pub(crate) const TOO_MANY_REQUESTS: &str = "Too many requests";
pub(crate) const MISSING_REQUEST: &str = "Half-closed without a request";

// ----------------------------------------------------------------------------
// Listener
// ----------------------------------------------------------------------------

/// Transport listener for a unary-input call
pub struct UnaryCallListener<Req> {
    id: CallId,
    request: Promise<Req>,
    completed: Promise<Result<(), Status>>,
    cancelled: Promise<()>,
}

impl<Req> UnaryCallListener<Req> {
    pub(crate) fn new(
        id: CallId,
        request: Promise<Req>,
        completed: Promise<Result<(), Status>>,
        cancelled: Promise<()>,
    ) -> Self {
        Self {
            id,
            request,
            completed,
            cancelled,
        }
    }
}

impl<Req> CallListener<Req> for UnaryCallListener<Req>
where
    Req: Send + Sync + 'static,
{
    fn on_message(&mut self, message: Req) {
        trace!(call_id = %self.id, "on_message");
        if !self.request.complete(message) {
            warn!(call_id = %self.id, "Client sent more than one request on a unary call");
            self.completed
                .complete(Err(Status::internal(TOO_MANY_REQUESTS)));
        }
    }

    fn on_half_close(&mut self) {
        trace!(call_id = %self.id, "on_half_close");
        // Already failed by an extra request; keep that failure
        self.completed.complete(Ok(()));
    }

    fn on_cancel(&mut self) {
        trace!(call_id = %self.id, "on_cancel");
        self.cancelled.complete(());
    }
}

impl<Req> std::fmt::Debug for UnaryCallListener<Req> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnaryCallListener")
            .field("id", &self.id)
            .field("request_received", &self.request.is_completed())
            .field("completed", &self.completed.is_completed())
            .field("cancelled", &self.cancelled.is_completed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Run Sequence
// ----------------------------------------------------------------------------

/// Shared state the unary run sequence reads from
pub(crate) struct UnaryInbound<Req> {
    pub(crate) request: Promise<Req>,
    pub(crate) completed: Promise<Result<(), Status>>,
    pub(crate) credit: usize,
}

/// Wait for half-close, send headers, then hand the request to the writer
pub(crate) async fn run_unary<C, Req, W, Fut>(
    id: CallId,
    call: Arc<C>,
    metadata: Metadata,
    inbound: UnaryInbound<Req>,
    writer: W,
) -> Result<(), Status>
where
    C: ServerCall,
    W: FnOnce(Req, Metadata, Arc<C>) -> Fut,
    Fut: Future<Output = Result<(), Status>>,
{
    call.request(inbound.credit);
    inbound.completed.wait().await?;

    call.send_headers(Metadata::new())?;
    debug!(call_id = %id, "Response headers sent");

    let request = inbound
        .request
        .try_take()
        .ok_or_else(|| Status::internal(MISSING_REQUEST))?;
    writer(request, metadata, call).await
}
