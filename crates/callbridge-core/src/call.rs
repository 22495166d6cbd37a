//! Transport-facing call interfaces
//!
//! Defines the two sides of the transport boundary:
//! - `ServerCall`: the handle the transport gives us for one call
//! - `CallListener`: the push-callback interface we give back to the transport
//!
//! ## Threading
//!
//! The transport invokes listener callbacks on its own threads, one callback at a
//! time per call. Callbacks must never block; listeners in this workspace only ever
//! complete a `Promise` or push onto an inbound queue.

use crate::{errors::TransportError, metadata::Metadata, status::Status};

// ----------------------------------------------------------------------------
// Server Call Handle
// ----------------------------------------------------------------------------

/// Transport handle for a single server-side call
///
/// Implementations must tolerate calls from different threads as long as they are
/// not logically conflicting. The drivers guarantee that `send_headers` precedes
/// any `send_message`, and that `close` is invoked exactly once and last.
pub trait ServerCall: Send + Sync + 'static {
    /// Response message type carried by this call
    type Response: Send + 'static;

    /// Ask the transport to deliver up to `n` more inbound messages
    fn request(&self, n: usize);

    /// Send response headers. Must precede any response payload.
    fn send_headers(&self, headers: Metadata) -> Result<(), TransportError>;

    /// Send one response message
    fn send_message(&self, message: Self::Response) -> Result<(), TransportError>;

    /// Terminate the call with a final status and trailers
    ///
    /// The transport does not guarantee idempotency; callers must invoke this once.
    fn close(&self, status: Status, trailers: Metadata) -> Result<(), TransportError>;
}

// ----------------------------------------------------------------------------
// Call Listener
// ----------------------------------------------------------------------------

/// Push-callback interface the transport drives for one call
pub trait CallListener<Req>: Send {
    /// An inbound message arrived
    fn on_message(&mut self, message: Req);

    /// The client finished sending
    fn on_half_close(&mut self);

    /// The call was cancelled by the client or the transport
    fn on_cancel(&mut self);

    /// The transport finished delivering the final status
    fn on_complete(&mut self) {}

    /// The transport can accept more outbound messages without buffering
    fn on_ready(&mut self) {}
}

impl<Req, L> CallListener<Req> for Box<L>
where
    L: CallListener<Req> + ?Sized,
{
    fn on_message(&mut self, message: Req) {
        (**self).on_message(message)
    }

    fn on_half_close(&mut self) {
        (**self).on_half_close()
    }

    fn on_cancel(&mut self) {
        (**self).on_cancel()
    }

    fn on_complete(&mut self) {
        (**self).on_complete()
    }

    fn on_ready(&mut self) {
        (**self).on_ready()
    }
}
