//! Call Driver
//!
//! A driver pairs the listener handed to the transport with the run unit that
//! serves the call. This module also holds the two pieces both driver variants
//! share: the close guard, which makes sure the transport call is closed exactly
//! once on every exit path, and the race between the run unit and transport
//! cancellation.

use callbridge_core::{CallId, CallListener, Exit, Metadata, Promise, ServerCall, Status};
use futures::{future::BoxFuture, FutureExt};
use std::{
    any::Any,
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Asynchronous unit of work serving one call
///
/// Resolves once the call has been closed. `Err` carries the failure status that
/// was sent to the transport; cancellation resolves to `Ok(())`.
pub type RunUnit = BoxFuture<'static, Result<(), Status>>;

// ----------------------------------------------------------------------------
// Call Driver
// ----------------------------------------------------------------------------

/// Listener and run unit for one incoming call
///
/// Register the listener with the transport, then execute the run unit exactly
/// once. Both are discarded when the call terminates.
pub struct CallDriver<L> {
    id: CallId,
    listener: L,
    run: RunUnit,
}

impl<L> CallDriver<L> {
    pub(crate) fn new(id: CallId, listener: L, run: RunUnit) -> Self {
        Self { id, listener, run }
    }

    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    pub fn into_parts(self) -> (L, RunUnit) {
        (self.listener, self.run)
    }

    /// Run the run unit on the current tokio runtime and hand back the listener
    pub fn spawn(self) -> (L, JoinHandle<Result<(), Status>>) {
        let handle = tokio::spawn(self.run);
        (self.listener, handle)
    }

    /// Erase the listener type
    pub fn boxed<Req>(self) -> CallDriver<Box<dyn CallListener<Req>>>
    where
        L: CallListener<Req> + 'static,
        Req: 'static,
    {
        CallDriver {
            id: self.id,
            listener: Box::new(self.listener),
            run: self.run,
        }
    }
}

impl<L> std::fmt::Debug for CallDriver<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallDriver").field("id", &self.id).finish()
    }
}

// ----------------------------------------------------------------------------
// Close Guard
// ----------------------------------------------------------------------------

/// One-shot guard around `ServerCall::close`
///
/// Dropping the guard before it closed the call (the run unit was interrupted)
/// closes with the interruption status.
pub(crate) struct CloseGuard<C: ServerCall> {
    id: CallId,
    call: Arc<C>,
    closed: AtomicBool,
}

impl<C: ServerCall> CloseGuard<C> {
    pub(crate) fn new(id: CallId, call: Arc<C>) -> Self {
        Self {
            id,
            call,
            closed: AtomicBool::new(false),
        }
    }

    /// Close the call with the status mapped from `exit`. Returns `false` if
    /// the call was already closed.
    pub(crate) fn close(&self, exit: &Exit) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            warn!(call_id = %self.id, ?exit, "Call already closed, ignoring close");
            return false;
        }

        if let Exit::Defect(message) = exit {
            error!(call_id = %self.id, "Call handler panicked: {}", message);
        }

        let status = exit.to_status();
        debug!(call_id = %self.id, %status, "Closing call");

        // Close is a best-effort termination signal
        if let Err(err) = self.call.close(status, Metadata::new()) {
            warn!(call_id = %self.id, "Suppressed failure while closing call: {}", err);
        }
        true
    }
}

impl<C: ServerCall> Drop for CloseGuard<C> {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            debug!(call_id = %self.id, "Run unit interrupted before closing");
            self.close(&Exit::Interrupted);
        }
    }
}

// ----------------------------------------------------------------------------
// Exit Handling
// ----------------------------------------------------------------------------

/// Run `sequence` to completion and close the call with its mapped outcome
///
/// If this future is dropped first, the guard closes the call as interrupted.
pub(crate) async fn close_on_exit<C, F>(guard: CloseGuard<C>, sequence: F) -> Result<(), Status>
where
    C: ServerCall,
    F: Future<Output = Result<(), Status>>,
{
    let exit = match AssertUnwindSafe(sequence).catch_unwind().await {
        Ok(result) => Exit::from_result(result),
        Err(payload) => Exit::Defect(panic_message(payload.as_ref())),
    };

    guard.close(&exit);
    exit.into_result()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Race the run sequence against transport cancellation
///
/// Whichever finishes first wins and the other side is dropped. When cancellation
/// wins, dropping the run sequence drops its close guard, which closes the call.
pub(crate) async fn race_cancellation<F>(
    id: CallId,
    run: F,
    cancelled: Promise<()>,
) -> Result<(), Status>
where
    F: Future<Output = Result<(), Status>>,
{
    tokio::select! {
        result = run => result,
        () = cancelled.wait() => {
            debug!(call_id = %id, "Call cancelled by transport");
            Ok(())
        }
    }
}
