//! Recording transport
//!
//! `RecordingCall` behaves like a strict transport: it rejects headers after
//! close, messages before headers, and any second close, while recording every
//! attempt so tests can assert on exactly-once behavior.

use callbridge_core::{Metadata, Promise, ServerCall, Status, TransportError};
use std::sync::{Mutex, MutexGuard};
use tracing::trace;

/// One interaction with the transport, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent<Resp> {
    Request(usize),
    Headers(Metadata),
    Message(Resp),
    Close(Status, Metadata),
}

#[derive(Debug, Default)]
struct CallState {
    headers_sent: bool,
    closed: bool,
    close_attempts: usize,
}

#[derive(Debug)]
pub struct RecordingCall<Resp> {
    events: Mutex<Vec<CallEvent<Resp>>>,
    state: Mutex<CallState>,
    closed: Promise<Status>,
    close_failure: Option<TransportError>,
}

impl<Resp> Default for RecordingCall<Resp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Resp> RecordingCall<Resp> {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            state: Mutex::new(CallState::default()),
            closed: Promise::new(),
            close_failure: None,
        }
    }

    /// A call whose `close` records the status and then reports `failure`
    pub fn with_close_failure(failure: TransportError) -> Self {
        Self {
            close_failure: Some(failure),
            ..Self::new()
        }
    }

    fn events_lock(&self) -> MutexGuard<'_, Vec<CallEvent<Resp>>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state_lock(&self) -> MutexGuard<'_, CallState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, event: CallEvent<Resp>) {
        self.events_lock().push(event);
    }

    /// Sizes of every `request(n)` call, in order
    pub fn request_calls(&self) -> Vec<usize> {
        self.events_lock()
            .iter()
            .filter_map(|event| match event {
                CallEvent::Request(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    /// Total credit requested so far
    pub fn requested(&self) -> usize {
        self.request_calls().iter().sum()
    }

    pub fn headers_sent(&self) -> usize {
        self.events_lock()
            .iter()
            .filter(|event| matches!(event, CallEvent::Headers(_)))
            .count()
    }

    /// Number of times `close` was invoked, including rejected attempts
    pub fn close_attempts(&self) -> usize {
        self.state_lock().close_attempts
    }

    pub fn close_status(&self) -> Option<Status> {
        self.closed.get()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_completed()
    }

    /// Wait until the call is closed and return the final status
    pub async fn wait_closed(&self) -> Status {
        self.closed.wait().await
    }
}

impl<Resp: Clone> RecordingCall<Resp> {
    pub fn events(&self) -> Vec<CallEvent<Resp>> {
        self.events_lock().clone()
    }

    pub fn messages(&self) -> Vec<Resp> {
        self.events_lock()
            .iter()
            .filter_map(|event| match event {
                CallEvent::Message(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

impl<Resp> ServerCall for RecordingCall<Resp>
where
    Resp: Send + 'static,
{
    type Response = Resp;

    fn request(&self, n: usize) {
        trace!(n, "request");
        self.record(CallEvent::Request(n));
    }

    fn send_headers(&self, headers: Metadata) -> Result<(), TransportError> {
        let mut state = self.state_lock();
        if state.closed {
            return Err(TransportError::AlreadyClosed);
        }
        if state.headers_sent {
            return Err(TransportError::HeadersAlreadySent);
        }
        state.headers_sent = true;
        drop(state);

        trace!("send_headers");
        self.record(CallEvent::Headers(headers));
        Ok(())
    }

    fn send_message(&self, message: Resp) -> Result<(), TransportError> {
        let state = self.state_lock();
        if state.closed {
            return Err(TransportError::AlreadyClosed);
        }
        if !state.headers_sent {
            return Err(TransportError::Other(
                "message sent before response headers".to_string(),
            ));
        }
        drop(state);

        trace!("send_message");
        self.record(CallEvent::Message(message));
        Ok(())
    }

    fn close(&self, status: Status, trailers: Metadata) -> Result<(), TransportError> {
        let mut state = self.state_lock();
        state.close_attempts += 1;
        if state.closed {
            return Err(TransportError::AlreadyClosed);
        }
        state.closed = true;
        drop(state);

        trace!(%status, "close");
        self.record(CallEvent::Close(status.clone(), trailers));
        self.closed.complete(status);

        match &self.close_failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }
}
