//! Driver Factories
//!
//! Assemble a `CallDriver` for one call: allocate the hand-off primitives, close
//! over the response writer with the call's metadata and transport handle, and
//! wrap the run sequence in the close guard and the cancellation race.
//!
//! Construction cannot fail. Nothing touches the transport until the run unit
//! starts, so the listener can be registered before any message is requested.
//!
//! Configurations are expected to be validated with `DriverConfig::validate`
//! before use; debug builds assert it.

use crate::{
    driver::{close_on_exit, race_cancellation, CallDriver, CloseGuard},
    streaming::{run_streaming, FlowControl, RequestStream, StreamingCallListener},
    unary::{run_unary, UnaryCallListener, UnaryInbound},
};
use callbridge_core::{inbound_queue, CallId, DriverConfig, Metadata, Promise, ServerCall, Status};
use futures::FutureExt;
use std::{future::Future, sync::Arc};
use tracing::{debug_span, Instrument};

/// Build a driver for a call whose request is a single message
///
/// `writer` receives the request, the call's request metadata and the call
/// handle, and is invoked at most once, after response headers were sent.
pub fn unary_driver<C, Req, W, Fut>(
    call: Arc<C>,
    metadata: Metadata,
    config: &DriverConfig,
    writer: W,
) -> CallDriver<UnaryCallListener<Req>>
where
    C: ServerCall,
    Req: Send + Sync + 'static,
    W: FnOnce(Req, Metadata, Arc<C>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), Status>> + Send + 'static,
{
    debug_assert_valid(config);
    let id = CallId::new();
    let request = Promise::new();
    let completed = Promise::new();
    let cancelled = Promise::new();

    let listener = UnaryCallListener::new(
        id,
        request.clone(),
        completed.clone(),
        cancelled.clone(),
    );

    let inbound = UnaryInbound {
        request,
        completed,
        credit: config.unary_request_credit,
    };
    let guard = CloseGuard::new(id, Arc::clone(&call));
    let sequence = run_unary(id, call, metadata, inbound, writer);
    let run = race_cancellation(id, close_on_exit(guard, sequence), cancelled)
        .instrument(debug_span!("call", call_id = %id, kind = "unary"));

    CallDriver::new(id, listener, run.boxed())
}

/// Build a driver for a call whose request is a stream of messages
///
/// `writer` receives the lazy request stream, the call's request metadata and
/// the call handle, and is invoked once, after response headers were sent.
pub fn streaming_driver<C, Req, W, Fut>(
    call: Arc<C>,
    metadata: Metadata,
    config: &DriverConfig,
    writer: W,
) -> CallDriver<StreamingCallListener<Req, C>>
where
    C: ServerCall,
    Req: Send + 'static,
    W: FnOnce(RequestStream<Req>, Metadata, Arc<C>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), Status>> + Send + 'static,
{
    debug_assert_valid(config);
    let id = CallId::new();
    let cancelled = Promise::new();
    let (sender, receiver) = inbound_queue(config.inbound_queue);
    let flow = Arc::new(FlowControl::new(
        id,
        Arc::clone(&call),
        config.inbound_queue.limit(),
        config.streaming_refill_credit,
    ));

    let listener = StreamingCallListener::new(id, sender, Arc::clone(&flow), cancelled.clone());

    let guard = CloseGuard::new(id, Arc::clone(&call));
    let sequence = run_streaming(
        id,
        call,
        metadata,
        receiver,
        flow,
        config.streaming_initial_credit,
        writer,
    );
    let run = race_cancellation(id, close_on_exit(guard, sequence), cancelled)
        .instrument(debug_span!("call", call_id = %id, kind = "streaming"));

    CallDriver::new(id, listener, run.boxed())
}

fn debug_assert_valid(config: &DriverConfig) {
    debug_assert!(
        config.validate().is_ok(),
        "invalid driver configuration: {:?}",
        config.validate()
    );
}
