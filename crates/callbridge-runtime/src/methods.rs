//! Method Handlers
//!
//! The four RPC method shapes, built on the unary and streaming drivers. Each
//! wraps a business function that only deals in requests and responses; the
//! response writer it installs sends the produced responses over the call.
//!
//! | Shape            | Inbound         | Outbound       | Driver      |
//! |------------------|-----------------|----------------|-------------|
//! | Unary            | one message     | one message    | unary       |
//! | Server streaming | one message     | stream         | unary       |
//! | Client streaming | stream          | one message    | streaming   |
//! | Bidi streaming   | stream          | stream         | streaming   |

use crate::{
    driver::CallDriver,
    factory::{streaming_driver, unary_driver},
    streaming::RequestStream,
};
use callbridge_core::{CallListener, DriverConfig, Metadata, ServerCall, Status};
use futures::{pin_mut, Stream, StreamExt};
use std::{future::Future, sync::Arc};
use tracing::trace;

/// Starts calls for one registered method
///
/// The transport calls `start_call` once per incoming call, registers the returned
/// listener, and executes the run unit.
pub trait ServerCallHandler<C: ServerCall, Req>: Send + Sync {
    fn start_call(&self, call: Arc<C>, metadata: Metadata) -> CallDriver<Box<dyn CallListener<Req>>>;
}

// ----------------------------------------------------------------------------
// Response Writers
// ----------------------------------------------------------------------------

async fn respond_once<C, Fut>(call: Arc<C>, response: Fut) -> Result<(), Status>
where
    C: ServerCall,
    Fut: Future<Output = Result<C::Response, Status>>,
{
    let response = response.await?;
    call.send_message(response)?;
    Ok(())
}

async fn respond_stream<C, S>(call: Arc<C>, responses: S) -> Result<(), Status>
where
    C: ServerCall,
    S: Stream<Item = Result<C::Response, Status>>,
{
    pin_mut!(responses);
    let mut sent = 0usize;
    while let Some(response) = responses.next().await {
        call.send_message(response?)?;
        sent += 1;
    }
    trace!(sent, "Response stream finished");
    Ok(())
}

// ----------------------------------------------------------------------------
// Unary
// ----------------------------------------------------------------------------

pub struct UnaryMethod<F> {
    handler: Arc<F>,
    config: DriverConfig,
}

impl<F> UnaryMethod<F> {
    pub fn new(handler: F) -> Self {
        Self {
            handler: Arc::new(handler),
            config: DriverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }
}

impl<C, Req, F, Fut> ServerCallHandler<C, Req> for UnaryMethod<F>
where
    C: ServerCall,
    Req: Send + Sync + 'static,
    F: Fn(Req, Metadata) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<C::Response, Status>> + Send + 'static,
{
    fn start_call(&self, call: Arc<C>, metadata: Metadata) -> CallDriver<Box<dyn CallListener<Req>>> {
        let handler = Arc::clone(&self.handler);
        unary_driver(call, metadata, &self.config, move |request, metadata, call| {
            respond_once(call, (*handler)(request, metadata))
        })
        .boxed()
    }
}

// ----------------------------------------------------------------------------
// Server Streaming
// ----------------------------------------------------------------------------

pub struct ServerStreamingMethod<F> {
    handler: Arc<F>,
    config: DriverConfig,
}

impl<F> ServerStreamingMethod<F> {
    pub fn new(handler: F) -> Self {
        Self {
            handler: Arc::new(handler),
            config: DriverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }
}

impl<C, Req, F, S> ServerCallHandler<C, Req> for ServerStreamingMethod<F>
where
    C: ServerCall,
    Req: Send + Sync + 'static,
    F: Fn(Req, Metadata) -> S + Send + Sync + 'static,
    S: Stream<Item = Result<C::Response, Status>> + Send + 'static,
{
    fn start_call(&self, call: Arc<C>, metadata: Metadata) -> CallDriver<Box<dyn CallListener<Req>>> {
        let handler = Arc::clone(&self.handler);
        unary_driver(call, metadata, &self.config, move |request, metadata, call| {
            respond_stream(call, (*handler)(request, metadata))
        })
        .boxed()
    }
}

// ----------------------------------------------------------------------------
// Client Streaming
// ----------------------------------------------------------------------------

pub struct ClientStreamingMethod<F> {
    handler: Arc<F>,
    config: DriverConfig,
}

impl<F> ClientStreamingMethod<F> {
    pub fn new(handler: F) -> Self {
        Self {
            handler: Arc::new(handler),
            config: DriverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }
}

impl<C, Req, F, Fut> ServerCallHandler<C, Req> for ClientStreamingMethod<F>
where
    C: ServerCall,
    Req: Send + 'static,
    F: Fn(RequestStream<Req>, Metadata) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<C::Response, Status>> + Send + 'static,
{
    fn start_call(&self, call: Arc<C>, metadata: Metadata) -> CallDriver<Box<dyn CallListener<Req>>> {
        let handler = Arc::clone(&self.handler);
        streaming_driver(call, metadata, &self.config, move |requests, metadata, call| {
            respond_once(call, (*handler)(requests, metadata))
        })
        .boxed()
    }
}

// ----------------------------------------------------------------------------
// Bidirectional Streaming
// ----------------------------------------------------------------------------

pub struct BidiStreamingMethod<F> {
    handler: Arc<F>,
    config: DriverConfig,
}

impl<F> BidiStreamingMethod<F> {
    pub fn new(handler: F) -> Self {
        Self {
            handler: Arc::new(handler),
            config: DriverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }
}

impl<C, Req, F, S> ServerCallHandler<C, Req> for BidiStreamingMethod<F>
where
    C: ServerCall,
    Req: Send + 'static,
    F: Fn(RequestStream<Req>, Metadata) -> S + Send + Sync + 'static,
    S: Stream<Item = Result<C::Response, Status>> + Send + 'static,
{
    fn start_call(&self, call: Arc<C>, metadata: Metadata) -> CallDriver<Box<dyn CallListener<Req>>> {
        let handler = Arc::clone(&self.handler);
        streaming_driver(call, metadata, &self.config, move |requests, metadata, call| {
            respond_stream(call, (*handler)(requests, metadata))
        })
        .boxed()
    }
}
