//! CallBridge Runtime
//!
//! This crate contains the call drivers that connect a callback-driven RPC
//! transport to async call handlers:
//! - Unary and streaming call drivers (listener + run unit pairs)
//! - The close-on-exit guard and the cancellation race shared by both drivers
//! - Driver factories for response writers
//! - Method handlers for the four RPC shapes built on top of the factories
//!
//! `callbridge-core` provides the types these are built from.

mod driver;
pub mod factory;
pub mod methods;
pub mod streaming;
pub mod unary;

pub use driver::{CallDriver, RunUnit};
pub use factory::{streaming_driver, unary_driver};
pub use methods::{
    BidiStreamingMethod, ClientStreamingMethod, ServerCallHandler, ServerStreamingMethod,
    UnaryMethod,
};
pub use streaming::{RequestStream, StreamingCallListener};
pub use unary::UnaryCallListener;

// Re-export core types for convenience
pub use callbridge_core::{
    CallId, CallListener, Code, DriverConfig, Exit, Metadata, QueueCapacity, ServerCall, Status,
};
