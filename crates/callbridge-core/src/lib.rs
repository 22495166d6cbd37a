//! CallBridge Core
//!
//! This crate provides the stable API definitions for bridging a callback-driven
//! RPC transport into async call handlers:
//! - `Status`, `Code` and the `Exit` outcome with its status mapping
//! - The `ServerCall` transport handle and `CallListener` callback traits
//! - The concurrency primitives used to hand data across the callback/async boundary
//! - Configuration and error types
//!
//! The drivers that wire these together live in `callbridge-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod call;
pub mod config;
pub mod errors;
pub mod ids;
pub mod metadata;
pub mod primitives;
pub mod status;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use call::{CallListener, ServerCall};
pub use config::{DriverConfig, QueueCapacity};
pub use errors::{BridgeError, ConfigError, QueueError, TransportError};
pub use ids::CallId;
pub use metadata::Metadata;
pub use primitives::{inbound_queue, InboundEntry, InboundReceiver, InboundSender, Promise};
pub use status::{Code, Exit, Status};
