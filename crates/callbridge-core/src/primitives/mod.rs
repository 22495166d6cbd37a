//! Concurrency primitives for the callback/async boundary
//!
//! The transport's callback threads and the async run unit share exactly two kinds
//! of state, both safe for single-producer/single-consumer use without locks held
//! across callbacks:
//! - `Promise`: a write-once cell for handing over at most one value
//! - `inbound_queue`: a FIFO of tagged entries for handing over a message sequence

mod promise;
mod queue;

pub use promise::Promise;
pub use queue::{inbound_queue, InboundEntry, InboundReceiver, InboundSender};
