#![doc = "CallBridge Harness\n\nProvides an in-memory `ServerCall` that records every transport interaction, and\nscripted client steps for driving call listeners in tests and simulations."]

pub mod recording;
pub mod script;

pub use recording::{CallEvent, RecordingCall};
pub use script::{drive, ClientStep};
