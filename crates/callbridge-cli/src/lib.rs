//! CallBridge CLI
//!
//! Runs scripted calls through the call drivers against the recording transport
//! and prints what the transport observed.

pub mod cli;
pub mod config;
pub mod error;
pub mod simulate;
