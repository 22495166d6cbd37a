//! Scripted call scenarios
//!
//! Each scenario starts one call on a [`RecordingCall`], drives the listener with
//! a client script, and waits for the close.

use std::{sync::Arc, time::Duration};

use clap::ValueEnum;
use futures::{future, StreamExt, TryStreamExt};
use tracing::{debug, info};

use callbridge_core::{CallListener, DriverConfig, Metadata, QueueCapacity, Status};
use callbridge_harness::{drive, CallEvent, ClientStep, RecordingCall};
use callbridge_runtime::{
    CallDriver, ClientStreamingMethod, RequestStream, ServerCallHandler, UnaryMethod,
};

use crate::error::{CliError, Result};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
const OVERFLOW_QUEUE_CAPACITY: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// One request, upper-cased response
    Unary,
    /// Two requests, response counts them
    Streaming,
    /// Client cancels while the writer is parked
    Cancel,
    /// Client outruns a bounded inbound queue
    Overflow,
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Scenario::Unary => "unary",
            Scenario::Streaming => "streaming",
            Scenario::Cancel => "cancel",
            Scenario::Overflow => "overflow",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug)]
pub struct SimulationReport {
    pub scenario: Scenario,
    pub status: Status,
    pub run_result: std::result::Result<(), Status>,
    pub events: Vec<CallEvent<String>>,
}

impl SimulationReport {
    pub fn print(&self) {
        println!("Scenario: {}", self.scenario);
        for event in &self.events {
            match event {
                CallEvent::Request(n) => println!("  request({})", n),
                CallEvent::Headers(metadata) => println!("  headers ({} entries)", metadata.len()),
                CallEvent::Message(message) => println!("  message {:?}", message),
                CallEvent::Close(status, _) => println!("  close {}", status),
            }
        }
        match &self.run_result {
            Ok(()) => println!("Run unit: ok"),
            Err(status) => println!("Run unit: {}", status),
        }
    }
}

type StringDriver = CallDriver<Box<dyn CallListener<String>>>;

fn start(scenario: Scenario, call: Arc<RecordingCall<String>>, config: &DriverConfig) -> StringDriver {
    match scenario {
        Scenario::Unary => UnaryMethod::new(|request: String, _metadata: Metadata| async move {
            Ok::<_, Status>(request.to_uppercase())
        })
        .with_config(config.clone())
        .start_call(call, Metadata::new()),

        Scenario::Streaming => {
            ClientStreamingMethod::new(|requests: RequestStream<String>, _metadata: Metadata| async move {
                let received: Vec<String> = requests.try_collect().await?;
                Ok::<_, Status>(format!("received {}", received.len()))
            })
            .with_config(config.clone())
            .start_call(call, Metadata::new())
        }

        Scenario::Cancel => {
            ClientStreamingMethod::new(|mut requests: RequestStream<String>, _metadata: Metadata| async move {
                let first = requests.next().await;
                debug!(?first, "Writer parked after first request");
                future::pending::<()>().await;
                Ok::<_, Status>(String::new())
            })
            .with_config(config.clone())
            .start_call(call, Metadata::new())
        }

        Scenario::Overflow => {
            let config = config
                .clone()
                .with_inbound_queue(QueueCapacity::Bounded(OVERFLOW_QUEUE_CAPACITY));
            ClientStreamingMethod::new(|requests: RequestStream<String>, _metadata: Metadata| async move {
                let received: Vec<String> = requests.try_collect().await?;
                Ok::<_, Status>(received.join(","))
            })
            .with_config(config)
            .start_call(call, Metadata::new())
        }
    }
}

fn script(scenario: Scenario) -> Vec<ClientStep<String>> {
    match scenario {
        Scenario::Unary => ClientStep::messages_then_half_close(["hello".to_string()]),
        Scenario::Streaming => {
            ClientStep::messages_then_half_close(["a".to_string(), "b".to_string()])
        }
        Scenario::Cancel => vec![ClientStep::Message("a".to_string()), ClientStep::Cancel],
        Scenario::Overflow => {
            ClientStep::messages_then_half_close((0..OVERFLOW_QUEUE_CAPACITY + 3).map(|i| i.to_string()))
        }
    }
}

/// Run one scenario to completion
pub async fn run_scenario(scenario: Scenario, config: &DriverConfig) -> Result<SimulationReport> {
    info!(%scenario, "Starting simulated call");
    let call = Arc::new(RecordingCall::<String>::new());
    let driver = start(scenario, Arc::clone(&call), config);
    let id = driver.id();

    let (mut listener, handle) = driver.spawn();
    for step in script(scenario) {
        if step == ClientStep::Cancel {
            // give the writer a chance to park first
            tokio::task::yield_now().await;
        }
        drive(&mut listener, [step]);
    }

    let status = tokio::time::timeout(CLOSE_TIMEOUT, call.wait_closed())
        .await
        .map_err(|_| CliError::Simulation(format!("call {} was not closed in time", id)))?;
    let run_result = handle.await?;
    info!(%scenario, %status, "Simulated call closed");

    Ok(SimulationReport {
        scenario,
        status,
        run_result,
        events: call.events(),
    })
}
