//! Integration Tests for the Streaming Call Driver
//!
//! Covers ordered delivery, per-message credit, bounded inbound queues and
//! termination of the request stream on cancel and listener drop.

use callbridge_core::Promise;
use callbridge_harness::{drive, ClientStep, RecordingCall};
use callbridge_runtime::{
    streaming_driver, Code, DriverConfig, Metadata, QueueCapacity, RequestStream, ServerCall,
    Status,
};
use futures::{StreamExt, TryStreamExt};
use std::{sync::Arc, time::Duration};
use tokio::{sync::Notify, time::timeout};

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

type TestCall = RecordingCall<String>;

async fn closed_status(call: &TestCall) -> Status {
    timeout(Duration::from_secs(1), call.wait_closed())
        .await
        .expect("Call should be closed within timeout")
}

/// Collects every request and answers with them joined by commas
async fn join_all(
    requests: RequestStream<String>,
    _metadata: Metadata,
    call: Arc<TestCall>,
) -> Result<(), Status> {
    let received: Vec<String> = requests.try_collect().await?;
    call.send_message(received.join(","))?;
    Ok(())
}

/// Answers every request as it arrives
async fn echo_each(
    mut requests: RequestStream<String>,
    _metadata: Metadata,
    call: Arc<TestCall>,
) -> Result<(), Status> {
    while let Some(request) = requests.next().await {
        call.send_message(request?)?;
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Delivery and Flow Control
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_messages_delivered_in_order() {
    let call = Arc::new(TestCall::new());
    let driver = streaming_driver(
        Arc::clone(&call),
        Metadata::new(),
        &DriverConfig::default(),
        join_all,
    );
    let (mut listener, handle) = driver.spawn();

    drive(
        &mut listener,
        ClientStep::messages_then_half_close(["a".to_string(), "b".to_string()]),
    );

    assert_eq!(closed_status(&call).await, Status::ok());
    assert_eq!(handle.await.unwrap(), Ok(()));
    assert_eq!(call.messages(), vec!["a,b".to_string()]);
    assert_eq!(call.headers_sent(), 1);
    assert_eq!(call.close_attempts(), 1);
}

#[tokio::test]
async fn test_each_message_rearms_one_credit() {
    let call = Arc::new(TestCall::new());
    let driver = streaming_driver(
        Arc::clone(&call),
        Metadata::new(),
        &DriverConfig::default(),
        echo_each,
    );
    let (mut listener, handle) = driver.spawn();

    // Initial credit is issued by the run unit
    tokio::task::yield_now().await;
    assert_eq!(call.request_calls(), vec![1]);

    for (delivered, message) in ["a", "b", "c"].into_iter().enumerate() {
        drive(&mut listener, [ClientStep::Message(message.to_string())]);
        assert_eq!(call.request_calls(), vec![1; delivered + 2]);
    }
    drive(&mut listener, [ClientStep::HalfClose]);

    assert_eq!(closed_status(&call).await.code(), Code::Ok);
    handle.await.unwrap().unwrap();
    assert_eq!(call.messages(), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_streaming_credit_from_config() {
    let call = Arc::new(TestCall::new());
    let config = DriverConfig::default().with_streaming_credit(4, 2);
    let driver = streaming_driver(Arc::clone(&call), Metadata::new(), &config, join_all);
    let (mut listener, handle) = driver.spawn();

    tokio::task::yield_now().await;
    drive(&mut listener, ClientStep::messages_then_half_close(["a".to_string()]));

    closed_status(&call).await;
    handle.await.unwrap().unwrap();
    assert_eq!(call.request_calls(), vec![4, 2]);
}

#[tokio::test]
async fn test_empty_stream() {
    let call = Arc::new(TestCall::new());
    let driver = streaming_driver(
        Arc::clone(&call),
        Metadata::new(),
        &DriverConfig::default(),
        join_all,
    );
    let (mut listener, handle) = driver.spawn();

    drive(&mut listener, [ClientStep::<String>::HalfClose]);

    assert_eq!(closed_status(&call).await, Status::ok());
    handle.await.unwrap().unwrap();
    assert_eq!(call.messages(), vec![String::new()]);
}

#[tokio::test]
async fn test_headers_sent_before_first_message_arrives() {
    let call = Arc::new(TestCall::new());
    let driver = streaming_driver(
        Arc::clone(&call),
        Metadata::new(),
        &DriverConfig::default(),
        echo_each,
    );
    let (mut listener, handle) = driver.spawn();

    tokio::task::yield_now().await;
    assert_eq!(call.headers_sent(), 1);

    drive(&mut listener, ClientStep::messages_then_half_close(["a".to_string()]));
    closed_status(&call).await;
    handle.await.unwrap().unwrap();
}

// ----------------------------------------------------------------------------
// Bounded Inbound Queue
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_bounded_queue_overflow_fails_stream() {
    let call = Arc::new(TestCall::new());
    let config = DriverConfig::default().with_inbound_queue(QueueCapacity::Bounded(2));
    let driver = streaming_driver(Arc::clone(&call), Metadata::new(), &config, echo_each);
    let (mut listener, handle) = driver.spawn();

    // Delivered before any credit was issued, so the queue overflows
    drive(
        &mut listener,
        ClientStep::messages_then_half_close((0..4).map(|i| i.to_string())),
    );

    let status = closed_status(&call).await;
    assert_eq!(status.code(), Code::ResourceExhausted);
    assert_eq!(handle.await.unwrap(), Err(status));

    // Queued messages before the overflow are still delivered
    assert_eq!(call.messages(), vec!["0", "1"]);
    assert_eq!(call.close_attempts(), 1);
}

#[tokio::test]
async fn test_bounded_queue_credited_sender_never_overflows() {
    const CAPACITY: usize = 2;
    const TOTAL: usize = 6;

    let call = Arc::new(TestCall::new());
    let release = Arc::new(Notify::new());
    let writer_release = Arc::clone(&release);
    let config = DriverConfig::default().with_inbound_queue(QueueCapacity::Bounded(CAPACITY));
    let driver = streaming_driver(
        Arc::clone(&call),
        Metadata::new(),
        &config,
        move |requests: RequestStream<String>, metadata: Metadata, call: Arc<TestCall>| async move {
            writer_release.notified().await;
            join_all(requests, metadata, call).await
        },
    );
    let (mut listener, handle) = driver.spawn();
    tokio::task::yield_now().await;

    // The writer is parked: a credit-respecting transport fills the queue and stops
    let mut delivered = 0;
    while call.requested() > delivered {
        drive(&mut listener, [ClientStep::Message(delivered.to_string())]);
        delivered += 1;
    }
    assert_eq!(delivered, CAPACITY);
    assert_eq!(call.requested(), CAPACITY);

    // Draining the queue re-arms credit for the rest of the messages
    release.notify_one();
    timeout(Duration::from_secs(1), async {
        while delivered < TOTAL {
            if call.requested() > delivered {
                drive(&mut listener, [ClientStep::Message(delivered.to_string())]);
                delivered += 1;
            } else {
                tokio::task::yield_now().await;
            }
        }
    })
    .await
    .expect("Draining the queue should issue more credit");
    drive(&mut listener, [ClientStep::HalfClose]);

    assert_eq!(closed_status(&call).await, Status::ok());
    assert_eq!(handle.await.unwrap(), Ok(()));
    assert_eq!(call.messages(), vec!["0,1,2,3,4,5".to_string()]);
    assert!(call.requested() <= TOTAL + CAPACITY);
}

#[tokio::test]
async fn test_bounded_queue_within_capacity() {
    let call = Arc::new(TestCall::new());
    let config = DriverConfig::testing();
    let driver = streaming_driver(Arc::clone(&call), Metadata::new(), &config, join_all);
    let (mut listener, handle) = driver.spawn();

    drive(
        &mut listener,
        ClientStep::messages_then_half_close((0..10).map(|i| i.to_string())),
    );

    assert_eq!(closed_status(&call).await, Status::ok());
    handle.await.unwrap().unwrap();
    assert_eq!(call.messages(), vec!["0,1,2,3,4,5,6,7,8,9".to_string()]);
}

// ----------------------------------------------------------------------------
// Termination
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_cancel_mid_stream() {
    let call = Arc::new(TestCall::new());
    let first_seen = Promise::new();
    let writer_seen = first_seen.clone();
    let driver = streaming_driver(
        Arc::clone(&call),
        Metadata::new(),
        &DriverConfig::default(),
        move |mut requests: RequestStream<String>, _metadata: Metadata, _call: Arc<TestCall>| async move {
            if let Some(first) = requests.next().await {
                writer_seen.complete(first?);
            }
            futures::future::pending::<()>().await;
            Ok::<(), Status>(())
        },
    );
    let (mut listener, handle) = driver.spawn();

    drive(&mut listener, [ClientStep::Message("a".to_string())]);
    let first = timeout(Duration::from_secs(1), first_seen.wait())
        .await
        .expect("Writer should see the first message");
    assert_eq!(first, "a");

    drive(&mut listener, [ClientStep::Cancel]);

    let status = closed_status(&call).await;
    assert_eq!(status.code(), Code::Cancelled);
    assert_eq!(handle.await.unwrap(), Ok(()));

    // Late deliveries after the call ended are dropped quietly
    drive(
        &mut listener,
        ClientStep::messages_then_half_close(["late".to_string()]),
    );
    assert_eq!(call.close_attempts(), 1);
}

#[tokio::test]
async fn test_listener_dropped_before_half_close() {
    let call = Arc::new(TestCall::new());
    let driver = streaming_driver(
        Arc::clone(&call),
        Metadata::new(),
        &DriverConfig::default(),
        join_all,
    );
    let (mut listener, handle) = driver.spawn();

    drive(&mut listener, [ClientStep::Message("a".to_string())]);
    drop(listener);

    let status = closed_status(&call).await;
    assert_eq!(status.code(), Code::Cancelled);
    assert_eq!(
        status.description(),
        Some("Call listener dropped before half-close")
    );
    assert_eq!(handle.await.unwrap(), Err(status));
    assert!(call.messages().is_empty());
}

#[tokio::test]
async fn test_writer_may_stop_reading_early() {
    let call = Arc::new(TestCall::new());
    let driver = streaming_driver(
        Arc::clone(&call),
        Metadata::new(),
        &DriverConfig::default(),
        |mut requests: RequestStream<String>, _metadata: Metadata, call: Arc<TestCall>| async move {
            if let Some(first) = requests.next().await {
                call.send_message(first?)?;
            }
            Ok::<(), Status>(())
        },
    );
    let (mut listener, handle) = driver.spawn();

    drive(
        &mut listener,
        ClientStep::messages_then_half_close(["a".to_string(), "b".to_string()]),
    );

    assert_eq!(closed_status(&call).await, Status::ok());
    handle.await.unwrap().unwrap();
    assert_eq!(call.messages(), vec!["a"]);

    // The stream was dropped with the writer; later deliveries are discarded
    drive(&mut listener, [ClientStep::Message("c".to_string())]);
    assert_eq!(call.close_attempts(), 1);
}

#[tokio::test]
async fn test_writer_error_closes_with_its_status() {
    let call = Arc::new(TestCall::new());
    let driver = streaming_driver(
        Arc::clone(&call),
        Metadata::new(),
        &DriverConfig::default(),
        |_requests: RequestStream<String>, _metadata: Metadata, _call: Arc<TestCall>| async move {
            Err::<(), _>(Status::invalid_argument("unsupported encoding"))
        },
    );
    let (mut listener, handle) = driver.spawn();

    drive(&mut listener, ClientStep::messages_then_half_close(["a".to_string()]));

    let status = closed_status(&call).await;
    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(status.description(), Some("unsupported encoding"));
    assert_eq!(handle.await.unwrap(), Err(status));
    assert_eq!(call.close_attempts(), 1);
}
