//! Integration tests for `GatewayAdapter` against an in-test gateway.
//!
//! Cover the success path, script errors reported by the interpreter,
//! unreachable and hanging gateways, the single retry after a dropped
//! connection and the bound on concurrent calls.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use common::{FakeGateway, Reply};
use pvscript_core::scripting::{ExecutableUnit, ScriptBindings, SubmissionContext, Trigger};
use pvscript_core::value::LiveValue;
use pvscript_core::widget::MemoryWidget;
use pvscript_events::{EventBus, ScriptEventKind};
use pvscript_gateway::{GatewayAdapter, GatewayConfig, GatewayError, InvokeRequest, InvokeResponse, ResponseStatus};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn config(url: &str) -> GatewayConfig {
    GatewayConfig {
        call_timeout: Duration::from_millis(1500),
        ..GatewayConfig::default().with_url(url)
    }
}

fn request(value: i64) -> InvokeRequest {
    let unit = ExecutableUnit::gateway("/opt/scripts/scale.py", vec!["x".into()]);
    let widget = Arc::new(MemoryWidget::new("Label 100", "label"));
    let ctx = SubmissionContext::new(widget, vec![LiveValue::new("sim://x", value)], Trigger::Input(0));
    let bindings = ScriptBindings::bind(&unit, ctx, CancellationToken::new());
    InvokeRequest::from_bindings(unit.source(), &bindings)
}

/// Doubles the `x` binding and asks for a text update.
fn doubling(req: &InvokeRequest, _n: usize) -> Reply {
    let x = req.bindings[0].value.as_i64().unwrap_or_default();
    Reply::Send(InvokeResponse::ok(req, Some(json!(x * 2))).with_update("text", format!("{}", x * 2)))
}

// ---------------------------------------------------------------------------
// Test: successful call returns value and property updates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invoke_returns_value_and_updates() {
    let gateway = FakeGateway::start(doubling).await;
    let adapter = GatewayAdapter::new(config(&gateway.url), None);

    let response = adapter.invoke(&request(21)).await.expect("invoke");

    assert_eq!(response.status, ResponseStatus::Ok);
    assert_eq!(response.value, Some(json!(42)));
    assert_eq!(response.updates[0].property, "text");
    assert_eq!(response.updates[0].value, json!("42"));
    assert_eq!(gateway.calls(), 1);
}

// ---------------------------------------------------------------------------
// Test: connections are reused across calls
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sequential_calls_reuse_connection() {
    let gateway = FakeGateway::start(doubling).await;
    let adapter = GatewayAdapter::new(config(&gateway.url), None);

    for x in 0..5 {
        let response = adapter.invoke(&request(x)).await.expect("invoke");
        assert_eq!(response.value, Some(json!(x * 2)));
    }

    assert_eq!(gateway.calls(), 5);
    assert_eq!(gateway.connections(), 1);
}

// ---------------------------------------------------------------------------
// Test: script errors come back as a normal response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn script_error_is_not_a_transport_error() {
    let gateway = FakeGateway::start(|req, _| {
        Reply::Send(InvokeResponse::error(req, "ZeroDivisionError: division by zero"))
    })
    .await;
    let adapter = GatewayAdapter::new(config(&gateway.url), None);

    let response = adapter.invoke(&request(0)).await.expect("invoke");

    assert_eq!(response.status, ResponseStatus::Error);
    assert_eq!(response.error.as_deref(), Some("ZeroDivisionError: division by zero"));
    assert_eq!(gateway.calls(), 1);
}

// ---------------------------------------------------------------------------
// Test: unreachable gateway fails within the timeout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_gateway_fails_fast() {
    let adapter = GatewayAdapter::new(config("ws://127.0.0.1:1"), None);

    let start = Instant::now();
    let err = adapter.invoke(&request(1)).await.expect_err("should fail");

    assert_matches!(err, GatewayError::Connection(_));
    assert!(start.elapsed() < Duration::from_millis(1500));
}

// ---------------------------------------------------------------------------
// Test: a hanging gateway surfaces as a timeout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hanging_gateway_times_out() {
    let gateway = FakeGateway::start(|_, _| Reply::Hang).await;
    let adapter = GatewayAdapter::new(
        GatewayConfig {
            call_timeout: Duration::from_millis(200),
            ..config(&gateway.url)
        },
        None,
    );

    let start = Instant::now();
    let err = adapter.invoke(&request(1)).await.expect_err("should time out");

    assert_matches!(err, GatewayError::Timeout { elapsed_ms } if elapsed_ms >= 200);
    assert!(start.elapsed() < Duration::from_secs(1));
    // The abandoned connection is not counted any more.
    assert_eq!(adapter.pool().connected(), 0);
}

// ---------------------------------------------------------------------------
// Test: a dropped connection is retried exactly once
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dropped_connection_is_retried_once() {
    let gateway = FakeGateway::start(|req, n| {
        if n == 0 {
            Reply::Hangup
        } else {
            doubling(req, n)
        }
    })
    .await;
    let adapter = GatewayAdapter::new(config(&gateway.url), None);

    let response = adapter.invoke(&request(4)).await.expect("retry succeeds");

    assert_eq!(response.value, Some(json!(8)));
    assert_eq!(gateway.calls(), 2);
    assert_eq!(gateway.connections(), 2);
    assert_eq!(adapter.pool().connected(), 1);
}

#[tokio::test]
async fn persistent_failure_surfaces_after_one_retry() {
    let gateway = FakeGateway::start(|_, _| Reply::Hangup).await;
    let adapter = GatewayAdapter::new(config(&gateway.url), None);

    let err = adapter.invoke(&request(4)).await.expect_err("should fail");

    assert_matches!(err, GatewayError::Connection(_));
    assert_eq!(gateway.calls(), 2);
    assert_eq!(adapter.pool().connected(), 0);
}

// ---------------------------------------------------------------------------
// Test: malformed responses are protocol errors and not retried
// ---------------------------------------------------------------------------

#[tokio::test]
async fn foreign_call_id_is_protocol_error() {
    let gateway = FakeGateway::start(|req, _| {
        let mut response = InvokeResponse::ok(req, None);
        response.call_id = uuid::Uuid::new_v4();
        Reply::Send(response)
    })
    .await;
    let adapter = GatewayAdapter::new(config(&gateway.url), None);

    let err = adapter.invoke(&request(1)).await.expect_err("should fail");

    assert_matches!(err, GatewayError::Protocol(_));
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test]
async fn garbage_frame_is_protocol_error() {
    let gateway = FakeGateway::start(|_, _| Reply::Raw("{\"type\":\"result\"".into())).await;
    let adapter = GatewayAdapter::new(config(&gateway.url), None);

    assert_matches!(adapter.invoke(&request(1)).await, Err(GatewayError::Protocol(_)));
}

// ---------------------------------------------------------------------------
// Test: the pool bounds concurrent calls
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_size_bounds_concurrency() {
    let gateway = FakeGateway::start(|req, _| {
        Reply::Delayed(Duration::from_millis(50), InvokeResponse::ok(req, None))
    })
    .await;
    let adapter = Arc::new(GatewayAdapter::new(
        GatewayConfig {
            pool_size: 2,
            ..config(&gateway.url)
        },
        None,
    ));

    let calls: Vec<_> = (0..8)
        .map(|x| {
            let adapter = Arc::clone(&adapter);
            tokio::spawn(async move { adapter.invoke(&request(x)).await })
        })
        .collect();
    for call in calls {
        call.await.expect("join").expect("invoke");
    }

    assert_eq!(gateway.calls(), 8);
    assert!(gateway.peak_in_flight() <= 2);
    assert!(gateway.connections() <= 2);
}

// ---------------------------------------------------------------------------
// Test: connectivity events and close
// ---------------------------------------------------------------------------

#[tokio::test]
async fn publishes_connectivity_events() {
    let gateway = FakeGateway::start(|req, n| {
        if n == 0 {
            doubling(req, n)
        } else {
            Reply::Hangup
        }
    })
    .await;
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let adapter = GatewayAdapter::new(config(&gateway.url), Some(Arc::clone(&bus)));

    adapter.invoke(&request(1)).await.expect("first call");
    let _ = adapter.invoke(&request(2)).await;

    let first = rx.recv().await.expect("connected event");
    assert_eq!(first.kind, ScriptEventKind::GatewayConnected);
    assert_eq!(first.source.as_deref(), Some(gateway.url.as_str()));

    let second = rx.recv().await.expect("disconnected event");
    assert_eq!(second.kind, ScriptEventKind::GatewayDisconnected);
    assert!(second.transport);
}

#[tokio::test]
async fn closed_adapter_rejects_calls() {
    let gateway = FakeGateway::start(doubling).await;
    let adapter = GatewayAdapter::new(config(&gateway.url), None);
    adapter.invoke(&request(1)).await.expect("invoke");

    adapter.close().await;

    assert_matches!(adapter.invoke(&request(1)).await, Err(GatewayError::Closed));
}
