// crates/hit-dispatch-engine/tests/engine.rs
// ============================================================================
// Module: Dispatch Engine Tests
// Description: Scheduling, throttling, and outcome classification tests.
// Purpose: Validate queueing, flushing, and in-flight bookkeeping.
// Dependencies: hit-dispatch-core, hit-dispatch-engine, tokio
// ============================================================================

//! ## Overview
//! Drives [`hit_dispatch_engine::DispatchEngine`] against a scripted transport
//! and checks which requests are made and which outcomes are reported.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use hit_dispatch_core::DispatchSettings;
use hit_dispatch_core::HitOutcome;
use hit_dispatch_core::HttpMethod;
use hit_dispatch_core::ThrottleSettings;
use hit_dispatch_core::TransportError;
use hit_dispatch_engine::DispatchEngine;
use hit_dispatch_engine::EngineError;

use crate::common::ManualClock;
use crate::common::MockTransport;
use crate::common::RecordingObserver;
use crate::common::TickingClock;
use crate::common::event_params;
use crate::common::outcome_label;
use crate::common::wait_until;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Settings that keep hits queued until an explicit flush.
fn queued_settings() -> DispatchSettings {
    DispatchSettings {
        dispatch_period: Duration::from_secs(3_600),
        ..DispatchSettings::default()
    }
}

/// Builds an engine over `transport` with a recording observer attached.
fn engine_with(
    transport: &Arc<MockTransport>,
    settings: DispatchSettings,
) -> (DispatchEngine, Arc<RecordingObserver>) {
    let engine = DispatchEngine::builder()
        .shared_transport(transport.clone())
        .settings(settings)
        .build()
        .unwrap();
    let observer = RecordingObserver::new();
    engine.add_observer(observer.clone());
    (engine, observer)
}

// ============================================================================
// SECTION: Construction
// ============================================================================

/// Tests build fails without a transport.
#[tokio::test]
async fn build_requires_transport() {
    let result = DispatchEngine::builder().build();
    assert!(matches!(result, Err(EngineError::MissingTransport)));
}

/// Tests build fails outside a runtime when no handle is supplied.
#[test]
fn build_requires_runtime() {
    let result = DispatchEngine::builder().shared_transport(MockTransport::ok()).build();
    assert!(matches!(result, Err(EngineError::NoRuntime)));
}

/// Tests build with an explicit runtime handle outside runtime context.
#[test]
fn build_accepts_explicit_runtime() {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
    let transport = MockTransport::ok();
    let engine = DispatchEngine::builder()
        .shared_transport(transport.clone())
        .runtime(runtime.handle().clone())
        .build()
        .unwrap();
    engine.enqueue_params(event_params(0));
    runtime.block_on(engine.flush());
    assert_eq!(transport.request_count(), 1);
}

/// Tests invalid throttle settings are rejected.
#[tokio::test]
async fn build_rejects_invalid_throttle() {
    let result = DispatchEngine::builder()
        .shared_transport(MockTransport::ok())
        .throttle(ThrottleSettings {
            capacity: 0.0,
            fill_rate: 1.0,
        })
        .build();
    assert!(matches!(result, Err(EngineError::Throttle(_))));
}

// ============================================================================
// SECTION: Immediate Dispatch
// ============================================================================

/// Tests each hit is sent once with one outcome when the period is zero.
#[tokio::test]
async fn zero_period_sends_every_hit_once() {
    let transport = MockTransport::ok();
    let (engine, observer) = engine_with(&transport, DispatchSettings::default());
    for index in 0 .. 5 {
        engine.enqueue_params(event_params(index));
    }
    assert_eq!(engine.queue_len(), 0);
    engine.flush().await;
    assert_eq!(transport.request_count(), 5);
    assert_eq!(observer.len(), 5);
    assert!(observer.outcomes().iter().all(HitOutcome::is_sent));
    assert_eq!(engine.in_flight(), 0);
}

/// Tests immediate sends carry no queue time.
#[tokio::test]
async fn immediate_sends_omit_queue_time() {
    let transport = MockTransport::ok();
    let (engine, _observer) = engine_with(&transport, DispatchSettings::default());
    engine.enqueue_params(event_params(0));
    engine.flush().await;
    let request = &transport.requests()[0];
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.url, "https://ssl.google-analytics.com/collect");
    assert!(request.payload.starts_with("t=event&ec=test&ea=tap&el=hit-0"));
    assert!(!request.payload.contains("qt="));
    assert!(!request.payload.contains("z="));
}

/// Tests request shape follows endpoint, method, cache, and agent settings.
#[tokio::test]
async fn settings_shape_the_request() {
    let transport = MockTransport::ok();
    let settings = DispatchSettings {
        secure: false,
        debug_endpoint: true,
        use_http_post: false,
        bust_cache: true,
        user_agent: Some("agent/1.0".to_string()),
        ..DispatchSettings::default()
    };
    let (engine, _observer) = engine_with(&transport, settings);
    engine.enqueue_params(event_params(0));
    engine.flush().await;
    let request = &transport.requests()[0];
    assert_eq!(request.method, HttpMethod::Get);
    assert!(request.url.starts_with("http://www.google-analytics.com/debug/collect?t=event"));
    assert!(request.url.contains("&z="));
    assert_eq!(request.user_agent.as_deref(), Some("agent/1.0"));
}

// ============================================================================
// SECTION: Queued Dispatch
// ============================================================================

/// Tests a non-zero period keeps hits queued until a flush.
#[tokio::test]
async fn non_zero_period_queues_until_flush() {
    let transport = MockTransport::ok();
    let (engine, observer) = engine_with(&transport, queued_settings());
    for index in 0 .. 3 {
        engine.enqueue_params(event_params(index));
    }
    assert_eq!(engine.queue_len(), 3);
    assert_eq!(transport.request_count(), 0);
    engine.flush().await;
    assert_eq!(engine.queue_len(), 0);
    let labels: Vec<String> = observer.outcomes().iter().map(outcome_label).collect();
    assert_eq!(labels, vec!["hit-0", "hit-1", "hit-2"]);
    assert!(transport.requests().iter().all(|request| request.payload.contains("&qt=")));
}

/// Tests queue time measures milliseconds since capture.
#[tokio::test]
async fn queued_hits_report_queue_time() {
    let transport = MockTransport::ok();
    let clock = ManualClock::new();
    let engine = DispatchEngine::builder()
        .shared_transport(transport.clone())
        .settings(queued_settings())
        .clock(clock.clone())
        .build()
        .unwrap();
    engine.enqueue_params(event_params(0));
    clock.advance(time::Duration::milliseconds(1_500));
    engine.flush().await;
    assert!(transport.requests()[0].payload.ends_with("&qt=1500"));
}

/// Tests a disabled engine queues hits and ignores flushes.
#[tokio::test]
async fn disabled_engine_keeps_hits_queued() {
    let transport = MockTransport::ok();
    let settings = DispatchSettings {
        enabled: false,
        ..DispatchSettings::default()
    };
    let (engine, observer) = engine_with(&transport, settings);
    engine.enqueue_params(event_params(0));
    engine.enqueue_params(event_params(1));
    engine.flush().await;
    assert_eq!(engine.queue_len(), 2);
    assert_eq!(transport.request_count(), 0);
    assert_eq!(observer.len(), 0);
}

/// Tests enabling the engine flushes queued hits in the background.
#[tokio::test]
async fn enabling_flushes_in_background() {
    let transport = MockTransport::ok();
    let settings = DispatchSettings {
        enabled: false,
        ..DispatchSettings::default()
    };
    let (engine, observer) = engine_with(&transport, settings);
    engine.enqueue_params(event_params(0));
    engine.enqueue_params(event_params(1));
    engine.set_enabled(true);
    observer.wait_for(2).await;
    assert_eq!(engine.queue_len(), 0);
    assert_eq!(transport.request_count(), 2);
}

/// Tests disabling keeps queued hits.
#[tokio::test]
async fn disabling_keeps_queued_hits() {
    let transport = MockTransport::ok();
    let (engine, _observer) = engine_with(&transport, queued_settings());
    engine.enqueue_params(event_params(0));
    engine.set_enabled(false);
    assert!(!engine.is_enabled());
    engine.flush().await;
    assert_eq!(engine.queue_len(), 1);
}

/// Tests clear removes queued hits silently.
#[tokio::test]
async fn clear_discards_without_notifications() {
    let transport = MockTransport::ok();
    let (engine, observer) = engine_with(&transport, queued_settings());
    for index in 0 .. 4 {
        engine.enqueue_params(event_params(index));
    }
    engine.clear();
    engine.flush().await;
    assert_eq!(engine.queue_len(), 0);
    assert_eq!(transport.request_count(), 0);
    assert_eq!(observer.len(), 0);
}

// ============================================================================
// SECTION: Outcome Classification
// ============================================================================

/// Tests a server error is reported as malformed and not requeued.
#[tokio::test]
async fn server_error_is_malformed_and_dropped() {
    let transport = MockTransport::status(500);
    let (engine, observer) = engine_with(&transport, queued_settings());
    engine.enqueue_params(event_params(0));
    engine.flush().await;
    assert_eq!(engine.queue_len(), 0);
    match &observer.outcomes()[0] {
        HitOutcome::Malformed(malformed) => assert_eq!(malformed.status_code, 500),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

/// Tests transport errors are reported as failed.
#[tokio::test]
async fn transport_error_is_failed() {
    let transport = MockTransport::failing(TransportError::Timeout);
    let (engine, observer) = engine_with(&transport, DispatchSettings::default());
    engine.enqueue_params(event_params(0));
    engine.flush().await;
    match &observer.outcomes()[0] {
        HitOutcome::Failed(failed) => assert_eq!(failed.error, "request timed out"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

/// Tests successful outcomes carry the response body.
#[tokio::test]
async fn sent_outcome_carries_response_body() {
    let transport = MockTransport::ok();
    transport.push(Ok(common::response(204, "validated")));
    let (engine, observer) = engine_with(&transport, DispatchSettings::default());
    engine.enqueue_params(event_params(0));
    engine.flush().await;
    match &observer.outcomes()[0] {
        HitOutcome::Sent(sent) => assert_eq!(sent.response_body, "validated"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

// ============================================================================
// SECTION: Throttling
// ============================================================================

/// Tests throttled hits are requeued without an outcome and sent once later.
#[tokio::test]
async fn throttled_hits_are_requeued() {
    let transport = MockTransport::ok();
    let clock = TickingClock::new();
    let settings = DispatchSettings {
        throttling_enabled: true,
        ..queued_settings()
    };
    let engine = DispatchEngine::builder()
        .shared_transport(transport.clone())
        .settings(settings)
        .throttle(ThrottleSettings {
            capacity: 2.0,
            fill_rate: 0.5,
        })
        .clock(clock.clone())
        .build()
        .unwrap();
    let observer = RecordingObserver::new();
    engine.add_observer(observer.clone());
    for index in 0 .. 3 {
        engine.enqueue_params(event_params(index));
    }
    engine.flush().await;
    let labels: Vec<String> = observer.outcomes().iter().map(outcome_label).collect();
    assert_eq!(labels, vec!["hit-0", "hit-1"]);
    assert_eq!(engine.queue_len(), 1);
    assert_eq!(transport.request_count(), 2);

    engine.flush().await;
    assert_eq!(engine.queue_len(), 1);
    assert_eq!(transport.request_count(), 2);

    clock.advance(4_000);
    engine.flush().await;
    let labels: Vec<String> = observer.outcomes().iter().map(outcome_label).collect();
    assert_eq!(labels, vec!["hit-0", "hit-1", "hit-2"]);
    assert_eq!(engine.queue_len(), 0);
    assert_eq!(transport.request_count(), 3);

    engine.flush().await;
    assert_eq!(transport.request_count(), 3);
}

/// Tests throttling does not apply when disabled.
#[tokio::test]
async fn throttling_off_ignores_bucket() {
    let transport = MockTransport::ok();
    let engine = DispatchEngine::builder()
        .shared_transport(transport.clone())
        .settings(queued_settings())
        .throttle(ThrottleSettings {
            capacity: 1.0,
            fill_rate: 0.0,
        })
        .build()
        .unwrap();
    for index in 0 .. 4 {
        engine.enqueue_params(event_params(index));
    }
    engine.flush().await;
    assert_eq!(transport.request_count(), 4);
    assert_eq!(engine.queue_len(), 0);
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

/// Tests overlapping flushes never send a hit twice.
#[tokio::test]
async fn concurrent_flushes_never_duplicate_hits() {
    let (transport, gate) = MockTransport::gated();
    let (engine, observer) = engine_with(&transport, queued_settings());
    for index in 0 .. 10 {
        engine.enqueue_params(event_params(index));
    }
    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.flush().await }
    });
    wait_until(|| transport.request_count() == 1).await;
    let second = tokio::spawn({
        let engine = engine.clone();
        async move { engine.flush().await }
    });
    for index in 10 .. 15 {
        engine.enqueue_params(event_params(index));
    }
    for _ in 0 .. 10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(engine.queue_len(), 5);
    gate.add_permits(100);
    first.await.unwrap();
    second.await.unwrap();
    assert_eq!(transport.request_count(), 15);
    let labels: BTreeSet<String> = observer.outcomes().iter().map(outcome_label).collect();
    assert_eq!(labels.len(), 15);
    assert_eq!(engine.queue_len(), 0);
}

/// Tests a flush waits for immediate sends already in flight.
#[tokio::test]
async fn flush_waits_for_in_flight_sends() {
    let (transport, gate) = MockTransport::gated();
    let (engine, observer) = engine_with(&transport, DispatchSettings::default());
    engine.enqueue_params(event_params(0));
    engine.enqueue_params(event_params(1));
    assert_eq!(engine.in_flight(), 2);
    let flusher = tokio::spawn({
        let engine = engine.clone();
        async move { engine.flush().await }
    });
    wait_until(|| transport.request_count() == 2).await;
    assert!(!flusher.is_finished());
    gate.add_permits(2);
    flusher.await.unwrap();
    assert_eq!(observer.len(), 2);
    assert_eq!(engine.in_flight(), 0);
}

/// Tests a batch keeps running when the awaiting caller is dropped.
#[tokio::test]
async fn dropped_caller_does_not_cancel_batch() {
    let (transport, gate) = MockTransport::gated();
    let (engine, observer) = engine_with(&transport, queued_settings());
    for index in 0 .. 3 {
        engine.enqueue_params(event_params(index));
    }
    let flusher = tokio::spawn({
        let engine = engine.clone();
        async move { engine.flush().await }
    });
    wait_until(|| transport.request_count() == 1).await;
    flusher.abort();
    let _ = flusher.await;
    assert_eq!(engine.in_flight(), 1);
    gate.add_permits(10);
    engine.flush().await;
    assert_eq!(transport.request_count(), 3);
    assert_eq!(observer.len(), 3);
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Tests setters update the settings snapshot.
#[tokio::test]
async fn setters_update_settings() {
    let transport = MockTransport::ok();
    let (engine, _observer) = engine_with(&transport, DispatchSettings::default());
    engine.set_secure(false);
    engine.set_debug_endpoint(true);
    engine.set_throttling_enabled(true);
    engine.set_use_http_post(false);
    engine.set_bust_cache(true);
    engine.set_user_agent(Some("ua".to_string()));
    let settings = engine.settings();
    assert!(!settings.secure);
    assert!(settings.debug_endpoint);
    assert!(settings.throttling_enabled);
    assert!(!settings.use_http_post);
    assert!(settings.bust_cache);
    assert_eq!(settings.user_agent.as_deref(), Some("ua"));
}
