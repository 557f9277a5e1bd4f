//! Concurrency tests: shared leases during generation, exclusive leases for
//! load/unload, load de-duplication and timeouts.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{wait_for_state, ScriptedLoader, TestHarness};
use gitca::{FailureKind, LoadError, SessionState};

const REPLY: &str = "fix(session): keep handle alive";
const DIFF: &str = "diff --git a/src/session/mod.rs b/src/session/mod.rs\n";

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_generates_share_one_handle() {
    let harness = TestHarness::new();
    let loader = ScriptedLoader::new(REPLY).infer_delay(Duration::from_millis(100));
    let probe = loader.probe();
    let session = harness.session(&harness.config_with(4, 16_000), loader);
    session.load(harness.write_model("m.gguf")).await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move { session.generate(DIFF).await })
        })
        .collect();

    for task in tasks {
        let result = task.await.unwrap();
        assert_eq!(result.text(), Some(REPLY));
    }

    assert_eq!(probe.calls(), 8);
    assert!(probe.max_active() <= 4);
    assert!(probe.max_active() >= 2);
    assert_eq!(probe.loads(), 1);
    assert!(!probe.dropped_while_active());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn default_concurrency_serializes_inference() {
    let harness = TestHarness::new();
    let loader = ScriptedLoader::new(REPLY).infer_delay(Duration::from_millis(20));
    let probe = loader.probe();
    let session = harness.session(&harness.config(), loader);
    session.load(harness.write_model("m.gguf")).await.unwrap();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move { session.generate(DIFF).await })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().is_success());
    }
    assert_eq!(probe.max_active(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn second_load_while_loading_is_rejected() {
    let harness = TestHarness::new();
    let loader = ScriptedLoader::new(REPLY).load_delay(Duration::from_millis(300));
    let probe = loader.probe();
    let session = harness.session(&harness.config(), loader);
    let first = harness.write_model("first.gguf");
    let second = harness.write_model("second.gguf");

    let loading = {
        let session = session.clone();
        tokio::spawn(async move { session.load(first).await })
    };

    assert!(wait_for_state(&session, SessionState::Loading, Duration::from_secs(2)).await);

    assert_eq!(session.load(&second).await, Err(LoadError::AlreadyLoading));

    let result = session.generate(DIFF).await;
    assert_eq!(result.failure_kind(), Some(FailureKind::ModelNotLoaded));

    loading.await.unwrap().unwrap();
    assert_eq!(session.state().await, SessionState::Ready);
    assert_eq!(probe.loads(), 1);

    // the loading flag is released once the first load settles
    session.load(&second).await.unwrap();
    assert_eq!(probe.loads(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn abandoned_load_settles_while_readers_hold_the_slot() {
    let harness = TestHarness::new();
    let loader = ScriptedLoader::new(REPLY).load_delay(Duration::from_millis(300));
    let session = harness.session(&harness.config(), loader);
    let model = harness.write_model("m.gguf");

    let stop = Arc::new(AtomicBool::new(false));
    let reader = {
        let session = session.clone();
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            while !stop.load(Ordering::Relaxed) {
                let _ = session.snapshot().await;
                tokio::task::yield_now().await;
            }
        })
    };

    let abandoned = tokio::time::timeout(Duration::from_millis(20), session.load(&model)).await;
    assert!(abandoned.is_err());

    assert!(wait_for_state(&session, SessionState::Unloaded, Duration::from_secs(2)).await);
    stop.store(true, Ordering::Relaxed);
    reader.await.unwrap();

    assert_eq!(session.reload().await, Ok(false));
    session.load(&model).await.unwrap();
    assert_eq!(session.state().await, SessionState::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unload_waits_for_in_flight_generation() {
    let harness = TestHarness::new();
    let loader = ScriptedLoader::new(REPLY).infer_delay(Duration::from_millis(300));
    let probe = loader.probe();
    let session = harness.session(&harness.config(), loader);
    session.load(harness.write_model("m.gguf")).await.unwrap();

    let generating = {
        let session = session.clone();
        tokio::spawn(async move { session.generate(DIFF).await })
    };
    assert!(probe.wait_for(Duration::from_secs(2), |p| p.active() == 1).await);

    session.unload().await.unwrap();

    // the exclusive lease was only granted after the generation finished
    assert_eq!(probe.active(), 0);
    assert_eq!(probe.engines_dropped(), 1);
    assert!(!probe.dropped_while_active());

    let result = generating.await.unwrap();
    assert_eq!(result.text(), Some(REPLY));
    assert_eq!(session.state().await, SessionState::Unloaded);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn timeout_fails_request_and_keeps_model_ready() {
    let harness = TestHarness::new();
    let loader = ScriptedLoader::new(REPLY).infer_delay(Duration::from_secs(10));
    let probe = loader.probe();
    let session =
        harness.session_with_timeout(&harness.config(), loader, Duration::from_millis(100));
    session.load(harness.write_model("m.gguf")).await.unwrap();

    let result = session.generate(DIFF).await;
    assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
    assert_eq!(session.state().await, SessionState::Ready);

    // the abandoned inference observes the cancel flag and stops
    assert!(probe.wait_for(Duration::from_secs(2), |p| p.cancelled() == 1).await);
    assert!(probe.wait_for(Duration::from_secs(2), |p| p.active() == 0).await);

    session.unload().await.unwrap();
    assert!(!probe.dropped_while_active());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queued_generation_times_out_while_waiting_for_permit() {
    let harness = TestHarness::new();
    let loader = ScriptedLoader::new(REPLY).infer_delay(Duration::from_millis(400));
    let probe = loader.probe();
    let session =
        harness.session_with_timeout(&harness.config(), loader, Duration::from_millis(200));
    session.load(harness.write_model("m.gguf")).await.unwrap();

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.generate(DIFF).await })
    };
    assert!(probe.wait_for(Duration::from_secs(2), |p| p.active() == 1).await);

    let second = session.generate(DIFF).await;
    assert_eq!(second.failure_kind(), Some(FailureKind::Timeout));

    let first = first.await.unwrap();
    assert_eq!(first.failure_kind(), Some(FailureKind::Timeout));
    assert!(probe.wait_for(Duration::from_secs(2), |p| p.active() == 0).await);
}
