// Controller tests over the in-memory store; no cluster needed.

use std::time::Duration;

use o2ims_models::{
    ConditionStatus, O2imsSpec, REASON_ACTION_SUCCEEDED, TYPE_AVAILABLE,
    TYPE_DEGRADED,
};
use o2ims_operator::action::{ActionOutcome, HttpActionExecutor};
use o2ims_store::memory::MemoryResourceStore;
use std::sync::Arc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

mod common;
use common::{
    ControllerGuard, ScriptedAction, fast_config, is_available, is_degraded,
    test_id, wait_for_calls, wait_for_object,
};

fn transient() -> ActionOutcome {
    ActionOutcome::TransientFailure("connection refused".into())
}

fn success() -> ActionOutcome {
    ActionOutcome::Success("200 OK".into())
}

#[test_log::test(tokio::test)]
async fn reachable_endpoint_becomes_available() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(200).set_body_string("v1"))
        .expect(1)
        .mount(&server)
        .await;

    let store = MemoryResourceStore::new();
    let id = test_id("reachable");
    store
        .create(id.clone(), O2imsSpec::new(format!("{}/version", server.uri())))
        .await
        .unwrap();

    let action = Arc::new(HttpActionExecutor::new(256).unwrap());
    let ctrl = ControllerGuard::start(&store, action, fast_config(10, 1_000));

    let obj = wait_for_object(&store, &id, Duration::from_secs(5), is_available).await;
    let avail = obj.conditions.get(TYPE_AVAILABLE).unwrap();
    assert_eq!(avail.reason, REASON_ACTION_SUCCEEDED);
    assert!(obj.conditions.get(TYPE_DEGRADED).is_none());

    // Success is not requeued.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    ctrl.stop().await.unwrap();
}

#[test_log::test(tokio::test)]
async fn transient_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let store = MemoryResourceStore::new();
    let action = Arc::new(HttpActionExecutor::new(256).unwrap());
    let ctrl = ControllerGuard::start(&store, action, fast_config(20, 200));

    // Created after start: picked up from the change feed.
    let id = test_id("flaky");
    store
        .create(id.clone(), O2imsSpec::new(server.uri()))
        .await
        .unwrap();

    wait_for_object(&store, &id, Duration::from_secs(5), is_available).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
    ctrl.stop().await.unwrap();
}

#[test_log::test(tokio::test(start_paused = true))]
async fn retry_delays_double_per_failure() {
    let store = MemoryResourceStore::new();
    let id = test_id("backoff");
    store
        .create(id.clone(), O2imsSpec::new("http://unused"))
        .await
        .unwrap();
    let action = ScriptedAction::new(vec![transient(), transient(), transient()], success());
    let ctrl = ControllerGuard::start(&store, action.clone(), fast_config(1_000, 60_000));

    wait_for_object(&store, &id, Duration::from_secs(60), is_available).await;
    let times = action.call_times();
    assert_eq!(times.len(), 4);
    let tolerance = Duration::from_millis(50);
    for (i, expected) in [1_000u64, 2_000, 4_000].into_iter().enumerate() {
        let gap = times[i + 1] - times[i];
        let expected = Duration::from_millis(expected);
        assert!(
            gap >= expected && gap < expected + tolerance,
            "gap {i} was {gap:?}, expected {expected:?}"
        );
    }
    ctrl.stop().await.unwrap();
}

#[test_log::test(tokio::test(start_paused = true))]
async fn retry_delay_is_capped() {
    let store = MemoryResourceStore::new();
    let id = test_id("capped");
    store
        .create(id.clone(), O2imsSpec::new("http://unused"))
        .await
        .unwrap();
    let action = ScriptedAction::new(vec![], transient());
    let ctrl = ControllerGuard::start(&store, action.clone(), fast_config(1_000, 3_000));

    wait_for_calls(&action, 5, Duration::from_secs(60)).await;
    let times = action.call_times();
    // 1s, 2s, then capped at 3s
    let gap = times[4] - times[3];
    assert!(gap >= Duration::from_secs(3) && gap < Duration::from_millis(3_050), "{gap:?}");
    ctrl.stop().await.unwrap();
}

#[test_log::test(tokio::test(start_paused = true))]
async fn permanent_failure_waits_for_a_spec_change() {
    let store = MemoryResourceStore::new();
    let id = test_id("degraded");
    store
        .create(id.clone(), O2imsSpec::new("http://old"))
        .await
        .unwrap();
    let action = ScriptedAction::new(
        vec![ActionOutcome::PermanentFailure("404 Not Found".into())],
        success(),
    );
    let ctrl = ControllerGuard::start(&store, action.clone(), fast_config(100, 1_000));

    wait_for_object(&store, &id, Duration::from_secs(10), is_degraded).await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(action.call_count(), 1, "permanent failure must not be retried");

    store.update_spec(&id, O2imsSpec::new("http://new")).await.unwrap();
    let obj = wait_for_object(&store, &id, Duration::from_secs(10), is_available).await;
    assert!(obj.conditions.is_status(TYPE_DEGRADED, ConditionStatus::False));
    assert_eq!(action.urls(), vec!["http://old".to_string(), "http://new".to_string()]);
    ctrl.stop().await.unwrap();
}

#[test_log::test(tokio::test(start_paused = true))]
async fn spec_change_resets_backoff() {
    let store = MemoryResourceStore::new();
    let id = test_id("reset");
    store
        .create(id.clone(), O2imsSpec::new("http://down"))
        .await
        .unwrap();
    let action = ScriptedAction::new(vec![], transient());
    let ctrl = ControllerGuard::start(&store, action.clone(), fast_config(1_000, 600_000));

    // Delays so far: 1s, 2s, 4s, 8s; the next wait is 16s.
    wait_for_calls(&action, 5, Duration::from_secs(60)).await;
    action.set_fallback(success());
    let changed_at = tokio::time::Instant::now();
    store.update_spec(&id, O2imsSpec::new("http://up")).await.unwrap();

    wait_for_object(&store, &id, Duration::from_secs(60), is_available).await;
    let last = *action.call_times().last().unwrap();
    assert!(last - changed_at < Duration::from_secs(1), "waited {:?}", last - changed_at);
    ctrl.stop().await.unwrap();
}

#[test_log::test(tokio::test(start_paused = true))]
async fn deletion_request_stops_retries() {
    let store = MemoryResourceStore::new();
    let id = test_id("deleting");
    store
        .create(id.clone(), O2imsSpec::new("http://down"))
        .await
        .unwrap();
    let action = ScriptedAction::new(vec![], transient());
    let ctrl = ControllerGuard::start(&store, action.clone(), fast_config(1_000, 60_000));

    wait_for_calls(&action, 2, Duration::from_secs(60)).await;
    store.request_deletion(&id).await.unwrap();
    let seen = action.call_count();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(action.call_count(), seen);

    store.remove(&id).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(action.call_count(), seen);
    ctrl.stop().await.unwrap();
}

#[test_log::test(tokio::test(start_paused = true))]
async fn objects_are_reconciled_independently() {
    let store = MemoryResourceStore::new();
    for name in ["a", "b", "c"] {
        store
            .create(test_id(name), O2imsSpec::new(format!("http://{name}")))
            .await
            .unwrap();
    }
    let action = ScriptedAction::new(vec![], success());
    let ctrl = ControllerGuard::start(&store, action.clone(), fast_config(100, 1_000));

    for name in ["a", "b", "c"] {
        wait_for_object(&store, &test_id(name), Duration::from_secs(10), is_available).await;
    }
    let mut urls = action.urls();
    urls.sort();
    assert_eq!(urls, vec!["http://a", "http://b", "http://c"]);
    ctrl.stop().await.unwrap();
}

#[test_log::test(tokio::test(start_paused = true))]
async fn shutdown_stops_pending_retries() {
    let store = MemoryResourceStore::new();
    let id = test_id("shutdown");
    store
        .create(id.clone(), O2imsSpec::new("http://down"))
        .await
        .unwrap();
    let action = ScriptedAction::new(vec![], transient());
    let ctrl = ControllerGuard::start(&store, action.clone(), fast_config(1_000, 60_000));

    wait_for_calls(&action, 1, Duration::from_secs(10)).await;
    tokio::time::timeout(Duration::from_secs(5), ctrl.stop())
        .await
        .expect("controller stops promptly")
        .unwrap();

    let seen = action.call_count();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(action.call_count(), seen);
}
