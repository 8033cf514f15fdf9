//! Loop and registry behaviour against a mocked marketplace.

use std::sync::Arc;
use std::time::Duration;

use bagwatch_core::{Origin, Target};
use bagwatch_market::{Account, AuthState};
use bagwatch_store::{AppSettings, UserConfig, UserStore};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::notify::RecordingNotifier;
use crate::registry::{StartOutcome, TargetChange, WatchRegistry};
use crate::scheduler::{LoopControl, StopReason, TickOutcome, UserWatch, run_watch_loop};

// ============================================================================
// Helpers
// ============================================================================

const FAVORITES: &str = "/api/item/v7/";
const REFRESH: &str = "/api/auth/v3/token/refresh";

fn settings(server: &MockServer) -> AppSettings {
    AppSettings {
        base_url: format!("{}/api/", server.uri()),
        default_watch_interval_secs: 0.02,
        jitter: 0.0,
        auth_poll_attempts: 1,
        auth_poll_delay_secs: 0,
        ..Default::default()
    }
}

fn seed(config: &mut UserConfig, targets: Vec<Target>) {
    config.credentials.email = Some("alice@example.com".into());
    config.origin = Origin::new(52.52, 13.405);
    config.session.set_tokens("a1".into(), "r1".into());
    config.session.user_id = Some("998877".into());
    config.targets = targets.into_iter().collect();
}

async fn seeded_store(dir: &TempDir, user: &str, targets: Vec<Target>) -> UserStore {
    let mut store = UserStore::open(dir.path(), user).await.unwrap();
    store
        .update(|c| seed(c, targets))
        .await
        .unwrap();
    store
}

async fn watch(
    server: &MockServer,
    dir: &TempDir,
    targets: Vec<Target>,
) -> (UserWatch, Arc<RecordingNotifier>) {
    let store = seeded_store(dir, "alice", targets).await;
    let settings = settings(server);
    let account = Account::new(store, &settings).unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let watch = UserWatch::new(account, &settings, notifier.clone());
    (watch, notifier)
}

fn item(id: &str, name: &str, available: u32, purchase_end: &str) -> Value {
    json!({
        "item": {"item_id": id},
        "display_name": name,
        "items_available": available,
        "purchase_end": purchase_end
    })
}

fn page(items: Vec<Value>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "items": items }))
}

async fn mount_refresh(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(REFRESH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "a2", "refresh_token": "r2"})),
        )
        .mount(server)
        .await;
}

async fn request_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}

async fn eventually<F: Fn() -> bool>(condition: F) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// ============================================================================
// Tick
// ============================================================================

#[tokio::test]
async fn test_restock_is_announced_again() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![item("1170509", "Bakery", 2, "2024-01-01T10:00:00Z")]))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![item("1170509", "Bakery", 1, "2024-01-01T16:00:00Z")]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut watch, notifier) = watch(&server, &dir, vec![Target::new("1170509", 1, "Bakery")]).await;

    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 1 });
    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 0 });
    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 1 });

    let texts = notifier.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[0].starts_with("Got following matches:\n👉🏻 Bakery (available: 2)"));
    assert!(texts[1].contains("Bakery (available: 1)"));
}

#[tokio::test]
async fn test_wildcard_announces_every_favourite_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![
            item("1", "One", 1, "2024-01-01T10:00:00Z"),
            item("2", "Two", 3, "2024-01-01T11:00:00Z"),
            item("3", "Three", 1, "2024-01-01T12:00:00Z"),
        ]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut watch, notifier) = watch(&server, &dir, vec![Target::wildcard(1)]).await;

    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 3 });
    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 0 });

    let texts = notifier.texts();
    assert_eq!(texts.len(), 1);
    for name in ["One", "Two", "Three"] {
        assert!(texts[0].contains(name), "{name} missing from {}", texts[0]);
    }
}

#[tokio::test]
async fn test_sold_out_item_is_forgotten() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![item("5", "Five", 1, "2024-01-01T10:00:00Z")]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![item("5", "Five", 0, "2024-01-01T10:00:00Z")]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![item("5", "Five", 1, "2024-01-01T10:00:00Z")]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut watch, _notifier) = watch(&server, &dir, vec![Target::wildcard(1)]).await;

    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 1 });
    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 0 });
    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 1 });
}

#[tokio::test]
async fn test_failures_trigger_refresh_before_next_poll() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![]))
        .mount(&server)
        .await;
    mount_refresh(&server).await;

    let dir = TempDir::new().unwrap();
    let (mut watch, notifier) = watch(&server, &dir, vec![Target::wildcard(1)]).await;

    for _ in 0..3 {
        assert_eq!(watch.tick().await.unwrap(), TickOutcome::Failed);
    }
    assert_eq!(watch.account().counters().consecutive_failures, 3);

    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 0 });
    assert_eq!(watch.account().counters().consecutive_failures, 0);
    assert_eq!(
        watch.account().store().config().session.access_token(),
        Some("a2")
    );

    let paths = request_paths(&server).await;
    assert_eq!(paths.len(), 5);
    assert_eq!(paths[3], REFRESH);
    assert_eq!(paths[4], FAVORITES);
    assert!(notifier.texts().iter().any(|t| t.contains("3 in a row")));
}

#[tokio::test]
async fn test_quota_breach_without_session_stops() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut watch, _notifier) = watch(&server, &dir, vec![Target::wildcard(1)]).await;

    for _ in 0..3 {
        assert_eq!(watch.tick().await.unwrap(), TickOutcome::Failed);
    }
    watch
        .account_mut()
        .store_mut()
        .update(|c| c.session.refresh_token = None)
        .await
        .unwrap();
    assert_eq!(
        watch.tick().await.unwrap(),
        TickOutcome::Stop(StopReason::QuotaBreach)
    );
    assert_eq!(request_paths(&server).await.len(), 3);
}

#[tokio::test]
async fn test_challenge_holds_until_cookie_changes_on_disk() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"url": "https://captcha.example/c"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![item("1", "One", 1, "2024-01-01T10:00:00Z")]))
        .mount(&server)
        .await;
    mount_refresh(&server).await;

    let dir = TempDir::new().unwrap();
    let (mut watch, notifier) = watch(&server, &dir, vec![Target::wildcard(1)]).await;

    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Failed);
    assert_eq!(watch.held_on(), Some("https://captcha.example/c"));
    assert!(notifier.texts()[0].contains("https://captcha.example/c"));

    let polls_before = request_paths(&server).await.len();
    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Held);
    assert_eq!(request_paths(&server).await.len(), polls_before);

    let mut edited = UserStore::open(dir.path(), "alice").await.unwrap();
    edited
        .update(|c| c.session.challenge_cookie = Some("datadome=abc".into()))
        .await
        .unwrap();

    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 1 });
    assert!(watch.held_on().is_none());
    assert!(notifier.texts().iter().any(|t| t.starts_with("🍪")));
}

#[tokio::test]
async fn test_edits_from_another_process_reach_the_loop_and_survive() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![item("1170509", "Bakery", 2, "2024-01-01T10:00:00Z")]))
        .mount(&server)
        .await;
    mount_refresh(&server).await;

    let dir = TempDir::new().unwrap();
    let (mut watch, _notifier) = watch(&server, &dir, vec![Target::new("42", 1, "Deli")]).await;
    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 0 });

    let mut cli = UserStore::open(dir.path(), "alice").await.unwrap();
    cli.update(|c| c.targets.upsert(Target::new("1170509", 1, "Bakery")))
        .await
        .unwrap();

    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 1 });
    watch.account_mut().refresh().await.unwrap();

    let reopened = UserStore::open(dir.path(), "alice").await.unwrap();
    let config = reopened.config();
    assert!(config.targets.get("1170509").is_some());
    assert!(config.targets.get("42").is_some());
    assert_eq!(config.session.access_token(), Some("a2"));
}

#[tokio::test]
async fn test_logout_from_another_process_is_adopted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut watch, _notifier) = watch(&server, &dir, vec![Target::wildcard(1)]).await;
    assert_eq!(watch.account().auth_state(), AuthState::LoggedIn);

    let mut cli = UserStore::open(dir.path(), "alice").await.unwrap();
    cli.update(|c| c.session.clear_tokens()).await.unwrap();

    let _ = watch.tick().await.unwrap();
    assert_eq!(watch.account().auth_state(), AuthState::LoggedOut);
}

#[tokio::test]
async fn test_clear_history_from_another_process() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![item("1", "One", 1, "2024-01-01T10:00:00Z")]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut watch, _notifier) = watch(&server, &dir, vec![Target::wildcard(1)]).await;
    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 1 });
    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 0 });

    let (other, _) = registry(&server, &dir).await;
    other.clear_history("alice").await.unwrap();

    assert_eq!(watch.tick().await.unwrap(), TickOutcome::Polled { notified: 1 });
    let reopened = UserStore::open(dir.path(), "alice").await.unwrap();
    assert!(!reopened.config().clear_history_requested);
}

// ============================================================================
// Loop
// ============================================================================

#[tokio::test]
async fn test_stopped_loop_clears_watching() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut watch, notifier) = watch(&server, &dir, vec![Target::wildcard(1)]).await;
    watch
        .account_mut()
        .store_mut()
        .update(|c| c.watching = true)
        .await
        .unwrap();
    let user = Arc::new(Mutex::new(watch));

    let shutdown = CancellationToken::new();
    let control = LoopControl::child_of(&shutdown);
    let stop = control.stop.clone();
    let handle = tokio::spawn(run_watch_loop(Arc::clone(&user), control));

    tokio::time::sleep(Duration::from_millis(60)).await;
    stop.cancel();
    assert_eq!(handle.await.unwrap().unwrap(), StopReason::Requested);

    let reopened = UserStore::open(dir.path(), "alice").await.unwrap();
    assert!(!reopened.config().watching);
    assert_eq!(
        notifier.texts().last().map(String::as_str),
        Some("Stopped watching the favourites.")
    );
}

#[tokio::test]
async fn test_watching_cleared_on_disk_stops_loop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut watch, notifier) = watch(&server, &dir, vec![Target::wildcard(1)]).await;
    watch
        .account_mut()
        .store_mut()
        .update(|c| c.watching = true)
        .await
        .unwrap();
    let user = Arc::new(Mutex::new(watch));

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(run_watch_loop(Arc::clone(&user), LoopControl::child_of(&shutdown)));
    tokio::time::sleep(Duration::from_millis(40)).await;

    let mut cli = UserStore::open(dir.path(), "alice").await.unwrap();
    cli.update(|c| c.watching = false).await.unwrap();

    let reason = tokio::time::timeout(Duration::from_secs(3), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reason, StopReason::Requested);
    assert_eq!(
        notifier.texts().last().map(String::as_str),
        Some("Stopped watching the favourites.")
    );
}

#[tokio::test]
async fn test_shutdown_keeps_watching() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let (mut watch, notifier) = watch(&server, &dir, vec![Target::wildcard(1)]).await;
    watch
        .account_mut()
        .store_mut()
        .update(|c| c.watching = true)
        .await
        .unwrap();
    let user = Arc::new(Mutex::new(watch));

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(run_watch_loop(Arc::clone(&user), LoopControl::child_of(&shutdown)));

    tokio::time::sleep(Duration::from_millis(40)).await;
    shutdown.cancel();
    assert_eq!(handle.await.unwrap().unwrap(), StopReason::Shutdown);

    let reopened = UserStore::open(dir.path(), "alice").await.unwrap();
    assert!(reopened.config().watching);
    assert!(notifier.texts().is_empty());
}

// ============================================================================
// Registry
// ============================================================================

async fn registry(server: &MockServer, dir: &TempDir) -> (Arc<WatchRegistry>, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let registry = WatchRegistry::new(dir.path(), settings(server), notifier.clone());
    (Arc::new(registry), notifier)
}

#[tokio::test]
async fn test_registry_start_status_stop() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![item("1", "One", 1, "2024-01-01T10:00:00Z")]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    seeded_store(&dir, "alice", vec![Target::wildcard(1)]).await;
    let (registry, notifier) = registry(&server, &dir).await;

    let outcome = registry
        .start("alice", Some(Duration::from_millis(20)))
        .await
        .unwrap();
    assert_eq!(outcome, StartOutcome::Started);
    assert_eq!(
        registry.start("alice", None).await.unwrap(),
        StartOutcome::AlreadyRunning
    );

    let status = registry.status("alice").await.unwrap();
    assert!(status.running);
    assert!(status.watching);
    assert_eq!(status.interval, Duration::from_millis(20));
    assert_eq!(status.targets, 1);

    let recorder = Arc::clone(&notifier);
    eventually(move || recorder.texts().iter().any(|t| t.contains("One (available: 1)"))).await;

    registry.stop("alice").await.unwrap();
    let status = registry.status("alice").await.unwrap();
    assert!(!status.running);
    assert!(!status.watching);
    assert_eq!(
        notifier.texts().last().map(String::as_str),
        Some("Stopped watching the favourites.")
    );
}

#[tokio::test]
async fn test_unknown_user_status_fails() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (registry, _notifier) = registry(&server, &dir).await;

    assert!(registry.status("nobody").await.is_err());
}

#[tokio::test]
async fn test_resurrect_and_shutdown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(page(vec![]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut watching = seeded_store(&dir, "alice", vec![Target::wildcard(1)]).await;
    watching.update(|c| c.watching = true).await.unwrap();
    seeded_store(&dir, "bob", vec![Target::wildcard(1)]).await;

    let (registry, _notifier) = registry(&server, &dir).await;
    let loaded = registry.load_all().await.unwrap();
    assert_eq!(loaded, vec!["alice".to_string(), "bob".to_string()]);

    assert_eq!(registry.resurrect_dead().await, vec!["alice".to_string()]);
    assert!(registry.status("alice").await.unwrap().running);
    assert!(!registry.status("bob").await.unwrap().running);
    assert!(registry.resurrect_dead().await.is_empty());

    registry.shutdown().await;
    assert!(registry.user_ids().await.is_empty());
    assert!(registry.resurrect_dead().await.is_empty());

    let reopened = UserStore::open(dir.path(), "alice").await.unwrap();
    assert!(reopened.config().watching);
}

#[tokio::test]
async fn test_target_commands() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/item/v7/1170509"))
        .respond_with(ResponseTemplate::new(200).set_body_json(item(
            "1170509",
            "Bakery",
            0,
            "2024-01-01T10:00:00Z",
        )))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/user/favorite/v1/1170509/update"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    seeded_store(&dir, "alice", vec![]).await;
    let (registry, _notifier) = registry(&server, &dir).await;

    let added = registry.add_target("alice", "1170509", 2).await.unwrap();
    assert_eq!(added, TargetChange::Added(Target::new("1170509", 2, "Bakery")));

    let wildcard = registry.add_target("alice", "*", 1).await.unwrap();
    assert_eq!(wildcard, TargetChange::Added(Target::wildcard(1)));

    let removed = registry.add_target("alice", "1170509", 0).await.unwrap();
    assert!(matches!(removed, TargetChange::Removed(t) if t.item_id == "1170509"));
    assert_eq!(
        registry.remove_target("alice", "42").await.unwrap(),
        TargetChange::NotTargeted("42".into())
    );

    registry.clear_history("alice").await.unwrap();

    let reopened = UserStore::open(dir.path(), "alice").await.unwrap();
    let targets = &reopened.config().targets;
    assert_eq!(targets.len(), 1);
    assert!(targets.wildcard().is_some());
}

#[tokio::test]
async fn test_supply_cookie_persists() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    seeded_store(&dir, "alice", vec![]).await;
    let (registry, _notifier) = registry(&server, &dir).await;

    registry.supply_cookie("alice", "  datadome=xyz \n").await.unwrap();

    let reopened = UserStore::open(dir.path(), "alice").await.unwrap();
    assert_eq!(
        reopened.config().session.challenge_cookie(),
        Some("datadome=xyz")
    );
}

#[tokio::test]
async fn test_crashed_loop_keeps_watching_and_is_resurrected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FAVORITES))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_refresh(&server).await;

    let dir = TempDir::new().unwrap();
    let mut seeded = seeded_store(&dir, "alice", vec![Target::wildcard(1)]).await;
    seeded.update(|c| c.watching = true).await.unwrap();
    let (registry, _notifier) = registry(&server, &dir).await;
    registry.register("alice").await.unwrap();

    // The refresh after three failures cannot be saved over a broken file.
    tokio::fs::write(seeded.path(), "{ not json").await.unwrap();
    assert_eq!(registry.resurrect_dead().await, vec!["alice".to_string()]);

    let mut crashed = false;
    for _ in 0..300 {
        if !registry.status("alice").await.unwrap().running {
            crashed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(crashed, "loop did not end");
    assert!(request_paths(&server).await.contains(&REFRESH.to_string()));

    let status = registry.status("alice").await.unwrap();
    assert!(status.watching);
    assert_eq!(registry.resurrect_dead().await, vec!["alice".to_string()]);
    registry.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_first_contacts_share_one_entry() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let (registry, _notifier) = registry(&server, &dir).await;

    let (a, b) = tokio::join!(registry.register("carol"), registry.register("carol"));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b));

    let device_id = a.lock().await.account().store().config().session.device_id.clone();
    let on_disk = UserStore::open(dir.path(), "carol").await.unwrap();
    assert_eq!(on_disk.config().session.device_id, device_id);
}
