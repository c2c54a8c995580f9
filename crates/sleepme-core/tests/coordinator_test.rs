// Integration tests for `Coordinator` against a wiremock Sleep.me API.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use rust_decimal_macros::dec;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sleepme_api::SleepmeClient;
use sleepme_core::{
    Coordinator, CoordinatorConfig, CoordinatorState, CoreError, ErrorKind, HvacMode, ThermalMode,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn control_body(set_f: i32, set_c: &str, mode: &str) -> Value {
    json!({
        "brightness_level": 100,
        "display_temperature_unit": "f",
        "set_temperature_c": set_c.parse::<serde_json::Number>().unwrap(),
        "set_temperature_f": set_f,
        "thermal_control_status": mode,
        "time_zone": "America/Chicago"
    })
}

fn state_body(set_f: i32, set_c: &str, mode: &str) -> Value {
    json!({
        "about": {
            "firmware_version": "5.39.2134",
            "ip_address": "203.0.113.7",
            "lan_address": "192.168.1.40",
            "mac_address": "aa:bb:cc:dd:ee:ff",
            "model": "DP999NA",
            "serial_number": "23381000001"
        },
        "control": control_body(set_f, set_c, mode),
        "status": {
            "is_connected": true,
            "is_water_low": false,
            "water_level": 100,
            "water_temperature_c": 23.5,
            "water_temperature_f": 74.3
        }
    })
}

fn devices_body() -> Value {
    json!([
        { "id": "dev-b", "name": "Guest bed", "attachments": ["CHILIPAD_PRO"] },
        { "id": "dev-x", "name": "Old pad", "attachments": ["DOCK_PRO"] },
        { "id": "dev-a", "name": "Main bed", "attachments": ["CHILIPAD_PRO"] }
    ])
}

async fn mount_devices(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(server)
        .await;
}

async fn mount_state(server: &MockServer, id: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/devices/{id}")))
        .respond_with(template)
        .mount(server)
        .await;
}

fn ok_state(set_f: i32, set_c: &str, mode: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(state_body(set_f, set_c, mode))
}

fn coordinator_with(
    server: &MockServer,
    tweak: impl FnOnce(&mut CoordinatorConfig),
) -> Coordinator {
    let mut config = CoordinatorConfig::new(SecretString::from("test-key".to_string())).unwrap();
    config.poll_interval = Duration::ZERO;
    tweak(&mut config);
    let client =
        SleepmeClient::from_reqwest(&format!("{}/v1", server.uri()), reqwest::Client::new())
            .unwrap();
    Coordinator::with_client(config, client).unwrap()
}

/// Server with two eligible devices and a coordinator that has completed setup.
async fn ready_with(tweak: impl FnOnce(&mut CoordinatorConfig)) -> (MockServer, Coordinator) {
    let server = MockServer::start().await;
    mount_devices(&server).await;
    mount_state(&server, "dev-a", ok_state(72, "22.2", "active")).await;
    mount_state(&server, "dev-b", ok_state(65, "18.3", "standby")).await;

    let coordinator = coordinator_with(&server, tweak);
    coordinator.setup().await.unwrap();
    server.reset().await;
    (server, coordinator)
}

async fn ready() -> (MockServer, Coordinator) {
    ready_with(|_| {}).await
}

async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

// ── Setup ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_setup_loads_eligible_devices_in_listing_order() {
    let (_server, coordinator) = ready().await;

    let ids: Vec<String> = coordinator
        .snapshot()
        .iter()
        .map(|e| e.id().to_owned())
        .collect();
    assert_eq!(ids, vec!["dev-b", "dev-a"]);
    assert_eq!(coordinator.current_state(), CoordinatorState::Idle);
    assert!(coordinator.last_update_success());
    assert!(coordinator.last_refresh().is_some());

    let main = coordinator.cached_state("dev-a").unwrap();
    assert_eq!(main.name(), "Main bed");
    assert_eq!(main.target_temperature_f(), dec!(72));
    assert_eq!(main.hvac_mode(), HvacMode::HeatCool);
    assert!(coordinator.cached_state("dev-x").is_none());
}

#[tokio::test]
async fn test_setup_requires_every_device() {
    let server = MockServer::start().await;
    mount_devices(&server).await;
    mount_state(&server, "dev-a", ok_state(72, "22.2", "active")).await;
    mount_state(&server, "dev-b", ResponseTemplate::new(500)).await;
    let coordinator = coordinator_with(&server, |_| {});

    let err = coordinator.setup().await.unwrap_err();

    match err {
        CoreError::RefreshFailed {
            failed, total, kind, ..
        } => {
            assert_eq!((failed, total), (1, 2));
            assert_eq!(kind, ErrorKind::Communication);
        }
        other => panic!("expected RefreshFailed, got {other:?}"),
    }
    assert!(!coordinator.store().is_ready());
    assert_eq!(coordinator.current_state(), CoordinatorState::Uninitialized);
}

#[tokio::test]
async fn test_setup_with_rejected_key_halts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/devices"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let coordinator = coordinator_with(&server, |_| {});

    let err = coordinator.setup().await.unwrap_err();

    assert!(matches!(err, CoreError::ReauthRequired { .. }));
    assert_eq!(coordinator.current_state(), CoordinatorState::Halted);

    // Later refreshes report the rejected key, not a missing setup.
    let again = coordinator.refresh().await.unwrap_err();
    assert!(matches!(again, CoreError::ReauthRequired { .. }), "got {again:?}");
}

#[tokio::test]
async fn test_operations_before_setup_are_rejected() {
    let server = MockServer::start().await;
    let coordinator = coordinator_with(&server, |_| {});

    assert!(matches!(
        coordinator.refresh().await,
        Err(CoreError::NotReady)
    ));
    assert!(matches!(
        coordinator.set_temperature("dev-a", 70).await,
        Err(CoreError::NotReady)
    ));
    assert!(matches!(coordinator.start().await, Err(CoreError::NotReady)));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let server = MockServer::start().await;
    let client = SleepmeClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    let mut config = CoordinatorConfig::new(SecretString::from("k".to_string())).unwrap();
    config.max_concurrent_fetches = 0;

    assert!(matches!(
        Coordinator::with_client(config, client),
        Err(CoreError::Config { .. })
    ));
}

// ── Refresh ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_updates_every_device_with_one_notification() {
    let (server, coordinator) = ready().await;
    mount_state(&server, "dev-a", ok_state(80, "26.7", "active")).await;
    mount_state(&server, "dev-b", ok_state(60, "15.6", "active")).await;
    let mut stream = coordinator.subscribe();
    let before = coordinator.store().version();

    let report = coordinator.refresh().await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.updated.len(), 2);
    assert_eq!(coordinator.store().version(), before + 1);
    let snap = stream.changed().await.unwrap();
    assert_eq!(snap[0].target_temperature_f(), dec!(60));
    assert_eq!(snap[1].target_temperature_f(), dec!(80));
    assert!(!stream.has_changed());
}

#[tokio::test]
async fn test_partial_failure_keeps_stale_entry() {
    let (server, coordinator) = ready().await;
    let stale = coordinator.cached_state("dev-a").unwrap();
    mount_state(&server, "dev-a", ResponseTemplate::new(503)).await;
    mount_state(&server, "dev-b", ok_state(60, "15.6", "active")).await;

    let err = coordinator.refresh().await.unwrap_err();

    match err {
        CoreError::RefreshFailed {
            failed, total, kind, ..
        } => {
            assert_eq!((failed, total), (1, 2));
            assert_eq!(kind, ErrorKind::Communication);
        }
        other => panic!("expected RefreshFailed, got {other:?}"),
    }
    assert_eq!(coordinator.cached_state("dev-a").unwrap(), stale);
    assert_eq!(
        coordinator.cached_state("dev-b").unwrap().target_temperature_f(),
        dec!(60)
    );
    assert!(!coordinator.last_update_success());
    assert_eq!(coordinator.current_state(), CoordinatorState::Idle);
}

#[tokio::test]
async fn test_rejected_key_halts_and_discards_cycle() {
    let (server, coordinator) = ready().await;
    let before = coordinator.snapshot();
    mount_state(&server, "dev-a", ResponseTemplate::new(401)).await;
    mount_state(&server, "dev-b", ok_state(60, "15.6", "active")).await;

    let err = coordinator.refresh().await.unwrap_err();

    assert!(matches!(err, CoreError::ReauthRequired { .. }));
    assert!(err.is_auth());
    assert_eq!(coordinator.current_state(), CoordinatorState::Halted);
    assert_eq!(coordinator.snapshot(), before);
    assert!(!coordinator.last_update_success());

    // Halted is terminal: no further fetches are attempted.
    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ok_state(60, "15.6", "active"))
        .expect(0)
        .mount(&server)
        .await;

    let again = coordinator.refresh().await.unwrap_err();
    assert!(matches!(again, CoreError::ReauthRequired { .. }));
}

#[tokio::test]
async fn test_concurrent_refreshes_share_one_cycle() {
    let (server, coordinator) = ready().await;
    for id in ["dev-a", "dev-b"] {
        Mock::given(method("GET"))
            .and(path(format!("/v1/devices/{id}")))
            .respond_with(
                ok_state(70, "21.1", "active").set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let (first, second) = tokio::join!(coordinator.refresh(), coordinator.refresh());

    assert_eq!(first.unwrap(), second.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refreshes_across_threads_share_one_cycle() {
    let (server, coordinator) = ready().await;
    for id in ["dev-a", "dev-b"] {
        Mock::given(method("GET"))
            .and(path(format!("/v1/devices/{id}")))
            .respond_with(
                ok_state(70, "21.1", "active").set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.refresh().await })
        })
        .collect();

    let mut reports = Vec::new();
    for handle in handles {
        reports.push(handle.await.unwrap().unwrap());
    }
    assert!(reports.windows(2).all(|pair| pair[0] == pair[1]));
}

#[tokio::test]
async fn test_abandoned_refresh_returns_to_idle() {
    let (server, coordinator) = ready().await;
    mount_state(
        &server,
        "dev-a",
        ok_state(80, "26.7", "active").set_delay(Duration::from_secs(2)),
    )
    .await;
    mount_state(&server, "dev-b", ok_state(60, "15.6", "active")).await;
    let mut state = coordinator.state();

    let dropped = tokio::time::timeout(Duration::from_millis(200), coordinator.refresh()).await;

    assert!(dropped.is_err());
    assert_eq!(coordinator.current_state(), CoordinatorState::Idle);
    assert_eq!(*state.borrow_and_update(), CoordinatorState::Idle);
    assert!(!coordinator.last_update_success());

    // The next cycle runs normally.
    server.reset().await;
    mount_state(&server, "dev-a", ok_state(74, "23.3", "active")).await;
    mount_state(&server, "dev-b", ok_state(60, "15.6", "active")).await;
    let report = coordinator.refresh().await.unwrap();
    assert!(report.is_complete());
    assert!(coordinator.last_update_success());
}

#[tokio::test]
async fn test_cycle_timeout_fails_pending_devices() {
    let (server, coordinator) = ready_with(|cfg| {
        cfg.cycle_timeout = Duration::from_millis(300);
    })
    .await;
    mount_state(
        &server,
        "dev-a",
        ok_state(80, "26.7", "active").set_delay(Duration::from_secs(3)),
    )
    .await;
    mount_state(&server, "dev-b", ok_state(60, "15.6", "active")).await;

    let err = coordinator.refresh().await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Communication));
    assert_eq!(
        coordinator.cached_state("dev-a").unwrap().target_temperature_f(),
        dec!(72)
    );
    assert_eq!(
        coordinator.cached_state("dev-b").unwrap().target_temperature_f(),
        dec!(60)
    );
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_temperature_writes_server_control() {
    let (server, coordinator) = ready().await;
    let before = coordinator.cached_state("dev-a").unwrap();
    Mock::given(method("PATCH"))
        .and(path("/v1/devices/dev-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(control_body(75, "23.9", "active")))
        .expect(1)
        .mount(&server)
        .await;
    let stream = coordinator.subscribe();
    let version = coordinator.store().version();

    let entry = coordinator.set_temperature("dev-a", 75).await.unwrap();

    assert_eq!(entry.target_temperature_f(), dec!(75));
    assert_eq!(entry.control.set_temperature_c, dec!(23.9));
    assert_eq!(entry.status, before.status);
    assert_eq!(coordinator.cached_state("dev-a").unwrap(), entry);
    assert_eq!(coordinator.store().version(), version + 1);
    assert!(stream.has_changed());
}

#[tokio::test]
async fn test_set_mode_switches_to_off() {
    let (server, coordinator) = ready().await;
    Mock::given(method("PATCH"))
        .and(path("/v1/devices/dev-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(control_body(72, "22.2", "standby")))
        .expect(1)
        .mount(&server)
        .await;

    let entry = coordinator
        .set_mode("dev-a", ThermalMode::Standby)
        .await
        .unwrap();

    assert_eq!(entry.hvac_mode(), HvacMode::Off);
}

#[tokio::test]
async fn test_failed_mutation_leaves_cache_untouched() {
    let (server, coordinator) = ready().await;
    let before = coordinator.snapshot();
    Mock::given(method("PATCH"))
        .and(path("/v1/devices/dev-a"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let stream = coordinator.subscribe();

    let err = coordinator.set_temperature("dev-a", 75).await.unwrap_err();

    assert!(matches!(err, CoreError::Api(_)));
    assert_eq!(err.kind(), Some(ErrorKind::Communication));
    assert_eq!(coordinator.snapshot(), before);
    assert!(!stream.has_changed());
}

#[tokio::test]
async fn test_mutation_auth_error_does_not_halt() {
    let (server, coordinator) = ready().await;
    Mock::given(method("PATCH"))
        .and(path("/v1/devices/dev-a"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = coordinator.set_temperature("dev-a", 75).await.unwrap_err();

    assert!(err.is_auth());
    assert_eq!(coordinator.current_state(), CoordinatorState::Idle);
}

#[tokio::test]
async fn test_unknown_device_and_bad_target_never_reach_the_api() {
    let (server, coordinator) = ready().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert!(matches!(
        coordinator.set_temperature("ghost", 70).await,
        Err(CoreError::DeviceNotFound { .. })
    ));
    assert!(matches!(
        coordinator.set_mode("ghost", ThermalMode::Active).await,
        Err(CoreError::DeviceNotFound { .. })
    ));
    assert!(matches!(
        coordinator.set_temperature("dev-a", 54).await,
        Err(CoreError::ValidationFailed { .. })
    ));
    assert!(matches!(
        coordinator.set_temperature("dev-a", 116).await,
        Err(CoreError::ValidationFailed { .. })
    ));
}

// ── Background loop ─────────────────────────────────────────────────

#[tokio::test]
async fn test_background_loop_polls_until_shutdown() {
    let (server, coordinator) = ready_with(|cfg| {
        cfg.poll_interval = Duration::from_millis(100);
    })
    .await;
    mount_state(&server, "dev-a", ok_state(72, "22.2", "active")).await;
    mount_state(&server, "dev-b", ok_state(65, "18.3", "standby")).await;

    coordinator.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(450)).await;
    coordinator.shutdown().await;

    let polled = requests_to(&server, "/v1/devices/dev-a").await;
    assert!(polled >= 2, "expected at least two polls, saw {polled}");

    // shut down for good
    coordinator.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(requests_to(&server, "/v1/devices/dev-a").await, polled);
}
