use super::*;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::protocol::{Alarm, ConfigBundle};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Default)]
struct Recorded {
    tokens: Vec<Option<String>>,
    alarm_posts: Vec<Value>,
    alarm_puts: Vec<(u32, Value)>,
    actions: Vec<(u32, String)>,
    deleted_alarms: Vec<u32>,
    deleted_file_paths: Vec<String>,
    uploads: Vec<(String, String, usize)>,
    imports: Vec<Value>,
    restarts: usize,
}

#[derive(Clone)]
struct DeviceState {
    recorded: Arc<Mutex<Recorded>>,
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn sample_alarm(id: u32, enabled: bool) -> Value {
    json!({
        "id": id,
        "enabled": enabled,
        "label": format!("alarm-{id}"),
        "hour": 7,
        "minute": 30,
        "days_bitmask": 31,
        "once_date": "",
        "snooze_minutes": 5,
        "gpio_pin": 0,
        "long_press_ms": 0,
        "volume": 80,
        "audio_source": {
            "type": "local",
            "local_path": "/audio/default.wav",
            "url": "",
            "fallback_local_path": "/audio/default.wav"
        },
        "outbound_webhooks": {
            "on_set_url": "", "on_fire_url": "", "on_snooze_url": "", "on_dismiss_url": ""
        },
        "next_fire_unix": 1756270200_i64
    })
}

async fn handle_status(State(state): State<DeviceState>, headers: HeaderMap) -> Json<Value> {
    state.recorded.lock().await.tokens.push(header_token(&headers));
    Json(json!({
        "device_id": "wakeup-01",
        "fw_version": 3,
        "wifi_connected": true,
        "ssid": "home",
        "ip": "192.168.1.40",
        "rssi": -61,
        "time_valid": true,
        "ntp_synced": true,
        "ts_iso": "2026-08-27T07:00:00+02:00",
        "ts_unix": 1787554800_i64,
        "active_alarm_id": 0,
        "audio_playing": false,
        "last_audio_error": "",
        "littlefs": { "total": 2097152, "used": 524288, "free": 1572864 }
    }))
}

async fn handle_alarms(State(state): State<DeviceState>, headers: HeaderMap) -> Json<Value> {
    state.recorded.lock().await.tokens.push(header_token(&headers));
    Json(json!([sample_alarm(1, true), sample_alarm(2, false)]))
}

async fn handle_alarm_by_id(Path(id): Path<u32>) -> Json<Value> {
    Json(sample_alarm(id, true))
}

async fn handle_post_alarm(
    State(state): State<DeviceState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let mut recorded = state.recorded.lock().await;
    recorded.tokens.push(header_token(&headers));
    recorded.alarm_posts.push(body);
    (StatusCode::CREATED, Json(json!({ "id": 9 })))
}

async fn handle_put_alarm(
    State(state): State<DeviceState>,
    Path(id): Path<u32>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.recorded.lock().await.alarm_puts.push((id, body));
    Json(json!({ "ok": true }))
}

async fn handle_delete_alarm(
    State(state): State<DeviceState>,
    Path(id): Path<u32>,
) -> Json<Value> {
    state.recorded.lock().await.deleted_alarms.push(id);
    Json(json!({ "ok": true }))
}

async fn handle_alarm_action(
    State(state): State<DeviceState>,
    Path((id, action)): Path<(u32, String)>,
) -> (StatusCode, Json<Value>) {
    state.recorded.lock().await.actions.push((id, action.clone()));
    match action.as_str() {
        "enable" | "disable" | "fire" => (StatusCode::OK, Json(json!({ "ok": true }))),
        "snooze" | "dismiss" => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "not_ringing" })),
        ),
        "test_audio" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "ok": false, "last_audio_error": "no dac configured" })),
        ),
        _ => (StatusCode::BAD_REQUEST, Json(json!({ "error": "bad_action" }))),
    }
}

async fn handle_files(State(state): State<DeviceState>, headers: HeaderMap) -> Json<Value> {
    state.recorded.lock().await.tokens.push(header_token(&headers));
    Json(json!([
        { "name": "chime.wav", "path": "/audio/chime.wav", "size": 9000 },
        { "name": "horn.wav", "path": "/audio/horn.wav", "size": 12000 }
    ]))
}

#[derive(serde::Deserialize)]
struct DeleteFileParams {
    path: String,
}

async fn handle_delete_file(
    State(state): State<DeviceState>,
    Query(params): Query<DeleteFileParams>,
) -> Json<Value> {
    state.recorded.lock().await.deleted_file_paths.push(params.path);
    Json(json!({ "ok": true }))
}

async fn handle_files_space() -> Json<Value> {
    Json(json!({ "total": 2097152, "used": 524288, "free": 1572864 }))
}

async fn handle_upload(
    State(state): State<DeviceState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> (StatusCode, Json<Value>) {
    let mut recorded = state.recorded.lock().await;
    recorded.tokens.push(header_token(&headers));
    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.unwrap_or_default();
        recorded.uploads.push((field_name, file_name, bytes.len()));
    }
    (StatusCode::OK, Json(json!({ "ok": true })))
}

async fn handle_logs() -> Json<Value> {
    Json(json!(["boot", "wifi connected", "ntp synced"]))
}

async fn handle_export() -> Json<Value> {
    Json(json!({
        "device_id": "wakeup-01",
        "system": {
            "admin_token": "s3cret",
            "audio_pwm_pin": 25,
            "wifi_ssid": "home",
            "wifi_pass": "hunter2"
        },
        "alarms": [sample_alarm(1, true)]
    }))
}

async fn handle_import(
    State(state): State<DeviceState>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.recorded.lock().await.imports.push(body);
    Json(json!({ "ok": true }))
}

async fn handle_restart(State(state): State<DeviceState>) -> Json<Value> {
    state.recorded.lock().await.restarts += 1;
    Json(json!({ "ok": true }))
}

async fn spawn_device() -> (String, Arc<Mutex<Recorded>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock device");
    let addr = listener.local_addr().expect("local addr");
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let state = DeviceState {
        recorded: recorded.clone(),
    };
    let app = Router::new()
        .route("/api/status", get(handle_status))
        .route("/api/alarms", get(handle_alarms).post(handle_post_alarm))
        .route(
            "/api/alarms/:id",
            get(handle_alarm_by_id)
                .put(handle_put_alarm)
                .delete(handle_delete_alarm),
        )
        .route("/api/alarms/:id/:action", post(handle_alarm_action))
        .route("/api/files", get(handle_files).delete(handle_delete_file))
        .route("/api/files/space", get(handle_files_space))
        .route("/api/files/upload", post(handle_upload))
        .route("/api/logs", get(handle_logs))
        .route("/api/config/export", get(handle_export))
        .route("/api/config/import", post(handle_import))
        .route("/api/system/restart", post(handle_restart))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), recorded)
}

#[tokio::test]
async fn status_parses_device_shape() {
    let (url, _) = spawn_device().await;
    let client = DeviceClient::new(&url, None).expect("client");
    let status = client.status().await.expect("status");
    assert_eq!(status.device_id, "wakeup-01");
    assert!(status.wifi_connected && status.ntp_synced);
    assert_eq!(status.littlefs.total, 2097152);
    assert_eq!(status.active_alarm(), None);
}

#[tokio::test]
async fn admin_token_header_rides_every_request_when_set() {
    let (url, recorded) = spawn_device().await;
    let mut client = DeviceClient::new(&url, Some("topsecret".into())).expect("client");
    client.status().await.expect("status");
    client.alarms().await.expect("alarms");
    client.files().await.expect("files");
    let recorded = recorded.lock().await;
    assert_eq!(recorded.tokens.len(), 3);
    assert!(recorded
        .tokens
        .iter()
        .all(|t| t.as_deref() == Some("topsecret")));
}

#[tokio::test]
async fn no_token_means_no_header() {
    let (url, recorded) = spawn_device().await;
    let client = DeviceClient::new(&url, None).expect("client");
    client.status().await.expect("status");
    assert_eq!(recorded.lock().await.tokens, vec![None]);
}

#[tokio::test]
async fn empty_token_is_treated_as_unset() {
    let (url, recorded) = spawn_device().await;
    let client = DeviceClient::new(&url, Some(String::new())).expect("client");
    client.status().await.expect("status");
    assert_eq!(recorded.lock().await.tokens, vec![None]);
}

#[tokio::test]
async fn alarm_cache_holds_exactly_the_returned_records() {
    let (url, _) = spawn_device().await;
    let mut client = DeviceClient::new(&url, None).expect("client");
    let listed: Vec<Alarm> = client.alarms().await.expect("alarms").to_vec();
    assert_eq!(listed.len(), 2);
    assert_eq!(client.state.alarms, listed);
    assert_eq!(client.state.alarms[0].id, AlarmId(1));
    assert_eq!(client.state.alarms[1].id, AlarmId(2));
}

#[tokio::test]
async fn create_posts_seed_payload_and_returns_id() {
    let (url, recorded) = spawn_device().await;
    let client = DeviceClient::new(&url, None).expect("client");
    let id = client
        .create_alarm(&forms::create_seed())
        .await
        .expect("create");
    assert_eq!(id, AlarmId(9));
    let recorded = recorded.lock().await;
    let posted = &recorded.alarm_posts[0];
    assert_eq!(posted["label"], "New alarm");
    assert_eq!(posted["enabled"], false);
    assert_eq!(posted["hour"], 7);
    assert_eq!(posted["minute"], 30);
    assert_eq!(posted["days_bitmask"], 0);
}

#[tokio::test]
async fn update_sends_marshalled_form_payload() {
    let (url, recorded) = spawn_device().await;
    let client = DeviceClient::new(&url, None).expect("client");
    let form = forms::AlarmForm {
        label: "Early shift".into(),
        time: "05:15".into(),
        days: "weekdays".into(),
        volume: "70".into(),
        audio_type: "local".into(),
        local_path: "horn.wav".into(),
        fallback_local_path: "/audio/default.wav".into(),
        ..forms::AlarmForm::default()
    };
    let ack = client
        .update_alarm(AlarmId(4), &form.to_payload())
        .await
        .expect("update");
    assert!(ack.ok);
    let recorded = recorded.lock().await;
    let (id, body) = &recorded.alarm_puts[0];
    assert_eq!(*id, 4);
    assert_eq!(body["hour"], 5);
    assert_eq!(body["minute"], 15);
    assert_eq!(body["days_bitmask"], 31);
    assert_eq!(body["volume"], 70);
    assert_eq!(body["audio_source"]["local_path"], "/audio/horn.wav");
    assert!(body.get("enabled").is_none());
}

#[tokio::test]
async fn toggle_resolves_enabled_state_from_cache() {
    let (url, recorded) = spawn_device().await;
    let mut client = DeviceClient::new(&url, None).expect("client");
    client.alarms().await.expect("alarms");

    // Alarm 1 is enabled in the listing, so toggling must disable it.
    let now_enabled = client.toggle_alarm(AlarmId(1)).await.expect("toggle");
    assert!(!now_enabled);
    // Alarm 2 is disabled, so toggling enables.
    let now_enabled = client.toggle_alarm(AlarmId(2)).await.expect("toggle");
    assert!(now_enabled);

    let recorded = recorded.lock().await;
    assert_eq!(
        recorded.actions,
        vec![(1, "disable".to_string()), (2, "enable".to_string())]
    );
}

#[tokio::test]
async fn toggle_falls_back_to_fetch_on_cache_miss() {
    let (url, recorded) = spawn_device().await;
    let mut client = DeviceClient::new(&url, None).expect("client");
    // sample_alarm() reports enabled=true for direct fetches.
    let now_enabled = client.toggle_alarm(AlarmId(5)).await.expect("toggle");
    assert!(!now_enabled);
    assert_eq!(
        recorded.lock().await.actions,
        vec![(5, "disable".to_string())]
    );
}

#[tokio::test]
async fn delete_alarm_prunes_cache() {
    let (url, recorded) = spawn_device().await;
    let mut client = DeviceClient::new(&url, None).expect("client");
    client.alarms().await.expect("alarms");
    client.delete_alarm(AlarmId(1)).await.expect("delete");
    assert_eq!(recorded.lock().await.deleted_alarms, vec![1]);
    assert!(client.state.alarm(AlarmId(1)).is_none());
    assert!(client.state.alarm(AlarmId(2)).is_some());
}

#[tokio::test]
async fn snooze_outside_ring_window_surfaces_conflict() {
    let (url, _) = spawn_device().await;
    let client = DeviceClient::new(&url, None).expect("client");
    let err = client.snooze(AlarmId(1)).await.expect_err("must conflict");
    match &err {
        ClientError::Api { status, body } => {
            assert_eq!(*status, StatusCode::CONFLICT);
            assert_eq!(body.code(), ErrorCode::NotRinging);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("not_ringing"));
}

#[tokio::test]
async fn test_audio_failure_body_is_still_a_result() {
    let (url, _) = spawn_device().await;
    let client = DeviceClient::new(&url, None).expect("client");
    let result = client.test_audio(AlarmId(1)).await.expect("parsed body");
    assert!(!result.ok);
    assert_eq!(result.last_audio_error, "no dac configured");
}

#[tokio::test]
async fn file_cache_matches_listing_and_delete_uses_query_param() {
    let (url, recorded) = spawn_device().await;
    let mut client = DeviceClient::new(&url, None).expect("client");
    let files = client.files().await.expect("files").to_vec();
    assert_eq!(files.len(), 2);
    assert_eq!(client.state.files, files);

    client
        .delete_file("/audio/my chime.wav")
        .await
        .expect("delete");
    // Percent-encoding must round-trip: the device sees the original path.
    assert_eq!(
        recorded.lock().await.deleted_file_paths,
        vec!["/audio/my chime.wav".to_string()]
    );
    assert_eq!(client.state.files.len(), 2);
}

#[tokio::test]
async fn upload_sends_multipart_field_named_file() {
    let (url, recorded) = spawn_device().await;
    let client = DeviceClient::new(&url, Some("topsecret".into())).expect("client");
    client
        .upload_file("chime.wav", vec![0u8; 4096])
        .await
        .expect("upload");
    let recorded = recorded.lock().await;
    assert_eq!(
        recorded.uploads,
        vec![("file".to_string(), "chime.wav".to_string(), 4096)]
    );
    assert_eq!(recorded.tokens.last().unwrap().as_deref(), Some("topsecret"));
}

#[tokio::test]
async fn oversized_upload_is_rejected_before_any_request() {
    let (url, recorded) = spawn_device().await;
    let client = DeviceClient::new(&url, None).expect("client");
    let err = client
        .upload_file("big.wav", vec![0u8; MAX_UPLOAD_BYTES + 1])
        .await
        .expect_err("must reject");
    assert!(matches!(err, ClientError::FileTooLarge { size } if size == MAX_UPLOAD_BYTES + 1));
    assert!(recorded.lock().await.uploads.is_empty());
}

#[tokio::test]
async fn logs_come_back_as_plain_lines() {
    let (url, _) = spawn_device().await;
    let client = DeviceClient::new(&url, None).expect("client");
    let logs = client.logs().await.expect("logs");
    assert_eq!(logs, vec!["boot", "wifi connected", "ntp synced"]);
}

#[tokio::test]
async fn config_export_import_round_trip_is_lossless() {
    let (url, recorded) = spawn_device().await;
    let client = DeviceClient::new(&url, None).expect("client");
    let bundle: ConfigBundle = client.export_config().await.expect("export");
    assert_eq!(bundle.device_id, "wakeup-01");
    assert_eq!(bundle.alarms.len(), 1);

    client.import_config(&bundle).await.expect("import");
    let recorded = recorded.lock().await;
    let imported = &recorded.imports[0];
    let reparsed: ConfigBundle = serde_json::from_value(imported.clone()).expect("reparse");
    assert_eq!(reparsed, bundle);
    assert_eq!(imported["system"]["admin_token"], "s3cret");
    assert_eq!(imported["alarms"][0]["id"], 1);
}

#[tokio::test]
async fn restart_posts_once() {
    let (url, recorded) = spawn_device().await;
    let client = DeviceClient::new(&url, None).expect("client");
    let ack = client.restart().await.expect("restart");
    assert!(ack.ok);
    assert_eq!(recorded.lock().await.restarts, 1);
}

#[tokio::test]
async fn plain_text_error_is_carried_verbatim() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new().route(
        "/api/status",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "flash write failed") }),
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let client = DeviceClient::new(format!("http://{addr}"), None).expect("client");
    let err = client.status().await.expect_err("must fail");
    match err {
        ClientError::Api { status, body } => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body.error, "flash write failed");
            assert_eq!(body.detail, None);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn invalid_base_url_is_rejected_up_front() {
    let err = DeviceClient::new("not a url", None).expect_err("must reject");
    assert!(matches!(err, ClientError::InvalidUrl { .. }));
}

#[test]
fn client_is_debug_formattable() {
    // Keeps Debug on the client so test assertions can unwrap either
    // Result arm on it.
    let client = DeviceClient::new("http://192.168.1.40", None).expect("client");
    let rendered = format!("{client:?}");
    assert!(rendered.contains("http://192.168.1.40"));
}
