//! Integration tests for the stream management API.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{process_json, running_state_json, TestHarness, ACCESS_TOKEN};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

const STREAM_ID: &str = "0b7a3c2e-1d4f-4a6b-9c8d-7e6f5a4b3c2d";
const PROCESS_ID: &str = "restreamer-ui:ingest:0b7a3c2e-1d4f-4a6b-9c8d-7e6f5a4b3c2d";

async fn mount_create(h: &TestHarness) {
    Mock::given(method("POST"))
        .and(path("/api/v3/process"))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(process_json(PROCESS_ID, "Cam")))
        .mount(&h.control_plane)
        .await;
}

fn create_body() -> serde_json::Value {
    json!({"name": "  Front Door  ", "rtspUrl": "rtsp://cam.example.com:554/live"})
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_stream_returns_created() {
    let h = TestHarness::new().await;
    mount_create(&h).await;
    Mock::given(method("PUT"))
        .and(wiremock::matchers::path_regex(
            r"^/api/v3/process/restreamer-ui:ingest:[0-9a-f-]+/metadata/restreamer-ui$",
        ))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.control_plane)
        .await;

    let resp = h.post_json("/api/streams", create_body()).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert!(resp.header("x-request-id").is_some());

    let json = resp.json();
    let stream_id = json["streamId"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(stream_id).is_ok());
    assert_eq!(json["name"], "Front Door");
    assert_eq!(json["status"], "created");
    assert_eq!(
        json["hlsUrl"],
        format!("{}/memfs/{stream_id}.m3u8", h.control_plane.uri())
    );

    // The process config sent to the control plane uses the same id.
    let requests = h.control_plane.received_requests().await.unwrap();
    let create = requests
        .iter()
        .find(|r| r.method.as_str() == "POST" && r.url.path() == "/api/v3/process")
        .expect("create call");
    let config: serde_json::Value = serde_json::from_slice(&create.body).unwrap();
    assert_eq!(config["id"], format!("restreamer-ui:ingest:{stream_id}"));
    assert_eq!(config["type"], "ffmpeg");
    assert_eq!(config["input"][0]["address"], "rtsp://cam.example.com:554/live");
}

#[tokio::test]
async fn create_stream_survives_metadata_failure() {
    let h = TestHarness::new().await;
    mount_create(&h).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&h.control_plane)
        .await;

    let resp = h.post_json("/api/streams", create_body()).await;
    assert_eq!(resp.status, StatusCode::CREATED);
}

#[tokio::test]
async fn create_stream_rejects_bad_input_without_control_plane_call() {
    let h = TestHarness::new().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/process"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.control_plane)
        .await;

    let cases = [
        json!({"name": "", "rtspUrl": "rtsp://cam/live"}),
        json!({"name": "Cam", "rtspUrl": "http://cam/live"}),
        json!({"name": "Cam", "rtspUrl": "rtsp://cam/live;rm -rf /"}),
        json!({"name": "Cam", "rtspUrl": "rtsp://cam/concat:a|b"}),
        json!({"name": "x".repeat(129), "rtspUrl": "rtsp://cam/live"}),
    ];
    for body in cases {
        let resp = h.post_json("/api/streams", body.clone()).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(resp.json()["code"], "validation_error");
    }
}

#[tokio::test]
async fn create_stream_rejects_malformed_json() {
    let h = TestHarness::new().await;
    let resp = h
        .send(
            Request::post("/api/streams")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json()["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid JSON"));
}

#[tokio::test]
async fn create_stream_conflict_is_forwarded() {
    let h = TestHarness::new().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/process"))
        .respond_with(ResponseTemplate::new(409).set_body_string("process already exists"))
        .mount(&h.control_plane)
        .await;

    let resp = h.post_json("/api/streams", create_body()).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.json()["error"], "stream already exists");
}

#[tokio::test]
async fn create_stream_is_rate_limited() {
    let h = TestHarness::with_config(|c| {
        c.rate_limit.max_requests = 10;
        c.rate_limit.window_secs = 60;
    })
    .await;
    mount_create(&h).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&h.control_plane)
        .await;

    for i in 0..10 {
        let resp = h.post_json("/api/streams", create_body()).await;
        assert_eq!(resp.status, StatusCode::CREATED, "request {i}");
    }
    let resp = h.post_json("/api/streams", create_body()).await;
    assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.json()["code"], "rate_limited");

    // Reads are not rate limited.
    Mock::given(method("GET"))
        .and(path("/api/v3/process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&h.control_plane)
        .await;
    assert_eq!(h.get("/api/streams").await.status, StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_streams_filters_ingest_processes() {
    let h = TestHarness::new().await;
    let other = "restreamer-ui:ingest:11111111-2222-4333-8444-555555555555";
    Mock::given(method("GET"))
        .and(path("/api/v3/process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            process_json(PROCESS_ID, "Front Door"),
            {"id": format!("{PROCESS_ID}_snapshot")},
            {"id": "custom-process"},
            {"id": other, "reference": "Back Yard"},
        ])))
        .mount(&h.control_plane)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/process/{PROCESS_ID}/state")))
        .respond_with(ResponseTemplate::new(200).set_body_json(running_state_json()))
        .mount(&h.control_plane)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/process/{other}/state")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.control_plane)
        .await;

    let resp = h.get("/api/streams").await;
    assert_eq!(resp.status, StatusCode::OK);
    let json = resp.json();
    let streams = json.as_array().unwrap();
    assert_eq!(streams.len(), 2);

    assert_eq!(streams[0]["streamId"], STREAM_ID);
    assert_eq!(streams[0]["name"], "Front Door");
    assert_eq!(streams[0]["status"], "running");
    assert_eq!(streams[0]["runtimeSeconds"], 42);
    assert_eq!(streams[0]["fps"], 25.0);
    assert_eq!(streams[0]["memoryMb"], 50.0);

    assert_eq!(streams[1]["name"], "Back Yard");
    assert_eq!(streams[1]["status"], "unknown");
    assert!(streams[1].get("fps").is_none());
}

#[tokio::test]
async fn get_stream_combines_process_and_state() {
    let h = TestHarness::new().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/process/{PROCESS_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(process_json(PROCESS_ID, "Cam")))
        .mount(&h.control_plane)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/process/{PROCESS_ID}/state")))
        .respond_with(ResponseTemplate::new(200).set_body_json(running_state_json()))
        .mount(&h.control_plane)
        .await;

    let resp = h.get(&format!("/api/streams/{STREAM_ID}")).await;
    assert_eq!(resp.status, StatusCode::OK);
    let json = resp.json();
    assert_eq!(json["name"], "Cam");
    assert_eq!(json["bitrateKbit"], 1500.5);
    assert_eq!(json["cpuUsage"], 3.5);
}

#[tokio::test]
async fn get_unknown_stream_is_not_found() {
    let h = TestHarness::new().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("process not found"))
        .mount(&h.control_plane)
        .await;

    let resp = h.get(&format!("/api/streams/{STREAM_ID}")).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.json()["error"], "stream not found");
}

#[tokio::test]
async fn invalid_stream_id_is_rejected() {
    let h = TestHarness::new().await;
    for uri in [
        "/api/streams/not-a-uuid",
        "/api/streams/custom-process/restart",
    ] {
        let resp = if uri.ends_with("restart") {
            h.post_json(uri, json!({})).await
        } else {
            h.get(uri).await
        };
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{uri}");
    }
    assert!(h.control_plane.received_requests().await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Delete / restart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_stream_removes_process_and_snapshot() {
    let h = TestHarness::new().await;
    Mock::given(method("DELETE"))
        .and(path(format!("/api/v3/process/{PROCESS_ID}")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.control_plane)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/api/v3/process/{PROCESS_ID}_snapshot")))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&h.control_plane)
        .await;

    let resp = h
        .send(
            Request::delete(format!("/api/streams/{STREAM_ID}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert!(resp.body.is_empty());
}

#[tokio::test]
async fn restart_stream_stops_then_starts() {
    let h = TestHarness::new().await;
    let command_path = format!("/api/v3/process/{PROCESS_ID}/command");
    Mock::given(method("PUT"))
        .and(path(command_path.as_str()))
        .and(body_json(json!({"command": "stop"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.control_plane)
        .await;
    Mock::given(method("PUT"))
        .and(path(command_path.as_str()))
        .and(body_json(json!({"command": "start"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.control_plane)
        .await;

    let resp = h
        .post_json(&format!("/api/streams/{STREAM_ID}/restart"), json!({}))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "restarting");

    let commands: Vec<serde_json::Value> = h
        .control_plane
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == command_path)
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(commands, vec![json!({"command": "stop"}), json!({"command": "start"})]);
}

// ---------------------------------------------------------------------------
// Control plane failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn control_plane_rejecting_login_is_unavailable() {
    let h = TestHarness::with_config(|c| c.restreamer.password = "wrong".to_string()).await;
    // Overrides the harness login for this credential pair.
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(body_json(json!({"username": "admin", "password": "wrong"})))
        .respond_with(ResponseTemplate::new(403))
        .with_priority(1)
        .mount(&h.control_plane)
        .await;

    let resp = h.get("/api/streams").await;
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
    let json = resp.json();
    assert_eq!(json["error"], "unable to authenticate with control plane");
    assert!(!json.to_string().contains("wrong"));
    assert!(json["request_id"].is_string());
}

#[tokio::test]
async fn unreachable_control_plane_fails_at_login() {
    let h = TestHarness::with_config(|c| c.restreamer.url = "http://127.0.0.1:1".to_string()).await;
    let resp = h.get("/api/streams").await;
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!resp.json().to_string().contains("127.0.0.1"));
}

// ---------------------------------------------------------------------------
// API key and CORS
// ---------------------------------------------------------------------------

#[tokio::test]
async fn api_key_guards_stream_routes() {
    let h = TestHarness::with_config(|c| c.server.api_key = Some("k3y".to_string())).await;
    Mock::given(method("GET"))
        .and(path("/api/v3/process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&h.control_plane)
        .await;

    let resp = h.get("/api/streams").await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json(), json!({"error": "invalid or missing API key"}));

    let resp = h
        .send(
            Request::get("/api/streams")
                .header("x-api-key", "k3y")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    assert_eq!(h.get("/api/streams?apikey=k3y").await.status, StatusCode::OK);
    assert_eq!(
        h.get("/api/streams?apikey=nope").await.status,
        StatusCode::UNAUTHORIZED
    );

    // Health is never key-protected.
    assert_eq!(h.get("/health").await.status, StatusCode::OK);
}

#[tokio::test]
async fn cors_preflight_for_configured_origin() {
    let h = TestHarness::with_config(|c| {
        c.server.cors_origins = vec!["https://app.example.com".to_string()];
    })
    .await;

    let resp = h
        .send(
            Request::options("/api/streams")
                .header("origin", "https://app.example.com")
                .header("access-control-request-method", "POST")
                .header("access-control-request-headers", "content-type,x-api-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.header("access-control-allow-origin"),
        Some("https://app.example.com")
    );
    assert_eq!(resp.header("access-control-max-age"), Some("86400"));
}

#[tokio::test]
async fn request_id_is_echoed() {
    let h = TestHarness::new().await;
    let resp = h
        .send(
            Request::get("/api/streams/not-a-uuid")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(resp.header("x-request-id"), Some("abc-123"));
    assert_eq!(resp.json()["request_id"], "abc-123");
}
