//! HTTP API tests driven through the axum router.

mod helpers;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use phoenix_board::adapters::http::BoardHttpServer;
use phoenix_board::domain::models::{Config, ServerConfig};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use helpers::board::coordinator;
use helpers::database::setup_test_db;

async fn app_with(config: Config) -> Router {
    let pool = setup_test_db().await;
    BoardHttpServer::new(coordinator(pool, &config), ServerConfig::default()).router()
}

async fn app() -> Router {
    app_with(Config::default()).await
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_as(app, method, uri, body, None).await
}

async fn send_as(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    client_id: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(client) = client_id {
        builder = builder.header("x-client-id", client);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create_agent(app: &Router, codename: &str) -> Uuid {
    let (status, body) = send(
        app,
        "POST",
        "/agents/create",
        Some(json!({
            "codename": codename,
            "team": "alpha_delta",
            "role": "data_miner",
            "specialization": ["extraction"],
            "models_access": ["local"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["agent_id"].as_str().unwrap().parse().unwrap()
}

async fn create_task(app: &Router, title: &str, priority: i64, reward: f64) -> Uuid {
    let (status, body) = send(
        app,
        "POST",
        "/tasks/create",
        Some(json!({
            "title": title,
            "description": "from http test",
            "category": "testing",
            "priority": priority,
            "dopamine_reward": reward
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["task_id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn test_banner_and_health() {
    let app = app().await;

    let (status, body) = send(&app, "GET", "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "operational", "system": "Phoenix Task Board"}));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_register_then_refresh() {
    let app = app().await;
    let id = create_agent(&app, "Alpha-1").await;

    let (status, body) = send(
        &app,
        "POST",
        "/agents/create",
        Some(json!({"codename": "Alpha-1", "team": "iota", "role": "lead"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "refreshed");
    assert_eq!(body["agent_id"], id.to_string());
    assert_eq!(body["dopamine_level"], 1.0);

    let (status, body) = send(&app, "GET", "/agents/list", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["agents"][0]["team"], "iota");
    assert_eq!(body["agents"][0]["fibonacci_level"], 1);
    assert_eq!(body["agents"][0]["hormone_levels"]["dopamine"], 1.0);
}

#[tokio::test]
async fn test_invalid_input_is_400() {
    let app = app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/tasks/create",
        Some(json!({"title": "T", "description": "D", "category": "C", "priority": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, "POST", "/agents/create", Some(json!({"codename": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = send(&app, "GET", "/tasks/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/tasks/hot?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_claim_and_complete_flow() {
    let app = app().await;
    let alpha1 = create_agent(&app, "Alpha-1").await;
    let alpha2 = create_agent(&app, "Alpha-2").await;
    let task = create_task(&app, "Extract", 8, 2.5).await;

    let claim_uri = format!("/tasks/{task}/claim");
    let (status, body) = send(&app, "POST", &claim_uri, Some(json!({"agent_id": alpha1}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "claimed");
    assert_eq!(body["agent"], "Alpha-1");
    assert_eq!(body["dopamine_boost"], 0.2);
    assert_eq!(body["reward_on_completion"], 2.5);

    let (status, body) = send(&app, "POST", &claim_uri, Some(json!({"agent_id": alpha2}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let complete_uri = format!("/tasks/{task}/complete");
    let (status, body) = send(
        &app,
        "POST",
        &complete_uri,
        Some(json!({"agent_id": alpha2, "output": {"rows": 1}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "NOT_ASSIGNED");

    let (status, body) = send(
        &app,
        "POST",
        &complete_uri,
        Some(json!({"agent_id": alpha1, "output": {"rows": 42}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "complete");
    assert_eq!(body["dopamine_reward"], 2.5);
    assert!((body["total_boost"].as_f64().unwrap() - 2.7).abs() < 1e-9);
    assert!((body["dopamine_level"].as_f64().unwrap() - 3.7).abs() < 1e-9);
    assert_eq!(body["tasks_completed"], 1);

    let (status, body) = send(&app, "POST", &complete_uri, Some(json!({"agent_id": alpha1}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");

    let (status, body) = send(&app, "GET", &format!("/tasks/{task}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "complete");
    assert_eq!(body["output"], json!({"rows": 42}));
}

#[tokio::test]
async fn test_unknown_ids_are_404() {
    let app = app().await;
    let agent = create_agent(&app, "Alpha-1").await;
    let task = create_task(&app, "Real", 5, 1.0).await;
    let ghost = Uuid::new_v4();

    let (status, body) = send(&app, "POST", &format!("/tasks/{ghost}/claim"), Some(json!({"agent_id": agent}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "TASK_NOT_FOUND");

    let (status, body) = send(&app, "POST", &format!("/tasks/{task}/claim"), Some(json!({"agent_id": ghost}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "AGENT_NOT_FOUND");

    let (status, _) = send(&app, "GET", &format!("/agents/{ghost}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/tasks/{ghost}/complete"),
        Some(json!({"agent_id": agent, "output": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "TASK_NOT_FOUND");
}

#[tokio::test]
async fn test_hot_tasks_listing() {
    let app = app().await;
    create_task(&app, "Low", 1, 0.0).await;
    create_task(&app, "High", 9, 1.0).await;
    create_task(&app, "Mid", 5, 0.5).await;

    let (status, body) = send(&app, "GET", "/tasks/hot?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["tasks"][0]["title"], "High");
    assert_eq!(body["tasks"][1]["title"], "Mid");

    let (_, body) = send(&app, "GET", "/tasks/hot", None).await;
    assert_eq!(body["count"], 3);

    let (status, body) = send(&app, "GET", "/tasks/hot?limit=500", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
}

#[tokio::test]
async fn test_rate_limited_requests_get_429() {
    let mut config = Config::default();
    config.rate_limit.requests_per_minute = 2;
    let app = app_with(config).await;

    for _ in 0..2 {
        let (status, _) = send_as(&app, "GET", "/agents/list", None, Some("gateway-1")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let request = Request::builder()
        .uri("/agents/list")
        .header("x-client-id", "gateway-1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=60).contains(&retry_after));

    // Other identities and other operations have their own quota
    let (status, _) = send_as(&app, "GET", "/agents/list", None, Some("gateway-2")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send_as(&app, "GET", "/tasks/hot", None, Some("gateway-1")).await;
    assert_eq!(status, StatusCode::OK);
}
