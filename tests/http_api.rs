use agentkit::{
    config::Config,
    server::{build_state, create_router},
};
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

const ECHO: &str = r#"function run_workflow(input) return "Echo: " .. input.input_as_text end"#;

const SLOW: &str = r#"
function run_workflow(input)
  local started = os.clock()
  while os.clock() - started < 0.5 do end
  return "Echo: " .. input.input_as_text
end
"#;

fn app() -> (TempDir, Router) {
    let dir = tempdir().expect("tempdir");
    let mut config = Config::default();
    config.storage.data_dir = dir.path().join("data");
    config.chat.accepted_extensions = vec![".lua".to_string(), ".txt".to_string()];
    config.chat.commands_file = None;
    config.chat.transcript_limit = 100;

    let router = create_router(build_state(&config));
    (dir, router)
}

async fn request(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder().method(method).uri(uri);
    request(app, req.body(Body::empty()).expect("request")).await
}

async fn upload(
    app: &Router,
    method: Method,
    uri: &str,
    source: &'static str,
) -> (StatusCode, Value) {
    let req = Request::builder().method(method).uri(uri);
    request(app, req.body(Body::from(source)).expect("request")).await
}

async fn chat(app: &Router, text: &str) -> Value {
    let req = Request::post("/api/chat/messages")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "text": text }).to_string()))
        .expect("request");

    let (status, value) = request(app, req).await;
    assert_eq!(status, StatusCode::OK);
    value
}

fn reply_texts(turn: &Value) -> Vec<String> {
    turn["replies"]
        .as_array()
        .expect("replies")
        .iter()
        .map(|m| m["text"].as_str().expect("text").to_string())
        .collect()
}

#[tokio::test]
async fn health_check_answers_ok() {
    let (_dir, app) = app();
    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).expect("request"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn chat_upload_name_and_talk_over_http() {
    let (_dir, app) = app();

    chat(&app, "/upload").await;

    let (status, turn) = upload(&app, Method::POST, "/api/chat/documents/echo.lua", ECHO).await;
    assert_eq!(status, StatusCode::OK);
    assert!(reply_texts(&turn)[0].contains("File received"));

    let turn = chat(&app, "echo").await;
    assert!(reply_texts(&turn)[0].contains("created and activated"));

    let turn = chat(&app, "hi").await;
    assert_eq!(reply_texts(&turn), vec!["🔄 *[echo]*\n\nEcho: hi".to_string()]);
    assert_eq!(turn["replies"][0]["edited"], json!(true));

    let (status, transcript) = call(&app, Method::GET, "/api/chat/messages").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(transcript["messages"].as_array().expect("messages").len(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_chat_turns_keep_their_replies_apart() {
    let (_dir, app) = app();
    let (status, _) = upload(&app, Method::PUT, "/api/workflows/slow", SLOW).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(&app, Method::POST, "/api/workflows/slow/activate").await;
    assert_eq!(status, StatusCode::OK);

    let (slow_turn, listing_turn) = tokio::join!(chat(&app, "hi"), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        chat(&app, "/workflows").await
    });

    assert_eq!(reply_texts(&slow_turn), vec!["🔄 *[slow]*\n\nEcho: hi".to_string()]);

    let listing = reply_texts(&listing_turn);
    assert_eq!(listing.len(), 1);
    assert!(listing[0].starts_with("📋 *Your Workflows:*"));
}

#[tokio::test]
async fn workflow_crud_endpoints() {
    let (_dir, app) = app();

    let (status, listing) = call(&app, Method::GET, "/api/workflows").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing, json!({ "active": null, "workflows": [] }));

    let (status, created) = upload(&app, Method::PUT, "/api/workflows/echo", ECHO).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["message"], json!("Workflow 'echo' created successfully"));

    let (status, updated) = upload(&app, Method::PUT, "/api/workflows/echo", ECHO).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["message"], json!("Workflow 'echo' updated successfully"));

    let (status, record) = call(&app, Method::GET, "/api/workflows/echo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["name"], json!("echo"));
    assert!(record["file_path"].as_str().expect("path").ends_with("echo.lua"));

    let (status, _) = call(&app, Method::POST, "/api/workflows/echo/activate").await;
    assert_eq!(status, StatusCode::OK);

    let (_, listing) = call(&app, Method::GET, "/api/workflows").await;
    assert_eq!(listing["active"], json!("echo"));

    let (status, _) = call(&app, Method::DELETE, "/api/workflows/echo").await;
    assert_eq!(status, StatusCode::OK);

    let (_, listing) = call(&app, Method::GET, "/api/workflows").await;
    assert_eq!(listing, json!({ "active": null, "workflows": [] }));
}

#[tokio::test]
async fn workflow_endpoints_report_failures() {
    let (_dir, app) = app();

    let (status, _) = call(&app, Method::GET, "/api/workflows/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::POST, "/api/workflows/ghost/activate").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::DELETE, "/api/workflows/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = upload(&app, Method::PUT, "/api/workflows/Bad-Name", ECHO).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let broken = "function helper() end";
    let (status, _) = upload(&app, Method::PUT, "/api/workflows/broken", broken).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, listing) = call(&app, Method::GET, "/api/workflows").await;
    assert_eq!(listing["workflows"], json!([]));
}
