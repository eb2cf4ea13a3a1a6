use std::fs;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::{TempDir, tempdir};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "/api/genai/send_message";

fn text_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/plain; charset=utf-8")
        .set_body_string(body)
}

/// A command isolated from the user's config and environment.
fn learnsmart(home: &TempDir, server: &MockServer) -> Command {
    let mut cmd = cargo_bin_cmd!("learnsmart");
    cmd.env("LEARNSMART_HOME", home.path())
        .env_remove("LEARNSMART_BASE_URL")
        .env_remove("LEARNSMART_TOKEN")
        .env_remove("LEARNSMART_DEBUG_TRACE")
        .env_remove("LEARNSMART_LOG")
        .args(["--base-url", &server.uri()]);
    cmd
}

#[tokio::test]
async fn test_ask_prints_sanitized_html() {
    let server = MockServer::start().await;
    let home = tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_json(serde_json::json!({ "prompt": "Explain Rust" })))
        .respond_with(text_response("Hello **world**"))
        .expect(1)
        .mount(&server)
        .await;

    learnsmart(&home, &server)
        .args(["ask", "--prompt", "Explain Rust"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<strong>world</strong>"))
        .stdout(predicate::str::contains("**").not());
}

#[tokio::test]
async fn test_ask_sends_prompt_unchanged() {
    let server = MockServer::start().await;
    let home = tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_json(serde_json::json!({ "prompt": "  indented\n  code " })))
        .respond_with(text_response("ok"))
        .expect(1)
        .mount(&server)
        .await;

    learnsmart(&home, &server)
        .args(["ask", "--prompt", "  indented\n  code "])
        .assert()
        .success();
}

#[tokio::test]
async fn test_ask_rejects_blank_prompt() {
    let server = MockServer::start().await;
    let home = tempdir().unwrap();

    Mock::given(method("POST"))
        .respond_with(text_response("unused"))
        .expect(0)
        .mount(&server)
        .await;

    learnsmart(&home, &server)
        .args(["ask", "--prompt", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Prompt must not be empty"));
}

#[tokio::test]
async fn test_ask_raw_prints_markdown() {
    let server = MockServer::start().await;
    let home = tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(text_response("Hello **world**"))
        .mount(&server)
        .await;

    learnsmart(&home, &server)
        .args(["ask", "--prompt", "hi", "--raw"])
        .assert()
        .success()
        .stdout(predicate::str::diff("Hello **world**\n"));
}

#[tokio::test]
async fn test_ask_strips_script_and_handlers() {
    let server = MockServer::start().await;
    let home = tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(text_response(
            "Safe text\n\n<script>alert(1)</script>\n\n<img src=x onerror=alert(1)>",
        ))
        .mount(&server)
        .await;

    learnsmart(&home, &server)
        .args(["ask", "--prompt", "hi", "--policy", "incremental"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Safe text"))
        .stdout(predicate::str::contains("<script").not())
        .stdout(predicate::str::contains("onerror").not());
}

#[tokio::test]
async fn test_ask_sends_bearer_token() {
    let server = MockServer::start().await;
    let home = tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(text_response("authorized"))
        .expect(1)
        .mount(&server)
        .await;

    learnsmart(&home, &server)
        .args(["ask", "--prompt", "hi", "--token", "s3cret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("authorized"));
}

#[tokio::test]
async fn test_ask_http_error_reports_detail() {
    let server = MockServer::start().await;
    let home = tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({ "detail": "Chat not found." })),
        )
        .mount(&server)
        .await;

    learnsmart(&home, &server)
        .args(["ask", "--prompt", "hi"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("learnsmart-error"))
        .stderr(predicate::str::contains("HTTP 404: Chat not found."));
}

#[tokio::test]
async fn test_ask_writes_output_file() {
    let server = MockServer::start().await;
    let home = tempdir().unwrap();
    let output = home.path().join("answer.html");

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(text_response("# Title\n\nBody"))
        .mount(&server)
        .await;

    learnsmart(&home, &server)
        .args(["ask", "--prompt", "hi", "--output", output.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let html = fs::read_to_string(&output).unwrap();
    assert_eq!(html, "<h1>Title</h1>\n<p>Body</p>\n");
}

#[tokio::test]
async fn test_ask_uses_configured_endpoint() {
    let server = MockServer::start().await;
    let home = tempdir().unwrap();
    fs::write(
        home.path().join("config.toml"),
        "endpoint = \"/api/custom/ask\"\n",
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path("/api/custom/ask"))
        .respond_with(text_response("custom"))
        .expect(1)
        .mount(&server)
        .await;

    learnsmart(&home, &server)
        .args(["ask", "--prompt", "hi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<p>custom</p>"));
}

#[tokio::test]
async fn test_chat_answers_each_line() {
    let server = MockServer::start().await;
    let home = tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(text_response("Chat *reply*"))
        .expect(1)
        .mount(&server)
        .await;

    learnsmart(&home, &server)
        .args(["chat"])
        .write_stdin("hello\n:q\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("<em>reply</em>"))
        .stdout(predicate::str::contains("Goodbye!"));
}
