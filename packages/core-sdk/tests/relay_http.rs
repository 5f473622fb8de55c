//! Relay endpoint tests against a simulated upstream.
//!
//! The upstream is a wiremock server; the axum router is driven in-process.

use std::time::Duration;

use adiwiyata_core_sdk::{
    config::{RelayConfig, StaticCredential},
    relay::Relay,
    server::{router, AppState, CHAT_PATH, HEALTH_PATH},
};
use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{any, header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UPSTREAM_PATH: &str = "/openai/v1/chat/completions";
const TEST_KEY: &str = "gsk_test_key";

fn completion_body() -> Value {
    json!({
        "id": "chatcmpl-abc",
        "object": "chat.completion",
        "model": "llama-3.1-8b-instant",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "🌱 Halo! Ada yang bisa saya bantu?"},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21}
    })
}

fn relay_for(upstream_url: String, timeout: Duration) -> Relay {
    Relay::new(RelayConfig {
        upstream_url,
        timeout,
        ..RelayConfig::default()
    })
    .unwrap()
}

fn app(upstream: &MockServer, credential: StaticCredential) -> Router {
    let relay = relay_for(
        format!("{}{}", upstream.uri(), UPSTREAM_PATH),
        Duration::from_secs(5),
    );
    router(AppState::new(relay, credential), None)
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    fn assert_error(&self, status: StatusCode, label: &str) {
        assert_eq!(self.status, status, "body: {:?}", self.body);
        let body = self.json();
        assert_eq!(body["error"], json!(label));
        assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
    }

    fn assert_cors(&self) {
        let get = |name: header::HeaderName| {
            self.headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        assert_eq!(get(header::ACCESS_CONTROL_ALLOW_ORIGIN), "*");
        assert_eq!(get(header::ACCESS_CONTROL_ALLOW_METHODS), "POST, OPTIONS");
        assert_eq!(
            get(header::ACCESS_CONTROL_ALLOW_HEADERS),
            "Content-Type, Authorization"
        );
        assert_eq!(get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS), "true");
    }
}

async fn send(app: Router, method: Method, uri: &str, body: Option<String>) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    let req = builder
        .body(body.map(Body::from).unwrap_or_else(Body::empty))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    Reply {
        status,
        headers,
        body,
    }
}

async fn post_chat(app: Router, body: Value) -> Reply {
    send(app, Method::POST, CHAT_PATH, Some(body.to_string())).await
}

async fn never_called(upstream: &MockServer) {
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body()))
        .expect(0)
        .mount(upstream)
        .await;
}

async fn upstream_replies(upstream: &MockServer, template: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(UPSTREAM_PATH))
        .respond_with(template)
        .expect(1)
        .mount(upstream)
        .await;
}

async fn forwarded_body(upstream: &MockServer) -> Value {
    let requests = upstream.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    requests[0].body_json().unwrap()
}

fn hi() -> Value {
    json!({"messages": [{"role": "user", "content": "Hi"}]})
}

#[tokio::test]
async fn preflight_is_answered_without_upstream() {
    let upstream = MockServer::start().await;
    never_called(&upstream).await;

    let reply = send(
        app(&upstream, StaticCredential::missing()),
        Method::OPTIONS,
        CHAT_PATH,
        None,
    )
    .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body.is_empty());
    reply.assert_cors();
}

#[tokio::test]
async fn other_methods_are_rejected() {
    let upstream = MockServer::start().await;
    never_called(&upstream).await;

    for m in [Method::GET, Method::PUT, Method::DELETE, Method::PATCH] {
        let reply = send(
            app(&upstream, StaticCredential::new(TEST_KEY)),
            m.clone(),
            CHAT_PATH,
            Some(hi().to_string()),
        )
        .await;
        reply.assert_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
        reply.assert_cors();
    }
}

#[tokio::test]
async fn missing_credential_is_a_configuration_error() {
    let upstream = MockServer::start().await;
    never_called(&upstream).await;

    let reply = post_chat(app(&upstream, StaticCredential::missing()), hi()).await;

    reply.assert_error(StatusCode::INTERNAL_SERVER_ERROR, "Server configuration error");
    reply.assert_cors();
}

#[tokio::test]
async fn missing_or_non_array_messages_are_client_errors() {
    let upstream = MockServer::start().await;
    never_called(&upstream).await;

    for body in [
        json!({}),
        json!({"messages": null}),
        json!({"messages": "Hi"}),
        json!({"messages": {"role": "user", "content": "Hi"}}),
    ] {
        let reply = post_chat(app(&upstream, StaticCredential::new(TEST_KEY)), body).await;
        reply.assert_error(StatusCode::BAD_REQUEST, "Invalid request");
        assert_eq!(reply.json()["message"], json!("Messages array is required"));
    }

    let reply = send(
        app(&upstream, StaticCredential::new(TEST_KEY)),
        Method::POST,
        CHAT_PATH,
        Some("{\"messages\": [".to_string()),
    )
    .await;
    reply.assert_error(StatusCode::BAD_REQUEST, "Invalid request");
}

#[tokio::test]
async fn malformed_message_blocks_forwarding() {
    let upstream = MockServer::start().await;
    never_called(&upstream).await;

    for messages in [
        json!([{"content": "Hi"}]),
        json!([{"role": "user"}]),
        json!([{"role": "user", "content": ""}]),
        json!([{"role": "user", "content": "ok"}, {"role": "assistant"}]),
    ] {
        let reply = post_chat(
            app(&upstream, StaticCredential::new(TEST_KEY)),
            json!({ "messages": messages }),
        )
        .await;
        reply.assert_error(StatusCode::BAD_REQUEST, "Invalid message format");
        reply.assert_cors();
    }
}

#[tokio::test]
async fn out_of_range_parameters_are_clamped_and_model_defaulted() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPSTREAM_PATH))
        .and(header_eq("Authorization", "Bearer gsk_test_key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body()))
        .expect(1)
        .mount(&upstream)
        .await;

    let reply = post_chat(
        app(&upstream, StaticCredential::new(TEST_KEY)),
        json!({
            "messages": [{"role": "user", "content": "Hi"}],
            "temperature": 5,
            "max_tokens": -1
        }),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let sent = forwarded_body(&upstream).await;
    assert_eq!(sent["temperature"].as_f64(), Some(2.0));
    assert_eq!(sent["max_tokens"], json!(1));
    assert_eq!(sent["model"], json!("llama-3.1-8b-instant"));
    assert_eq!(sent["stream"], json!(false));
    assert_eq!(sent["messages"], json!([{"role": "user", "content": "Hi"}]));
}

#[tokio::test]
async fn low_temperature_and_high_max_tokens_are_clamped() {
    let upstream = MockServer::start().await;
    upstream_replies(
        &upstream,
        ResponseTemplate::new(200).set_body_json(completion_body()),
    )
    .await;

    post_chat(
        app(&upstream, StaticCredential::new(TEST_KEY)),
        json!({
            "messages": [{"role": "user", "content": "Hi"}],
            "model": "mixtral-8x7b-32768",
            "temperature": -5,
            "max_tokens": 5000
        }),
    )
    .await;

    let sent = forwarded_body(&upstream).await;
    assert_eq!(sent["temperature"].as_f64(), Some(0.0));
    assert_eq!(sent["max_tokens"], json!(1000));
    assert_eq!(sent["model"], json!("mixtral-8x7b-32768"));
}

#[tokio::test]
async fn full_transcript_is_forwarded_in_order() {
    let upstream = MockServer::start().await;
    upstream_replies(
        &upstream,
        ResponseTemplate::new(200).set_body_json(completion_body()),
    )
    .await;

    let messages = json!([
        {"role": "system", "content": "Anda adalah AI Adiwiyata Assistant"},
        {"role": "assistant", "content": "Halo!"},
        {"role": "user", "content": "Apa itu Adiwiyata?"}
    ]);
    post_chat(
        app(&upstream, StaticCredential::new(TEST_KEY)),
        json!({ "messages": messages, "temperature": 0.7, "max_tokens": 500 }),
    )
    .await;

    let sent = forwarded_body(&upstream).await;
    assert_eq!(sent["messages"], messages);
    assert_eq!(sent["temperature"].as_f64(), Some(0.7));
    assert_eq!(sent["max_tokens"], json!(500));
}

#[tokio::test]
async fn upstream_statuses_are_mapped() {
    let cases = [
        (401, StatusCode::INTERNAL_SERVER_ERROR, "Authentication failed"),
        (429, StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded"),
        (400, StatusCode::BAD_REQUEST, "Bad request"),
        (503, StatusCode::SERVICE_UNAVAILABLE, "Upstream API error"),
        (404, StatusCode::NOT_FOUND, "Upstream API error"),
    ];
    for (upstream_status, caller_status, label) in cases {
        let upstream = MockServer::start().await;
        upstream_replies(
            &upstream,
            ResponseTemplate::new(upstream_status).set_body_json(json!({
                "error": {"message": "upstream says no", "type": "invalid_request_error"}
            })),
        )
        .await;

        let reply = post_chat(app(&upstream, StaticCredential::new(TEST_KEY)), hi()).await;
        reply.assert_error(caller_status, label);
        reply.assert_cors();
        assert!(!String::from_utf8_lossy(&reply.body).contains("upstream says no"));
    }
}

#[tokio::test]
async fn success_without_choices_is_an_invalid_ai_response() {
    for body in [
        json!({"choices": []}),
        json!({"id": "chatcmpl-abc"}),
    ] {
        let upstream = MockServer::start().await;
        upstream_replies(&upstream, ResponseTemplate::new(200).set_body_json(body)).await;

        let reply = post_chat(app(&upstream, StaticCredential::new(TEST_KEY)), hi()).await;
        reply.assert_error(StatusCode::INTERNAL_SERVER_ERROR, "Invalid AI response");
    }
}

#[tokio::test]
async fn success_body_is_passed_through_verbatim() {
    let upstream = MockServer::start().await;
    let raw = r#"{"id":"chatcmpl-abc",  "choices":[{"index":0,"message":{"role":"assistant","content":"🌱 Halo"}}],"usage":{"total_tokens":21},"x_groq":{"id":"req_1"}}"#;
    upstream_replies(
        &upstream,
        ResponseTemplate::new(200).set_body_raw(raw, "application/json"),
    )
    .await;

    let reply = post_chat(app(&upstream, StaticCredential::new(TEST_KEY)), hi()).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(&reply.body[..], raw.as_bytes());
    assert_eq!(
        reply.headers[header::CONTENT_TYPE].to_str().unwrap(),
        "application/json"
    );
    assert_eq!(reply.json()["choices"][0]["message"]["content"], json!("🌱 Halo"));
    reply.assert_cors();
}

#[tokio::test]
async fn non_json_success_is_an_internal_error() {
    let upstream = MockServer::start().await;
    upstream_replies(
        &upstream,
        ResponseTemplate::new(200).set_body_string("<html>gateway</html>"),
    )
    .await;

    let reply = post_chat(app(&upstream, StaticCredential::new(TEST_KEY)), hi()).await;

    reply.assert_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
    assert!(!String::from_utf8_lossy(&reply.body).contains("gateway"));
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let upstream = MockServer::start().await;
    upstream_replies(
        &upstream,
        ResponseTemplate::new(200)
            .set_body_json(completion_body())
            .set_delay(Duration::from_secs(3)),
    )
    .await;

    let relay = relay_for(
        format!("{}{}", upstream.uri(), UPSTREAM_PATH),
        Duration::from_millis(200),
    );
    let app = router(AppState::new(relay, StaticCredential::new(TEST_KEY)), None);
    let reply = post_chat(app, hi()).await;

    reply.assert_error(StatusCode::REQUEST_TIMEOUT, "Request timeout");
}

#[tokio::test]
async fn unreachable_upstream_is_service_unavailable() {
    let relay = relay_for(
        "http://127.0.0.1:1/openai/v1/chat/completions".to_string(),
        Duration::from_secs(5),
    );
    let app = router(AppState::new(relay, StaticCredential::new(TEST_KEY)), None);

    let reply = post_chat(app, hi()).await;

    reply.assert_error(StatusCode::SERVICE_UNAVAILABLE, "Service unavailable");
    reply.assert_cors();
}

#[tokio::test]
async fn health_reports_credential_presence_only() {
    let upstream = MockServer::start().await;
    never_called(&upstream).await;

    let reply = send(
        app(&upstream, StaticCredential::new(TEST_KEY)),
        Method::GET,
        HEALTH_PATH,
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    let body = reply.json();
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["credential_configured"], json!(true));
    assert_eq!(body["model"], json!("llama-3.1-8b-instant"));
    assert!(!String::from_utf8_lossy(&reply.body).contains(TEST_KEY));
    reply.assert_cors();

    let reply = send(
        app(&upstream, StaticCredential::missing()),
        Method::GET,
        HEALTH_PATH,
        None,
    )
    .await;
    assert_eq!(reply.json()["credential_configured"], json!(false));
}

#[tokio::test]
async fn oversized_body_gets_a_json_client_error() {
    let upstream = MockServer::start().await;
    never_called(&upstream).await;

    let huge = json!({
        "messages": [{"role": "user", "content": "a".repeat(3 * 1024 * 1024)}]
    });
    let reply = post_chat(app(&upstream, StaticCredential::new(TEST_KEY)), huge).await;

    reply.assert_error(StatusCode::BAD_REQUEST, "Invalid request");
    assert_eq!(
        reply.json()["message"],
        json!("Request body is too large or could not be read")
    );
    reply.assert_cors();
}
