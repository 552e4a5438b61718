mod common;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use common::*;
use support_relay::message::{ChatMessage, ErrorBody, Role};
use support_relay::routes::chat::REQUEST_ID_HEADER;
use support_relay::services::provider::StreamChunk;
use tower::util::ServiceExt;

fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn error_body(response: axum::response::Response) -> ErrorBody {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app(ScriptedFactory::new(Script::Hang));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_streams_deltas_in_order() {
    let (app, calls) = test_app(ScriptedFactory::new(Script::Chunks(vec![
        role_only(),
        text("Our support line "),
        text(""),
        text("is open 9–5, "),
        text("Monday to Friday."),
        finish(),
    ])));

    let response = app.oneshot(chat_request(r#"{"message": "What are your hours?"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    assert!(response.headers().get(REQUEST_ID_HEADER).is_some());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        "Our support line is open 9–5, Monday to Friday."
    );

    let creates = calls.creates();
    assert_eq!(creates.len(), 1);
    assert_eq!(
        creates[0],
        vec![
            ChatMessage::system("You are a test support bot."),
            ChatMessage::user("What are your hours?"),
        ]
    );
}

#[tokio::test]
async fn test_history_shape_is_forwarded() {
    let (app, calls) = test_app(ScriptedFactory::new(Script::Chunks(vec![text("Sure.")])));
    let body = r#"{"messages": [
        {"role": "user", "content": "I want a refund"},
        {"role": "assistant", "content": "Which order?"},
        {"role": "user", "content": "Order 42"}
    ]}"#;

    let response = app.oneshot(chat_request(body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(to_bytes(response.into_body(), usize::MAX).await.unwrap(), "Sure.");

    let creates = calls.creates();
    let sent = &creates[0];
    let roles: Vec<Role> = sent.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
    assert_eq!(sent[3].content, "Order 42");
}

#[tokio::test]
async fn test_malformed_json_never_reaches_upstream() {
    for body in ["{oops", "", "null", "[]", r#""just a string""#] {
        let (app, calls) = test_app(ScriptedFactory::new(Script::Chunks(vec![text("x")])));
        let response = app.oneshot(chat_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
        assert!(!error_body(response).await.error.is_empty());
        assert_eq!(calls.connects(), 0, "body {body:?}");
        assert!(calls.creates().is_empty());
    }
}

#[tokio::test]
async fn test_whitespace_message_is_relayed() {
    let (app, calls) = test_app(ScriptedFactory::new(Script::Chunks(vec![text("How can I help?")])));
    let response = app.oneshot(chat_request(r#"{"message": "   "}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls.creates()[0][1], ChatMessage::user("   "));
}

#[tokio::test]
async fn test_invalid_message_field() {
    for body in [
        r#"{}"#,
        r#"{"message": 7}"#,
        r#"{"message": ["hi"]}"#,
        r#"{"message": ""}"#,
        r#"{"msg": "hi"}"#,
    ] {
        let (app, calls) = test_app(ScriptedFactory::new(Script::Chunks(vec![text("x")])));
        let response = app.oneshot(chat_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        let err = error_body(response).await;
        assert_eq!(err.error, "Invalid or missing message");
        assert!(calls.creates().is_empty());
    }
}

#[tokio::test]
async fn test_service_init_failure_is_500() {
    let (app, calls) = test_app(ScriptedFactory::failing_init("GROQ_API_KEY is not set"));
    let response = app.oneshot(chat_request(r#"{"message": "hi"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let err = error_body(response).await;
    assert_eq!(err.error, "Error initializing AI service");
    assert_eq!(calls.connects(), 1);
    assert!(calls.creates().is_empty());
}

#[tokio::test]
async fn test_upstream_failure_is_502_with_details() {
    let (app, _) = test_app(ScriptedFactory::new(Script::FailBeforeStream(ProviderErrorKind::Api(
        401,
        "Invalid API Key",
    ))));
    let response = app.oneshot(chat_request(r#"{"message": "hi"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let err = error_body(response).await;
    assert_eq!(err.error, "Error generating AI response");
    assert!(err.details.unwrap().contains("Invalid API Key"));

    let (app, _) = test_app(ScriptedFactory::new(Script::FailBeforeStream(ProviderErrorKind::Network(
        "dns error",
    ))));
    let response = app.oneshot(chat_request(r#"{"message": "hi"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(error_body(response).await.details.unwrap().contains("dns error"));
}

#[tokio::test]
async fn test_hung_upstream_times_out() {
    let (app, _) = test_app(ScriptedFactory::new(Script::Hang));
    let response = app.oneshot(chat_request(r#"{"message": "hi"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let err = error_body(response).await;
    assert_eq!(err.error, "Error generating AI response");
    assert!(err.details.unwrap().contains("no response"));
}

#[tokio::test]
async fn test_mid_stream_failure_is_not_a_clean_close() {
    let (app, _) = test_app(ScriptedFactory::new(Script::Chunks(vec![
        text("Let me check"),
        Err("connection reset by peer".to_string()),
    ])));
    let response = app.oneshot(chat_request(r#"{"message": "order status?"}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(to_bytes(response.into_body(), usize::MAX).await.is_err());
}

#[tokio::test]
async fn test_stalled_stream_is_aborted() {
    let (app, _) = test_app(ScriptedFactory::new(Script::Stall(vec![StreamChunk::text("Hmm")])));
    let response = app.oneshot(chat_request(r#"{"message": "hi"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(to_bytes(response.into_body(), usize::MAX).await.is_err());
}

#[tokio::test]
async fn test_requests_are_independent() {
    let (app, calls) = test_app(ScriptedFactory::new(Script::Chunks(vec![text("one "), text("two")])));

    let (a, b) = tokio::join!(
        app.clone().oneshot(chat_request(r#"{"message": "first"}"#)),
        app.clone().oneshot(chat_request(r#"{"message": "second"}"#)),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.headers().get(REQUEST_ID_HEADER), b.headers().get(REQUEST_ID_HEADER));

    let a = to_bytes(a.into_body(), usize::MAX).await.unwrap();
    let b = to_bytes(b.into_body(), usize::MAX).await.unwrap();
    assert_eq!(a, "one two");
    assert_eq!(b, "one two");
    assert_eq!(calls.connects(), 2);

    let mut users: Vec<String> = calls.creates().iter().map(|m| m[1].content.clone()).collect();
    users.sort();
    assert_eq!(users, vec!["first", "second"]);
}
