use axum::http::StatusCode;
use axum::response::IntoResponse;

use strand_api::error::ApiError;
use strand_api::handlers::chat::{ChatRequestBody, STOP_MARKER};

#[tokio::test]
async fn test_bad_request_response() {
    let error = ApiError::BadRequest("prompt must not be empty".to_string());
    let response = error.into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_thread_not_found_response() {
    let response = ApiError::ThreadNotFound.into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unauthorized_response() {
    let response = ApiError::Unauthorized.into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[test]
fn test_chat_body_accepts_camel_case() {
    let body: ChatRequestBody = serde_json::from_str(
        r#"{
            "threadId": "65f000000000000000000001",
            "model": "openai/gpt-4o-mini",
            "messages": [{"role": "user", "content": "hi", "id": "m1"}],
            "isPartial": false
        }"#,
    )
    .unwrap();

    assert_eq!(body.thread_id, "65f000000000000000000001");
    assert!(!body.is_partial);
    assert_eq!(body.messages.len(), 1);
    assert_eq!(body.messages[0].role, "user");
}

#[test]
fn test_chat_body_partial_save_shape() {
    let body: ChatRequestBody = serde_json::from_str(&format!(
        r#"{{
            "threadId": "65f000000000000000000001",
            "isPartial": true,
            "partialContent": "Hello world{}"
        }}"#,
        "\\n\\n(Stopped by User)"
    ))
    .unwrap();

    assert!(body.is_partial);
    let content = body.partial_content.unwrap();
    assert!(content.ends_with(STOP_MARKER));
}
