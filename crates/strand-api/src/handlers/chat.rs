use axum::{
    extract::{Extension, State},
    response::{sse::Sse, IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use strand_llm::{supports_reasoning, ChatOptions, ChatRequest, Message};
use strand_persist::MessageRole;

use crate::error::{ApiError, ApiResult};
use crate::middleware::identity::Identity;
use crate::relay;
use crate::routes::threads::parse_thread_id;
use crate::state::AppState;
use crate::title;
use crate::validation;

/// Appended to the assistant text when the client cut the stream off.
pub const STOP_MARKER: &str = "\n\n(Stopped by User)";

const SSE_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    pub thread_id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
    #[serde(default)]
    pub is_partial: bool,
    #[serde(default)]
    pub partial_content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// Send a message and stream the assistant response over SSE
///
/// With `isPartial` set, nothing is streamed: the supplied partial content is
/// stored as an assistant message and a JSON acknowledgement is returned.
#[utoipa::path(
    post,
    path = "/chat",
    responses(
        (status = 200, description = "SSE stream, or JSON acknowledgement on the partial path", content_type = "text/event-stream"),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Thread not found"),
        (status = 429, description = "Rate limit exceeded")
    ),
    tag = "chat"
)]
pub async fn chat(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ChatRequestBody>,
) -> ApiResult<Response> {
    let thread_id = parse_thread_id(&req.thread_id)?;
    let model = req
        .model
        .clone()
        .unwrap_or_else(|| state.config.llm.default_model.clone());
    validation::validate_model(&model)?;

    let user_id = identity.0;

    if req.is_partial {
        return save_partial(state, thread_id, &user_id, req, model).await;
    }

    validation::validate_history_len(req.messages.len())?;
    let history = build_history(&req.messages)?;

    let thread = state.persist.get_owned_thread(thread_id, &user_id).await?;

    // Persist the trailing user message. A storage failure here is logged and
    // the stream proceeds; the client keeps its local copy either way.
    let trailing_user = trailing_user_content(&req.messages);
    if let Some(content) = &trailing_user {
        if let Err(e) = state
            .persist
            .upsert_message(thread_id, &user_id, MessageRole::User, content, &model, None)
            .await
        {
            tracing::warn!(
                thread_id = %thread_id.to_hex(),
                "Failed to persist user message, continuing: {}",
                e
            );
        }
    }

    let reasoning = supports_reasoning(&model);
    let request = ChatRequest::new(model.clone(), history).with_options(
        ChatOptions::new()
            .temperature(state.config.llm.temperature)
            .reasoning(reasoning),
    );

    let provider_stream = state.llm_client.chat_stream(request).await?;

    let (tx, rx) = mpsc::channel(SSE_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();

    let task_state = state.clone();
    let title_seed = trailing_user.clone().unwrap_or_default();
    let title_provisional = thread.title_provisional;

    tokio::spawn(async move {
        let outcome = relay::run(provider_stream, tx, cancel).await;

        if outcome.errored {
            // Provider failures do not leave half an answer behind.
            return;
        }
        if outcome.text.is_empty() {
            return;
        }

        let mut content = outcome.text;
        if outcome.aborted {
            content.push_str(STOP_MARKER);
        }
        let reasoning = (!outcome.reasoning.is_empty()).then_some(outcome.reasoning.as_str());

        if let Err(e) = task_state
            .persist
            .upsert_message(
                thread_id,
                &user_id,
                MessageRole::Assistant,
                &content,
                &model,
                reasoning,
            )
            .await
        {
            tracing::error!(
                thread_id = %thread_id.to_hex(),
                "Failed to persist assistant message: {}",
                e
            );
            return;
        }

        maybe_generate_title(task_state, thread_id, title_provisional, &title_seed, &content)
            .await;
    });

    let stream = ReceiverStream::new(rx);
    Ok(Sse::new(stream).into_response())
}

async fn save_partial(
    state: AppState,
    thread_id: mongodb::bson::oid::ObjectId,
    user_id: &str,
    req: ChatRequestBody,
    model: String,
) -> ApiResult<Response> {
    let content = req
        .partial_content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest("partialContent is required when isPartial is set".to_string())
        })?;
    validation::validate_message_content(&content)?;

    // Stored verbatim; the client already appended any stop marker it wants.
    let message = state
        .persist
        .create_message(
            thread_id,
            user_id,
            MessageRole::Assistant,
            content,
            model,
            None,
        )
        .await?;

    tracing::info!(
        thread_id = %thread_id.to_hex(),
        message_id = %message.id.to_hex(),
        "Partial response saved"
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "messageId": message.id.to_hex(),
    }))
    .into_response())
}

/// Map incoming role-tagged messages onto the provider wire types. Rejects the
/// first message with an unknown role or out-of-bounds content.
fn build_history(messages: &[IncomingMessage]) -> ApiResult<Vec<Message>> {
    let mut history = Vec::with_capacity(messages.len());

    for (idx, msg) in messages.iter().enumerate() {
        if msg.content.is_empty() {
            return Err(ApiError::BadRequest(format!(
                "messages[{}].content must not be empty",
                idx
            )));
        }
        if msg.content.chars().count() > validation::MAX_MESSAGE_CHARS {
            return Err(ApiError::BadRequest(format!(
                "messages[{}].content must be at most {} characters",
                idx,
                validation::MAX_MESSAGE_CHARS
            )));
        }

        let message = match msg.role.as_str() {
            "system" => Message::system(msg.content.clone()),
            "user" => Message::human(msg.content.clone()),
            "assistant" => Message::ai(msg.content.clone()),
            other => {
                return Err(ApiError::BadRequest(format!(
                    "messages[{}].role '{}' is not one of system, user, assistant",
                    idx, other
                )))
            }
        };
        history.push(message);
    }

    Ok(history)
}

/// Content of the final message when it is a non-blank user turn.
fn trailing_user_content(messages: &[IncomingMessage]) -> Option<String> {
    messages
        .last()
        .filter(|m| m.role == "user" && !m.content.trim().is_empty())
        .map(|m| m.content.clone())
}

/// After the opening exchange, replace the deterministic title with a
/// model-generated one. Runs on the already-detached persistence task; every
/// failure is logged and swallowed.
async fn maybe_generate_title(
    state: AppState,
    thread_id: mongodb::bson::oid::ObjectId,
    title_provisional: bool,
    user_content: &str,
    assistant_content: &str,
) {
    if !title_provisional {
        return;
    }

    let count = match state.persist.count_messages(thread_id).await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!("Failed to count messages for title generation: {}", e);
            return;
        }
    };
    if count != 2 {
        return;
    }

    let generated = title::generate_title(
        state.llm_client.as_ref(),
        &state.config.llm.title_model,
        user_content,
        assistant_content,
    )
    .await;

    match state.persist.set_generated_title(thread_id, &generated).await {
        Ok(true) => {
            tracing::info!(thread_id = %thread_id.to_hex(), title = %generated, "Thread title generated");
        }
        Ok(false) => {
            // The user renamed the thread first; their title wins.
        }
        Err(e) => {
            tracing::warn!("Failed to store generated title: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(role: &str, content: &str) -> IncomingMessage {
        IncomingMessage {
            role: role.to_string(),
            content: content.to_string(),
            id: None,
        }
    }

    #[test]
    fn test_build_history_maps_roles() {
        let history = build_history(&[
            msg("system", "be brief"),
            msg("user", "hi"),
            msg("assistant", "hello"),
        ])
        .unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role(), "system");
        assert_eq!(history[1].role(), "user");
        assert_eq!(history[2].role(), "assistant");
    }

    #[test]
    fn test_build_history_rejects_unknown_role() {
        let err = build_history(&[msg("tool", "output")]).unwrap_err();
        match err {
            ApiError::BadRequest(message) => assert!(message.contains("messages[0].role")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_build_history_rejects_oversized_content() {
        let big = "x".repeat(validation::MAX_MESSAGE_CHARS + 1);
        let err = build_history(&[msg("user", &big)]).unwrap_err();
        match err {
            ApiError::BadRequest(message) => assert!(message.contains("messages[0].content")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_trailing_user_content_requires_user_last() {
        assert_eq!(
            trailing_user_content(&[msg("user", "question")]),
            Some("question".to_string())
        );
        assert_eq!(
            trailing_user_content(&[msg("user", "q"), msg("assistant", "a")]),
            None
        );
        assert_eq!(trailing_user_content(&[msg("user", "   ")]), None);
    }

    #[test]
    fn test_stop_marker_shape() {
        let mut content = "Hello world".to_string();
        content.push_str(STOP_MARKER);
        assert_eq!(content, "Hello world\n\n(Stopped by User)");
    }
}
