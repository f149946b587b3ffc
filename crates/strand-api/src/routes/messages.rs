use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use strand_persist::StoredMessage;

use crate::error::ApiResult;
use crate::middleware::identity::Identity;
use crate::routes::threads::parse_thread_id;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message_id: String,
    pub role: String,
    pub content: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub limit: i64,
    pub offset: u64,
    pub total: u64,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct ListMessagesResponse {
    pub messages: Vec<MessageResponse>,
    pub pagination: PaginationInfo,
}

/// List messages in a thread, oldest first
#[utoipa::path(
    get,
    path = "/threads/{thread_id}/messages",
    params(
        ("thread_id" = String, Path, description = "Thread ID"),
        ("limit" = Option<i64>, Query, description = "Maximum number of messages to return (default: 50)"),
        ("offset" = Option<u64>, Query, description = "Number of messages to skip")
    ),
    responses(
        (status = 200, description = "Messages in chronological order"),
        (status = 404, description = "Thread not found")
    ),
    tag = "messages"
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(thread_id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Json<ListMessagesResponse>> {
    let object_id = parse_thread_id(&thread_id)?;
    let limit = query.limit.clamp(1, 200);

    let (messages, total) = state
        .persist
        .list_thread_messages(object_id, &identity.0, limit, query.offset)
        .await?;

    let has_more = super::has_more(query.offset, messages.len(), total);
    let messages: Vec<MessageResponse> = messages.into_iter().map(message_to_response).collect();

    Ok(Json(ListMessagesResponse {
        messages,
        pagination: PaginationInfo {
            limit,
            offset: query.offset,
            total,
            has_more,
        },
    }))
}

fn message_to_response(message: StoredMessage) -> MessageResponse {
    MessageResponse {
        message_id: message.id.to_hex(),
        role: message.role.as_str().to_string(),
        content: message.content,
        model: message.model,
        reasoning: message.reasoning,
        created_at: message.created_at,
    }
}
