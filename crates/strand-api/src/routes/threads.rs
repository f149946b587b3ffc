use std::str::FromStr;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use strand_persist::{Thread, ThreadOverview};

use crate::error::{ApiError, ApiResult};
use crate::middleware::identity::Identity;
use crate::state::AppState;
use crate::title;
use crate::validation;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThreadRequest {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateThreadResponse {
    pub success: bool,
    pub thread_id: String,
    pub title: String,
    pub prompt: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadResponse {
    pub thread_id: String,
    pub title: String,
    pub model: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message_preview: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListThreadsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListThreadsResponse {
    pub threads: Vec<ThreadResponse>,
    pub total: u64,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
pub struct RenameThreadRequest {
    pub title: String,
}

const PREVIEW_CHARS: usize = 100;

/// Create a thread from an opening prompt
///
/// The title is derived instantly from the prompt; a better one may replace it
/// after the first exchange.
#[utoipa::path(
    post,
    path = "/thread",
    responses(
        (status = 201, description = "Thread created"),
        (status = 400, description = "Invalid prompt"),
        (status = 429, description = "Rate limit exceeded")
    ),
    tag = "threads"
)]
pub async fn create_thread(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateThreadRequest>,
) -> ApiResult<(StatusCode, Json<CreateThreadResponse>)> {
    let prompt = validation::validate_prompt(&req.prompt)?;
    let model = req
        .model
        .unwrap_or_else(|| state.config.llm.default_model.clone());
    validation::validate_model(&model)?;

    let thread_title = title::fast_title(&prompt);
    let thread = state
        .persist
        .create_thread(identity.0, model.clone(), thread_title.clone())
        .await?;

    tracing::info!(thread_id = %thread.id.to_hex(), "Thread created");

    Ok((
        StatusCode::CREATED,
        Json(CreateThreadResponse {
            success: true,
            thread_id: thread.id.to_hex(),
            title: thread_title,
            prompt: validation::sanitize_input(&prompt),
            model,
        }),
    ))
}

/// List the caller's threads, most recently active first
#[utoipa::path(
    get,
    path = "/threads",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum number of threads to return (default: 20)"),
        ("offset" = Option<u64>, Query, description = "Number of threads to skip")
    ),
    responses(
        (status = 200, description = "List of threads")
    ),
    tag = "threads"
)]
pub async fn list_threads(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<ListThreadsQuery>,
) -> ApiResult<Json<ListThreadsResponse>> {
    let limit = query.limit.clamp(1, 100);

    let (overviews, total) = state
        .persist
        .list_threads(&identity.0, limit, query.offset)
        .await?;

    let has_more = super::has_more(query.offset, overviews.len(), total);
    let threads = overviews.into_iter().map(overview_to_response).collect();

    Ok(Json(ListThreadsResponse {
        threads,
        total,
        has_more,
    }))
}

/// Get a single thread
#[utoipa::path(
    get,
    path = "/threads/{thread_id}",
    params(
        ("thread_id" = String, Path, description = "Thread ID")
    ),
    responses(
        (status = 200, description = "Thread details"),
        (status = 404, description = "Thread not found")
    ),
    tag = "threads"
)]
pub async fn get_thread(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<ThreadResponse>> {
    let object_id = parse_thread_id(&thread_id)?;
    let thread = state.persist.get_owned_thread(object_id, &identity.0).await?;
    Ok(Json(thread_to_response(thread)))
}

/// Delete a thread and all its messages
#[utoipa::path(
    delete,
    path = "/threads/{thread_id}",
    params(
        ("thread_id" = String, Path, description = "Thread ID")
    ),
    responses(
        (status = 204, description = "Thread deleted"),
        (status = 404, description = "Thread not found")
    ),
    tag = "threads"
)]
pub async fn delete_thread(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(thread_id): Path<String>,
) -> ApiResult<StatusCode> {
    let object_id = parse_thread_id(&thread_id)?;
    state.persist.delete_thread(object_id, &identity.0).await?;

    tracing::info!(thread_id = %thread_id, "Thread deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Rename a thread
///
/// A user-chosen title is final; background title generation will not touch it.
#[utoipa::path(
    patch,
    path = "/threads/{thread_id}",
    params(
        ("thread_id" = String, Path, description = "Thread ID")
    ),
    responses(
        (status = 200, description = "Thread renamed"),
        (status = 400, description = "Invalid title"),
        (status = 404, description = "Thread not found")
    ),
    tag = "threads"
)]
pub async fn rename_thread(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(thread_id): Path<String>,
    Json(req): Json<RenameThreadRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let object_id = parse_thread_id(&thread_id)?;
    let new_title = validation::validate_title(&req.title)?;

    state
        .persist
        .rename_thread(object_id, &identity.0, &new_title)
        .await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "title": new_title,
    })))
}

pub fn parse_thread_id(thread_id: &str) -> ApiResult<ObjectId> {
    ObjectId::from_str(thread_id)
        .map_err(|_| ApiError::BadRequest("Invalid thread ID format".to_string()))
}

fn thread_to_response(thread: Thread) -> ThreadResponse {
    ThreadResponse {
        thread_id: thread.id.to_hex(),
        title: thread.title,
        model: thread.model,
        created_at: thread.created_at,
        updated_at: thread.updated_at,
        message_count: None,
        last_message_preview: None,
    }
}

fn overview_to_response(overview: ThreadOverview) -> ThreadResponse {
    let preview = overview
        .last_message
        .map(|m| m.content.chars().take(PREVIEW_CHARS).collect());

    let mut response = thread_to_response(overview.thread);
    response.message_count = Some(overview.message_count);
    response.last_message_preview = preview;
    response
}
