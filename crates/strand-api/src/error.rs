use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use strand_persist::PersistError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Thread not found")]
    ThreadNotFound,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited {
        retry_after_secs: u64,
        reset_epoch_secs: u64,
    },

    #[error("Storage error: {0}")]
    Persist(PersistError),

    #[error("Provider error: {0}")]
    Provider(#[from] anyhow::Error),

    #[error("Internal server error")]
    Internal,
}

impl From<PersistError> for ApiError {
    fn from(err: PersistError) -> Self {
        match err {
            // Foreign-owned threads answer exactly like missing ones so that
            // thread ids cannot be probed for existence.
            PersistError::ThreadNotFound(_) | PersistError::Ownership(_) => Self::ThreadNotFound,
            PersistError::Validation(msg) => Self::BadRequest(msg),
            PersistError::InvalidObjectId(_) => {
                Self::BadRequest("Invalid thread ID format".to_string())
            }
            other => Self::Persist(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::ThreadNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            ApiError::Persist(e) => {
                tracing::error!("Persistence error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
            ApiError::Provider(e) => {
                tracing::error!("Provider error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Upstream provider error".to_string(),
                )
            }
            ApiError::Internal => {
                tracing::error!("Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": message }));
        let mut response = (status, body).into_response();

        if let ApiError::RateLimited {
            retry_after_secs,
            reset_epoch_secs,
        } = self
        {
            let headers = response.headers_mut();
            if let Ok(v) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                headers.insert(header::RETRY_AFTER, v);
            }
            let reset = crate::middleware::rate_limit::format_reset(reset_epoch_secs);
            if let Ok(v) = HeaderValue::from_str(&reset) {
                headers.insert("x-ratelimit-reset", v);
            }
            headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        }

        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
