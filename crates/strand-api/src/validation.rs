use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ApiError, ApiResult};

pub const MAX_PROMPT_CHARS: usize = 5_000;
pub const MAX_MESSAGE_CHARS: usize = 50_000;
pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_MODEL_CHARS: usize = 100;
pub const MAX_HISTORY_MESSAGES: usize = 1_000;

/// Bound the number of history messages a single chat submission may carry.
pub fn validate_history_len(count: usize) -> ApiResult<()> {
    if count == 0 {
        return Err(ApiError::BadRequest(
            "messages must not be empty".to_string(),
        ));
    }
    if count > MAX_HISTORY_MESSAGES {
        return Err(ApiError::BadRequest(format!(
            "messages must contain at most {} entries",
            MAX_HISTORY_MESSAGES
        )));
    }
    Ok(())
}

/// Validate the thread-creation prompt. Returns the trimmed prompt.
pub fn validate_prompt(prompt: &str) -> ApiResult<String> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_PROMPT_CHARS {
        return Err(ApiError::BadRequest(format!(
            "prompt must be at most {} characters",
            MAX_PROMPT_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate chat message content. Trailing whitespace is preserved because the
/// content must match what the client streams and retries byte for byte.
pub fn validate_message_content(content: &str) -> ApiResult<()> {
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "message content must not be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "message content must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(())
}

pub fn validate_model(model: &str) -> ApiResult<()> {
    if model.trim().is_empty() {
        return Err(ApiError::BadRequest("model must not be empty".to_string()));
    }
    if model.chars().count() > MAX_MODEL_CHARS {
        return Err(ApiError::BadRequest(format!(
            "model must be at most {} characters",
            MAX_MODEL_CHARS
        )));
    }
    Ok(())
}

/// Validate a user-supplied thread title. Returns the trimmed title.
pub fn validate_title(title: &str) -> ApiResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "title must be at most {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

fn script_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script>").unwrap())
}

fn js_scheme_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)javascript:").unwrap())
}

fn event_handler_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bon\w+\s*=").unwrap())
}

/// Strip the obvious injection vectors from text that gets echoed back to
/// clients. Storage keeps the original; only echoed copies are sanitized.
pub fn sanitize_input(input: &str) -> String {
    let cleaned = script_tag_re().replace_all(input, "");
    let cleaned = js_scheme_re().replace_all(&cleaned, "");
    let cleaned = event_handler_re().replace_all(&cleaned, "");
    cleaned.trim().to_string()
}
