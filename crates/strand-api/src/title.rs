use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use strand_llm::{ChatClient, ChatOptions, ChatRequest, Message};
use strand_persist::DEFAULT_TITLE;

// 47 content chars + the 3-char ellipsis keeps every title within 50.
const TITLE_MAX: usize = 47;
const FALLBACK_TITLE_MAX: usize = 30;

fn question_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?:how do i|how can i|how to|what is|what are|what's|why does|why is|when should|where can|can you|could you)\s+(.{3,60})",
        )
        .unwrap()
    })
}

fn command_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(create|build|write|make|generate|explain|fix|debug|implement|refactor|review)\s+(.{3,60})",
        )
        .unwrap()
    })
}

fn intent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^i (?:want|need|am trying) to\s+(.{3,60})").unwrap())
}

/// Instant title from the first prompt, no model call.
///
/// Pulls the topic out of common question and command openers; otherwise uses
/// the prompt itself. Falls back to the default title when nothing usable
/// survives cleanup.
pub fn fast_title(prompt: &str) -> String {
    let prompt = prompt.trim();

    let candidate = if let Some(caps) = question_re().captures(prompt) {
        caps[1].to_string()
    } else if let Some(caps) = command_re().captures(prompt) {
        format!("{} {}", &caps[1], &caps[2])
    } else if let Some(caps) = intent_re().captures(prompt) {
        caps[1].to_string()
    } else {
        prompt.to_string()
    };

    let cleaned = clean_title_text(&candidate);
    if cleaned.chars().count() <= 3 {
        return DEFAULT_TITLE.to_string();
    }

    truncate_with_ellipsis(&capitalize(&cleaned), TITLE_MAX)
}

/// Model-generated title from the opening exchange.
///
/// Any provider failure degrades to [`fallback_title`]; the thread always ends
/// up with something displayable.
pub async fn generate_title(
    client: &dyn ChatClient,
    model: &str,
    user_content: &str,
    assistant_content: &str,
) -> String {
    let excerpt_user: String = user_content.chars().take(500).collect();
    let excerpt_assistant: String = assistant_content.chars().take(500).collect();

    let request = ChatRequest::new(
        model.to_string(),
        vec![
            Message::system(
                "Generate a short title (5 to 7 words) for this conversation. \
                 Reply with the title only, no quotes, no punctuation at the end.",
            ),
            Message::human(format!(
                "User: {}\n\nAssistant: {}",
                excerpt_user, excerpt_assistant
            )),
        ],
    )
    .with_options(ChatOptions::new().temperature(0.3).max_tokens(32));

    match client.chat(request).await {
        Ok(response) => {
            let title = response
                .content
                .as_deref()
                .map(clean_generated_title)
                .unwrap_or_default();
            if title.is_empty() {
                fallback_title(user_content, assistant_content)
            } else {
                title
            }
        }
        Err(e) => {
            warn!("Title generation failed, using fallback: {}", e);
            fallback_title(user_content, assistant_content)
        }
    }
}

/// Last resort: a prefix of the opening exchange.
pub fn fallback_title(user_content: &str, assistant_content: &str) -> String {
    let combined = format!("{} {}", user_content.trim(), assistant_content.trim());
    let cleaned = clean_title_text(&combined);
    if cleaned.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    truncate_with_ellipsis(&capitalize(&cleaned), FALLBACK_TITLE_MAX)
}

fn clean_title_text(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let strip = RE.get_or_init(|| Regex::new(r"[^\w\s\-.,!?]").unwrap());

    let stripped = strip.replace_all(text, "");
    let collapsed: Vec<&str> = stripped.split_whitespace().collect();
    collapsed.join(" ")
}

fn clean_generated_title(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '\u{201c}' || c == '\u{201d}')
        .trim();

    truncate_with_ellipsis(trimmed, TITLE_MAX)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let prefix: String = text.chars().take(max_chars).collect();
    format!("{}...", prefix.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_opener_extracts_topic() {
        let title = fast_title("how do I sort a vector of structs in Rust?");
        assert_eq!(title, "Sort a vector of structs in Rust?");
    }

    #[test]
    fn test_command_opener_keeps_verb() {
        let title = fast_title("explain lifetimes to me like I am five");
        assert!(title.starts_with("Explain lifetimes"));
    }

    #[test]
    fn test_intent_opener_extracts_goal() {
        let title = fast_title("I want to parse JSON without serde");
        assert_eq!(title, "Parse JSON without serde");
    }

    #[test]
    fn test_plain_prompt_used_as_is() {
        let title = fast_title("rust borrow checker basics");
        assert_eq!(title, "Rust borrow checker basics");
    }

    #[test]
    fn test_long_prompt_truncated_with_ellipsis() {
        let prompt = "a".repeat(200);
        let title = fast_title(&prompt);
        assert!(title.ends_with("..."));
        assert!(title.chars().count() <= 50);
    }

    #[test]
    fn test_generated_title_shares_length_budget() {
        let long = "word ".repeat(30);
        let title = clean_generated_title(&long);
        assert!(title.ends_with("..."));
        assert!(title.chars().count() <= 50);
        assert_eq!(title.chars().count(), fast_title(&long).chars().count());
    }

    #[test]
    fn test_tiny_prompt_falls_back_to_default() {
        assert_eq!(fast_title("hi"), DEFAULT_TITLE);
        assert_eq!(fast_title("!!!"), DEFAULT_TITLE);
    }

    #[test]
    fn test_special_characters_stripped() {
        let title = fast_title("what is <b>ownership</b> @#$%?");
        assert!(!title.contains('<'));
        assert!(!title.contains('@'));
    }

    #[test]
    fn test_generated_title_quotes_stripped() {
        assert_eq!(clean_generated_title("\"Rust Error Handling\""), "Rust Error Handling");
        assert_eq!(clean_generated_title("  'Async Basics'  "), "Async Basics");
    }

    #[test]
    fn test_fallback_title_prefix() {
        let title = fallback_title("this is a fairly long first message that keeps going", "");
        assert!(title.chars().count() <= FALLBACK_TITLE_MAX + 3);
        assert!(title.starts_with("This is"));
    }

    #[test]
    fn test_fallback_concatenates_both_sides() {
        let title = fallback_title("Hi", "there, how can I help you today");
        assert!(title.starts_with("Hi there"));
        assert!(title.chars().count() <= FALLBACK_TITLE_MAX + 3);
    }

    #[test]
    fn test_fallback_empty_gives_default() {
        assert_eq!(fallback_title("", ""), DEFAULT_TITLE);
    }
}
