/// Model-id heuristics for reasoning-capable models.
///
/// OpenRouter ids are `vendor/model` with optional `:variant` suffixes
/// (e.g. `openai/o1-mini`, `anthropic/claude-3.7-sonnet:thinking`).

const REASONING_PREFIXES: &[&str] = &["o1", "o3", "o4", "gpt-5", "deepseek-r1"];

const REASONING_MARKERS: &[&str] = &[":thinking", "-reasoning", "reasoner"];

/// Whether a model is expected to emit a reasoning trace.
pub fn supports_reasoning(model: &str) -> bool {
    let model = model.to_ascii_lowercase();
    let bare = model.rsplit('/').next().unwrap_or(&model);

    REASONING_PREFIXES.iter().any(|p| bare.starts_with(p))
        || REASONING_MARKERS.iter().any(|m| model.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasoning_prefixes() {
        assert!(supports_reasoning("openai/o1-mini"));
        assert!(supports_reasoning("openai/o3"));
        assert!(supports_reasoning("openai/gpt-5"));
        assert!(supports_reasoning("deepseek/deepseek-r1"));
    }

    #[test]
    fn test_reasoning_variant_suffix() {
        assert!(supports_reasoning("anthropic/claude-3.7-sonnet:thinking"));
        assert!(supports_reasoning("some/model-reasoning"));
    }

    #[test]
    fn test_plain_chat_models() {
        assert!(!supports_reasoning("openai/gpt-4o-mini"));
        assert!(!supports_reasoning("anthropic/claude-3.5-sonnet"));
        assert!(!supports_reasoning("meta-llama/llama-3-70b-instruct"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(supports_reasoning("OpenAI/O1-Preview"));
    }
}
