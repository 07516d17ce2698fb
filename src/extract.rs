//! Best-effort extraction of LLM metadata from request and response bodies.
//!
//! None of these functions fail. A body that is not JSON, or a JSON document
//! that does not have the expected shape, yields the documented default.

use serde_json::Value;

pub const UNKNOWN_MODEL: &str = "unknown";
pub const DEFAULT_PROVIDER: &str = "internal";

/// Maximum number of characters stored in a message content attribute.
pub const MAX_ATTRIBUTE_CHARS: usize = 4000;

/// Token counts reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

fn parse(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok()
}

/// Scalar value as text. `null` counts as absent.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn first_choice(root: &Value) -> Option<&Value> {
    root.get("choices")
        .and_then(|choices| choices.as_array())
        .and_then(|arr| arr.first())
}

/// Model name from `model`, then `parameters.model`, else `"unknown"`.
pub fn extract_model(body: &str) -> String {
    parse(body)
        .and_then(|root| {
            root.get("model").and_then(value_text).or_else(|| {
                root.get("parameters")
                    .and_then(|p| p.get("model"))
                    .and_then(value_text)
            })
        })
        .unwrap_or_else(|| UNKNOWN_MODEL.to_string())
}

/// Content of the first user message, then `prompt`, else the whole body.
pub fn extract_prompt(body: &str) -> String {
    let Some(root) = parse(body) else {
        return body.to_string();
    };

    if let Some(messages) = root.get("messages").and_then(|m| m.as_array()) {
        let user = messages
            .iter()
            .find(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"));
        if let Some(message) = user {
            return message
                .get("content")
                .and_then(|c| c.as_str())
                .unwrap_or_default()
                .to_string();
        }
    }

    root.get("prompt")
        .and_then(value_text)
        .unwrap_or_else(|| body.to_string())
}

/// Assistant reply from the common response dialects, if any is present.
///
/// Tried in order: `choices[0].message.content` (chat completions),
/// `choices[0].text` (legacy completions), `output_text` (responses API),
/// `candidates[0].content` (Gemini, either a string or `parts[0].text`).
pub fn extract_assistant_text(response: &str) -> Option<String> {
    let root = parse(response)?;
    let choice = first_choice(&root);

    choice
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(value_text)
        .or_else(|| choice.and_then(|c| c.get("text")).and_then(value_text))
        .or_else(|| root.get("output_text").and_then(value_text))
        .or_else(|| {
            let content = root
                .get("candidates")
                .and_then(|c| c.as_array())
                .and_then(|arr| arr.first())
                .and_then(|c| c.get("content"))?;
            match content {
                Value::Object(_) => content
                    .get("parts")
                    .and_then(|p| p.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|part| part.get("text"))
                    .and_then(value_text),
                other => value_text(other),
            }
        })
}

/// Token usage from a top-level `usage` object or one nested in `choices[0]`.
///
/// Accepts both `prompt_tokens`/`completion_tokens` and
/// `input_tokens`/`output_tokens`. An explicit `total_tokens` wins over the sum.
pub fn extract_usage(response: &str) -> Option<TokenUsage> {
    let root = parse(response)?;
    let usage = root
        .get("usage")
        .filter(|u| u.is_object())
        .or_else(|| {
            first_choice(&root)
                .and_then(|c| c.get("usage"))
                .filter(|u| u.is_object())
        })?;

    let count = |primary: &str, alternate: &str| {
        usage
            .get(primary)
            .and_then(|v| v.as_u64())
            .or_else(|| usage.get(alternate).and_then(|v| v.as_u64()))
    };

    let input_tokens = count("prompt_tokens", "input_tokens").unwrap_or(0);
    let output_tokens = count("completion_tokens", "output_tokens").unwrap_or(0);
    let total_tokens = usage
        .get("total_tokens")
        .and_then(|v| v.as_u64())
        .unwrap_or_else(|| input_tokens.saturating_add(output_tokens));

    Some(TokenUsage {
        input_tokens,
        output_tokens,
        total_tokens,
    })
}

/// Provider label derived from the caller's extra headers.
pub fn guess_provider<K, V>(extra_headers: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let find = |name: &str| {
        extra_headers
            .iter()
            .find(|(k, _)| k.as_ref().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_ref())
    };

    if find("x-wf-client-id").is_some() {
        "wf".to_string()
    } else if let Some(provider) = find("x-provider") {
        provider.to_string()
    } else {
        DEFAULT_PROVIDER.to_string()
    }
}

/// Cut `text` to at most `max_chars` characters.
pub fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
