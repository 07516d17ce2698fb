//! OpenInference span attribute management
//!
//! Attribute keys must match the OpenInference semantic conventions verbatim so
//! that collectors such as Arize or Phoenix render the span as an LLM call.

use crate::extract::{self, TokenUsage, MAX_ATTRIBUTE_CHARS};
use opentelemetry::KeyValue;
use uuid::Uuid;

/// OpenInference span attribute names
pub struct OpenInferenceAttributes;

impl OpenInferenceAttributes {
    pub const SPAN_KIND: &'static str = "openinference.span.kind";
    pub const MODEL_NAME: &'static str = "llm.model_name";
    pub const PROVIDER: &'static str = "llm.provider";
    pub const REQUEST_ID: &'static str = "request.id";

    // Structured messages
    pub const INPUT_MESSAGE_ROLE: &'static str = "llm.input_messages.0.message.role";
    pub const INPUT_MESSAGE_CONTENT: &'static str = "llm.input_messages.0.message.content";
    pub const OUTPUT_MESSAGE_ROLE: &'static str = "llm.output_messages.0.message.role";
    pub const OUTPUT_MESSAGE_CONTENT: &'static str = "llm.output_messages.0.message.content";

    // Token usage
    pub const USAGE_INPUT_TOKENS: &'static str = "llm.usage.input_tokens";
    pub const USAGE_OUTPUT_TOKENS: &'static str = "llm.usage.output_tokens";
    pub const USAGE_TOTAL_TOKENS: &'static str = "llm.usage.total_tokens";
    pub const USAGE_PROMPT_TOKENS: &'static str = "llm.usage.prompt_tokens";
    pub const USAGE_COMPLETION_TOKENS: &'static str = "llm.usage.completion_tokens";

    pub const SPAN_KIND_LLM: &'static str = "LLM";
}

/// What is known about the call before it is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequestAttributes {
    pub model_name: String,
    pub provider: String,
    pub request_id: Uuid,
    pub input_prompt: String,
}

impl LlmRequestAttributes {
    /// Mine the request body and the caller's extra headers.
    pub fn from_request(body: &str, extra_headers: &[(String, String)], request_id: Uuid) -> Self {
        Self {
            model_name: extract::extract_model(body),
            provider: extract::guess_provider(extra_headers),
            request_id,
            input_prompt: extract::extract_prompt(body),
        }
    }

    pub fn to_key_values(&self) -> Vec<KeyValue> {
        LlmSpanAttributesBuilder::new()
            .with_span_kind(OpenInferenceAttributes::SPAN_KIND_LLM)
            .with_model(self.model_name.clone())
            .with_provider(self.provider.clone())
            .with_request_id(self.request_id.to_string())
            .with_input_message("user", &self.input_prompt)
            .build()
    }
}

/// Builder for OpenInference LLM span attributes
#[derive(Default)]
pub struct LlmSpanAttributesBuilder {
    attributes: Vec<KeyValue>,
}

impl LlmSpanAttributesBuilder {
    pub fn new() -> Self {
        Self {
            attributes: Vec::new(),
        }
    }

    pub fn with_span_kind(mut self, kind: &'static str) -> Self {
        self.attributes
            .push(KeyValue::new(OpenInferenceAttributes::SPAN_KIND, kind));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.attributes.push(KeyValue::new(
            OpenInferenceAttributes::MODEL_NAME,
            model.into(),
        ));
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.attributes.push(KeyValue::new(
            OpenInferenceAttributes::PROVIDER,
            provider.into(),
        ));
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.attributes.push(KeyValue::new(
            OpenInferenceAttributes::REQUEST_ID,
            request_id.into(),
        ));
        self
    }

    /// Content is truncated to [`MAX_ATTRIBUTE_CHARS`] characters.
    pub fn with_input_message(mut self, role: &'static str, content: &str) -> Self {
        self.attributes.push(KeyValue::new(
            OpenInferenceAttributes::INPUT_MESSAGE_ROLE,
            role,
        ));
        self.attributes.push(KeyValue::new(
            OpenInferenceAttributes::INPUT_MESSAGE_CONTENT,
            extract::truncate(content, MAX_ATTRIBUTE_CHARS).to_string(),
        ));
        self
    }

    /// Content is truncated to [`MAX_ATTRIBUTE_CHARS`] characters.
    pub fn with_output_message(mut self, role: &'static str, content: &str) -> Self {
        self.attributes.push(KeyValue::new(
            OpenInferenceAttributes::OUTPUT_MESSAGE_ROLE,
            role,
        ));
        self.attributes.push(KeyValue::new(
            OpenInferenceAttributes::OUTPUT_MESSAGE_CONTENT,
            extract::truncate(content, MAX_ATTRIBUTE_CHARS).to_string(),
        ));
        self
    }

    /// Emits both the input/output and the prompt/completion naming styles.
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        let input = saturating_i64(usage.input_tokens);
        let output = saturating_i64(usage.output_tokens);
        self.attributes.extend([
            KeyValue::new(OpenInferenceAttributes::USAGE_INPUT_TOKENS, input),
            KeyValue::new(OpenInferenceAttributes::USAGE_OUTPUT_TOKENS, output),
            KeyValue::new(
                OpenInferenceAttributes::USAGE_TOTAL_TOKENS,
                saturating_i64(usage.total_tokens),
            ),
            KeyValue::new(OpenInferenceAttributes::USAGE_PROMPT_TOKENS, input),
            KeyValue::new(OpenInferenceAttributes::USAGE_COMPLETION_TOKENS, output),
        ]);
        self
    }

    pub fn build(self) -> Vec<KeyValue> {
        self.attributes
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Attributes recorded once the response body is in hand.
pub fn response_attributes(response_body: &str) -> Vec<KeyValue> {
    let content = extract::extract_assistant_text(response_body);
    let builder = LlmSpanAttributesBuilder::new()
        .with_output_message("assistant", content.as_deref().unwrap_or(response_body));

    match extract::extract_usage(response_body) {
        Some(usage) => builder.with_usage(usage).build(),
        None => builder.build(),
    }
}
