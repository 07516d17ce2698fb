//! Lifecycle of the `chat` span that wraps the outbound LLM call.
//!
//! A [`ChatSpan`] moves `NotStarted -> Open -> Closed` exactly once. The guard
//! closes a span that is still open when dropped, so a panic during attribute
//! extraction or a cancelled future still ends the span (as ERROR).

use crate::attributes::{response_attributes, LlmRequestAttributes};
use crate::error::TransportError;
use opentelemetry::trace::{FutureExt, SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use opentelemetry_semantic_conventions::attribute::{
    ERROR_TYPE, EXCEPTION_MESSAGE, HTTP_RESPONSE_STATUS_CODE,
};
use std::future::Future;
use tracing::debug;

pub const CHAT_SPAN_NAME: &str = "chat";

const DROPPED_MESSAGE: &str = "span dropped before the call completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanState {
    NotStarted,
    Open,
    Closed,
}

/// Guard owning the span of one traced call.
pub struct ChatSpan {
    cx: Context,
    state: SpanState,
}

impl Default for ChatSpan {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSpan {
    pub fn new() -> Self {
        Self {
            cx: Context::new(),
            state: SpanState::NotStarted,
        }
    }

    pub fn state(&self) -> SpanState {
        self.state
    }

    /// Context carrying the span, for running the traced call inside it.
    pub fn context(&self) -> &Context {
        &self.cx
    }

    /// Start the span with the pre-call attributes. Ignored unless `NotStarted`.
    pub fn open<T>(&mut self, tracer: &T, request: &LlmRequestAttributes)
    where
        T: Tracer,
        T::Span: Send + Sync + 'static,
    {
        if self.state != SpanState::NotStarted {
            return;
        }
        let span = tracer
            .span_builder(CHAT_SPAN_NAME)
            .with_kind(SpanKind::Client)
            .with_attributes(request.to_key_values())
            .start(tracer);
        self.cx = Context::current_with_span(span);
        self.state = SpanState::Open;
        debug!(request_id = %request.request_id, model = %request.model_name, "chat span opened");
    }

    /// Record the response and close the span as OK. Ignored unless `Open`.
    pub fn succeed(&mut self, response_body: &str) {
        if self.state != SpanState::Open {
            return;
        }
        {
            let span = self.cx.span();
            span.set_attributes(response_attributes(response_body));
            span.set_status(Status::Ok);
        }
        self.close();
    }

    /// Record the failure and close the span as ERROR. Ignored unless `Open`.
    pub fn fail(&mut self, error: &TransportError) {
        if self.state != SpanState::Open {
            return;
        }
        {
            let span = self.cx.span();
            span.record_error(error);
            span.set_attribute(KeyValue::new(ERROR_TYPE, error.kind()));
            if let Some(status) = error.status_code() {
                span.set_attribute(KeyValue::new(HTTP_RESPONSE_STATUS_CODE, status as i64));
            }
            span.set_status(Status::error(error.to_string()));
        }
        self.close();
    }

    fn close(&mut self) {
        self.cx.span().end();
        self.state = SpanState::Closed;
        debug!("chat span closed");
    }
}

impl Drop for ChatSpan {
    fn drop(&mut self) {
        if self.state == SpanState::Open {
            {
                let span = self.cx.span();
                span.add_event(
                    "exception",
                    vec![KeyValue::new(EXCEPTION_MESSAGE, DROPPED_MESSAGE)],
                );
                span.set_attribute(KeyValue::new(ERROR_TYPE, "dropped"));
                span.set_status(Status::error(DROPPED_MESSAGE));
            }
            self.close();
        }
    }
}

/// Runs a traced call inside a freshly opened [`ChatSpan`].
pub struct SpanOrchestrator<T> {
    tracer: T,
}

impl<T> SpanOrchestrator<T>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    pub fn new(tracer: T) -> Self {
        Self { tracer }
    }

    /// Open the span, await `call` inside it and close the span according to
    /// the outcome. The outcome is returned unchanged.
    pub async fn trace<F>(
        &self,
        request: &LlmRequestAttributes,
        call: F,
    ) -> Result<String, TransportError>
    where
        F: Future<Output = Result<String, TransportError>>,
    {
        let mut span = ChatSpan::new();
        span.open(&self.tracer, request);

        let outcome = call.with_context(span.context().clone()).await;
        match &outcome {
            Ok(body) => span.succeed(body),
            Err(e) => span.fail(e),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::OpenInferenceAttributes;
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::Value;
    use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use uuid::Uuid;

    fn test_provider() -> (SdkTracerProvider, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        (provider, exporter)
    }

    fn request() -> LlmRequestAttributes {
        LlmRequestAttributes::from_request(
            r#"{"model":"gpt","messages":[{"role":"user","content":"hi"}]}"#,
            &[],
            Uuid::new_v4(),
        )
    }

    fn find_attribute<'a>(span: &'a SpanData, key: &str) -> Option<&'a Value> {
        span.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }

    #[test]
    fn test_state_transitions() {
        let (provider, exporter) = test_provider();
        let tracer = provider.tracer("test");

        let mut span = ChatSpan::new();
        assert_eq!(span.state(), SpanState::NotStarted);

        // Closing before opening is a no-op
        span.succeed("{}");
        assert_eq!(span.state(), SpanState::NotStarted);

        span.open(&tracer, &request());
        assert_eq!(span.state(), SpanState::Open);

        span.succeed(r#"{"output_text":"done"}"#);
        assert_eq!(span.state(), SpanState::Closed);

        // Closed is terminal
        span.fail(&TransportError::Network("late".to_string()));
        span.open(&tracer, &request());
        assert_eq!(span.state(), SpanState::Closed);
        drop(span);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, CHAT_SPAN_NAME);
        assert_eq!(spans[0].span_kind, SpanKind::Client);
        assert_eq!(spans[0].status, Status::Ok);
    }

    #[tokio::test]
    async fn test_trace_success_sets_pre_and_post_call_attributes() {
        let (provider, exporter) = test_provider();
        let orchestrator = SpanOrchestrator::new(provider.tracer("test"));

        let body = r#"{"choices":[{"message":{"content":"hello"}}]}"#.to_string();
        let result = orchestrator
            .trace(&request(), async { Ok(body.clone()) })
            .await
            .unwrap();
        assert_eq!(result, body);

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert_eq!(span.status, Status::Ok);
        assert_eq!(
            find_attribute(span, OpenInferenceAttributes::MODEL_NAME).map(|v| v.as_str()),
            Some("gpt".into())
        );
        assert_eq!(
            find_attribute(span, OpenInferenceAttributes::PROVIDER).map(|v| v.as_str()),
            Some("internal".into())
        );
        assert_eq!(
            find_attribute(span, OpenInferenceAttributes::OUTPUT_MESSAGE_ROLE).map(|v| v.as_str()),
            Some("assistant".into())
        );
        assert_eq!(
            find_attribute(span, OpenInferenceAttributes::OUTPUT_MESSAGE_CONTENT)
                .map(|v| v.as_str()),
            Some("hello".into())
        );
        assert!(find_attribute(span, OpenInferenceAttributes::USAGE_TOTAL_TOKENS).is_none());
    }

    #[tokio::test]
    async fn test_trace_failure_records_error() {
        let (provider, exporter) = test_provider();
        let orchestrator = SpanOrchestrator::new(provider.tracer("test"));

        let err = orchestrator
            .trace(&request(), async {
                Err(TransportError::Status {
                    status: 502,
                    body: "bad gateway".to_string(),
                })
            })
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(502));

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        let span = &spans[0];
        assert!(matches!(span.status, Status::Error { .. }));
        assert_eq!(
            find_attribute(span, HTTP_RESPONSE_STATUS_CODE),
            Some(&Value::I64(502))
        );
        assert_eq!(
            find_attribute(span, ERROR_TYPE).map(|v| v.as_str()),
            Some("http_status".into())
        );
        assert!(span.events.events.iter().any(|e| e.name == "exception"));
        assert!(find_attribute(span, OpenInferenceAttributes::OUTPUT_MESSAGE_CONTENT).is_none());
    }

    #[test]
    fn test_drop_while_open_closes_with_error() {
        let (provider, exporter) = test_provider();
        let tracer = provider.tracer("test");

        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut span = ChatSpan::new();
            span.open(&tracer, &request());
            panic!("extraction blew up");
        }));
        assert!(result.is_err());

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert!(matches!(spans[0].status, Status::Error { .. }));
        assert_eq!(
            find_attribute(&spans[0], ERROR_TYPE).map(|v| v.as_str()),
            Some("dropped".into())
        );
        let exception = spans[0]
            .events
            .events
            .iter()
            .find(|e| e.name == "exception")
            .expect("exception event");
        assert!(exception
            .attributes
            .iter()
            .any(|kv| kv.key.as_str() == EXCEPTION_MESSAGE));
    }

    #[test]
    fn test_never_opened_span_exports_nothing() {
        let (_provider, exporter) = test_provider();
        drop(ChatSpan::new());
        assert!(exporter.get_finished_spans().unwrap().is_empty());
    }
}
