//! # llm-call-tracer
//!
//! Sends one JSON POST to an LLM-style API and records the call as an
//! OpenTelemetry span annotated with OpenInference attributes.
//!
//! This library provides:
//! - Optional OAuth2 client-credentials token acquisition before the call
//! - A `chat` span that is always closed, as OK or ERROR, whatever the outcome
//! - Best-effort extraction of model, prompt, reply and token usage from the
//!   common request/response dialects (chat completions, legacy completions,
//!   responses API, Gemini)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_call_tracer::{BodySource, HttpClientWithMiddleware, Pipeline, RequestConfig};
//! use opentelemetry::trace::TracerProvider as _;
//! use opentelemetry_sdk::trace::SdkTracerProvider;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = SdkTracerProvider::builder().build();
//! let transport = Arc::new(HttpClientWithMiddleware::from_reqwest(reqwest::Client::new()));
//! let pipeline = Pipeline::new(transport, provider.tracer("llm-call-tracer"));
//!
//! let config = RequestConfig::new(
//!     "https://llm.example.com/v1/chat/completions",
//!     BodySource::Inline(r#"{"model":"gpt-4o","messages":[{"role":"user","content":"hi"}]}"#.into()),
//! )
//! .with_bearer_token("sk-...");
//!
//! let response = pipeline.run(&config, None).await?;
//! println!("{}", response);
//! # Ok(())
//! # }
//! ```

mod attributes;
mod config;
mod error;
pub mod extract;
mod http_client;
mod middleware;
mod pipeline;
mod request;
mod span;
mod telemetry;
mod token;

// Re-export main types
pub use attributes::{
    response_attributes, LlmRequestAttributes, LlmSpanAttributesBuilder, OpenInferenceAttributes,
};
pub use config::{BodySource, RequestConfig, TokenCredentials};
pub use error::{PipelineError, Result, TransportError};
pub use http_client::{HttpClientWithMiddleware, HttpResponse, HttpTransport};
pub use middleware::RequestLoggingMiddleware;
pub use pipeline::{Pipeline, PipelineOptions};
pub use request::{OutboundRequest, RequestStamp};
pub use span::{ChatSpan, SpanOrchestrator, SpanState, CHAT_SPAN_NAME};
pub use telemetry::{init_tracer_provider, TelemetryConfig, DEFAULT_ENDPOINT};
pub use token::{acquire_token, build_basic_auth_header};
