//! Drives one traced request from configuration to response text.

use crate::attributes::LlmRequestAttributes;
use crate::config::{RequestConfig, TokenCredentials};
use crate::error::{PipelineError, Result, TransportError};
use crate::http_client::HttpTransport;
use crate::request::{OutboundRequest, RequestStamp};
use crate::span::SpanOrchestrator;
use crate::token::acquire_token;
use opentelemetry::trace::Tracer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Upper bound on the traced call. `None` waits for the transport.
    pub request_timeout: Option<Duration>,
}

/// Single-request pipeline with an injected transport and tracer.
pub struct Pipeline<T> {
    transport: Arc<dyn HttpTransport>,
    orchestrator: SpanOrchestrator<T>,
    options: PipelineOptions,
}

impl<T> Pipeline<T>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    pub fn new(transport: Arc<dyn HttpTransport>, tracer: T) -> Self {
        Self {
            transport,
            orchestrator: SpanOrchestrator::new(tracer),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Execute the request and return the response body.
    ///
    /// Configuration, body and token failures abort before a span exists. Once
    /// the span is open every outcome closes it, and a failed call is returned
    /// as [`PipelineError::Transport`].
    pub async fn run(
        &self,
        config: &RequestConfig,
        credentials: Option<&TokenCredentials>,
    ) -> Result<String> {
        if config.target_url.trim().is_empty() {
            return Err(PipelineError::Config("target url is required".to_string()));
        }

        let (body, token) = tokio::try_join!(
            config.body.resolve(),
            acquire_token(
                self.transport.as_ref(),
                credentials,
                config.static_bearer_token.as_deref(),
            ),
        )?;
        debug!(
            body_len = body.len(),
            authenticated = token.is_some(),
            "inputs resolved"
        );

        let request = OutboundRequest::build(config, body, token.as_deref(), RequestStamp::fresh())?;
        let attributes = LlmRequestAttributes::from_request(
            &request.body,
            &config.extra_headers,
            request.request_id,
        );
        info!(
            url = %request.url,
            request_id = %request.request_id,
            model = %attributes.model_name,
            provider = %attributes.provider,
            "sending request"
        );

        let transport = Arc::clone(&self.transport);
        let timeout = self.options.request_timeout;
        let call = async move {
            let send = transport.send(request);
            let response = match timeout {
                Some(limit) => tokio::time::timeout(limit, send)
                    .await
                    .map_err(|_| TransportError::Timeout(limit))??,
                None => send.await?,
            };
            debug!(
                status = %response.status,
                content_type = response.content_type().unwrap_or("-"),
                body_len = response.body.len(),
                "response received"
            );
            Ok::<String, TransportError>(response.error_for_status()?.text())
        };

        match self.orchestrator.trace(&attributes, call).await {
            Ok(body) => {
                info!(request_id = %attributes.request_id, "request succeeded");
                Ok(body)
            }
            Err(e) => {
                warn!(request_id = %attributes.request_id, error = %e, "request failed");
                Err(e.into())
            }
        }
    }
}
