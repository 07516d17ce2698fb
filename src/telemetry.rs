//! OpenTelemetry tracer provider bootstrap.
//!
//! Spans are exported over OTLP/HTTP only when export is enabled and both the
//! space id and api key are configured. Otherwise the provider has no exporter
//! and finished spans are dropped.

use anyhow::Context as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::SERVICE_VERSION;
use std::collections::HashMap;
use tracing::info;

pub const SERVICE_NAME: &str = "llm-call-tracer";
pub const DEFAULT_ENDPOINT: &str = "https://otlp.arize.com/v1/traces";

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub space_id: Option<String>,
    pub api_key: Option<String>,
    pub model_id: String,
    pub model_version: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            space_id: None,
            api_key: None,
            model_id: SERVICE_NAME.to_string(),
            model_version: "0.1.0".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Exporter headers, or `None` when spans should not be exported.
    pub fn export_headers(&self) -> Option<HashMap<String, String>> {
        if !self.enabled {
            return None;
        }
        let non_blank = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        let space_id = non_blank(&self.space_id)?;
        let api_key = non_blank(&self.api_key)?;

        let mut headers = HashMap::new();
        headers.insert("space_id".to_string(), space_id);
        headers.insert("api_key".to_string(), api_key);
        Some(headers)
    }

    fn resource(&self) -> Resource {
        Resource::builder()
            .with_service_name(SERVICE_NAME)
            .with_attributes([
                KeyValue::new(SERVICE_VERSION, self.model_version.clone()),
                KeyValue::new("model_id", self.model_id.clone()),
                KeyValue::new("model_version", self.model_version.clone()),
            ])
            .build()
    }
}

/// Build the tracer provider handed to the pipeline.
///
/// Call this outside of an async context: the OTLP exporter uses a blocking
/// HTTP client on the batch processor's own thread.
pub fn init_tracer_provider(config: &TelemetryConfig) -> anyhow::Result<SdkTracerProvider> {
    let builder = SdkTracerProvider::builder().with_resource(config.resource());

    let Some(headers) = config.export_headers() else {
        info!("span export disabled; spans will be dropped");
        return Ok(builder.build());
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(config.endpoint.clone())
        .with_headers(headers)
        .build()
        .context("failed to build OTLP span exporter")?;

    info!(endpoint = %config.endpoint, "exporting spans over OTLP/HTTP");
    Ok(builder.with_batch_exporter(exporter).build())
}
