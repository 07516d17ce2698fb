//! Outbound request assembly and request body resolution.

use crate::config::{BodySource, RequestConfig};
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, DATE};
use http::Method;
use reqwest::Url;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The two non-deterministic inputs of a request: its id and issue time.
#[derive(Debug, Clone, Copy)]
pub struct RequestStamp {
    pub request_id: Uuid,
    pub issued_at: DateTime<Utc>,
}

impl RequestStamp {
    pub fn fresh() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            issued_at: Utc::now(),
        }
    }

    /// RFC 1123 rendering used for the `Date` header.
    pub fn http_date(&self) -> String {
        self.issued_at
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string()
    }
}

/// A fully assembled HTTP request, ready for a transport.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: String,
    pub request_id: Uuid,
}

impl OutboundRequest {
    /// Assemble the traced POST.
    ///
    /// Required headers (`X-Request-Id`, `Date`, `Content-Type`, optional
    /// `Authorization`) are inserted first and the caller's extra headers
    /// after them. An extra header with the same name as a required one
    /// therefore replaces it, including `Content-Type` and `Authorization`.
    pub fn build(
        config: &RequestConfig,
        body: String,
        token: Option<&str>,
        stamp: RequestStamp,
    ) -> Result<Self> {
        if config.target_url.trim().is_empty() {
            return Err(PipelineError::Config("target url is required".to_string()));
        }
        let url = Url::parse(&config.target_url).map_err(|e| {
            PipelineError::Config(format!("invalid target url {:?}: {}", config.target_url, e))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(REQUEST_ID_HEADER),
            header_value(&stamp.request_id.to_string())?,
        );
        headers.insert(DATE, header_value(&stamp.http_date())?);
        headers.insert(CONTENT_TYPE, header_value(mime::APPLICATION_JSON.as_ref())?);
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
        }

        for (name, value) in &config.extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                PipelineError::Config(format!("invalid extra header name {:?}: {}", name, e))
            })?;
            headers.insert(name, header_value(value)?);
        }

        Ok(Self {
            method: Method::POST,
            url,
            headers,
            body,
            request_id: stamp.request_id,
        })
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| PipelineError::Config(format!("invalid header value {:?}: {}", value, e)))
}

impl BodySource {
    /// Produce the request body text. Reading a file does not block the runtime.
    pub async fn resolve(&self) -> Result<String> {
        match self {
            BodySource::File(path) => {
                let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                    PipelineError::BodyResolution {
                        source_desc: format!("file {}", path.display()),
                        reason: e.to_string(),
                    }
                })?;
                if text.trim().is_empty() {
                    return Err(PipelineError::BodyResolution {
                        source_desc: format!("file {}", path.display()),
                        reason: "file is empty".to_string(),
                    });
                }
                Ok(text)
            }
            BodySource::Inline(body) if !body.trim().is_empty() => Ok(body.clone()),
            BodySource::Inline(_) | BodySource::Missing => Err(PipelineError::BodyResolution {
                source_desc: "configuration".to_string(),
                reason: "neither an inline body nor a body file was provided".to_string(),
            }),
        }
    }
}
