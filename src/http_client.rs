//! HTTP transport seam used by the pipeline and the token provider.

use crate::error::TransportError;
use crate::middleware::RequestLoggingMiddleware;
use crate::request::OutboundRequest;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};

/// Status, headers and buffered body of a completed exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Turn a non-2xx answer into [`TransportError::Status`].
    pub fn error_for_status(self) -> Result<Self, TransportError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Status {
                status: self.status.as_u16(),
                body: self.text(),
            })
        }
    }
}

/// Sends one request and buffers the whole response.
///
/// Any status code is a successful exchange at this level; callers decide
/// what a non-2xx answer means.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: OutboundRequest) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] backed by a `reqwest_middleware` client.
#[derive(Clone)]
pub struct HttpClientWithMiddleware {
    client: ClientWithMiddleware,
}

impl HttpClientWithMiddleware {
    pub fn new(client: ClientWithMiddleware) -> Self {
        Self { client }
    }

    /// Wrap a plain reqwest client, adding exchange logging.
    pub fn from_reqwest(client: reqwest::Client) -> Self {
        Self::new(
            ClientBuilder::new(client)
                .with(RequestLoggingMiddleware::new())
                .build(),
        )
    }
}

fn network_error(e: reqwest_middleware::Error) -> TransportError {
    match &e {
        reqwest_middleware::Error::Reqwest(re) if re.is_timeout() => {
            TransportError::Network(format!("timed out: {}", re))
        }
        _ => TransportError::Network(e.to_string()),
    }
}

#[async_trait]
impl HttpTransport for HttpClientWithMiddleware {
    async fn send(&self, request: OutboundRequest) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Network(format!("failed to read response body: {}", e)))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
