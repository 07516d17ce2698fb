use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use std::time::Instant;
use tracing::{debug, warn};

/// Middleware that logs every HTTP exchange made through the client.
///
/// Only the method, URL, status and elapsed time are logged. Header values
/// and bodies can carry credentials and are never written out.
pub struct RequestLoggingMiddleware;

impl Default for RequestLoggingMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestLoggingMiddleware {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Middleware for RequestLoggingMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let start_time = Instant::now();
        let method = req.method().clone();
        let url = req.url().clone();

        debug!(%method, %url, "sending request");
        let response = next.run(req, extensions).await;
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        match &response {
            Ok(res) => debug!(
                %method,
                %url,
                status = res.status().as_u16(),
                elapsed_ms,
                "received response"
            ),
            Err(e) => warn!(%method, %url, elapsed_ms, error = %e, "request failed"),
        }

        response
    }
}
