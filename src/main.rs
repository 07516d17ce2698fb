//! `llm-call`: send one traced request and print the response.
//!
//! Every flag can also be set through the environment (or a `.env` file).

use clap::{ArgAction, Parser};
use dotenv::dotenv;
use llm_call_tracer::{
    init_tracer_provider, BodySource, HttpClientWithMiddleware, Pipeline, PipelineOptions,
    RequestConfig, TelemetryConfig, TokenCredentials, DEFAULT_ENDPOINT,
};
use opentelemetry::trace::TracerProvider as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Send one traced JSON request to an LLM API", long_about = None)]
struct Cli {
    /// Target URL of the POST
    #[arg(long, env = "APP_URL")]
    url: String,

    /// Static bearer token, used when no client credentials are configured
    #[arg(long, env = "APP_BEARER_TOKEN", hide_env_values = true)]
    bearer_token: Option<String>,

    /// Extra request header as NAME=VALUE (repeatable, value taken verbatim)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Comma-separated NAME=VALUE list, applied before any --header
    #[arg(
        long = "extra-headers",
        env = "APP_EXTRA_HEADERS",
        value_delimiter = ',',
        value_parser = parse_header,
        hide = true
    )]
    env_headers: Vec<(String, String)>,

    /// Inline JSON request body
    #[arg(long, env = "APP_BODY")]
    body: Option<String>,

    /// File holding the JSON request body (wins over --body)
    #[arg(long, env = "APP_BODY_FILE")]
    body_file: Option<PathBuf>,

    /// OAuth2 token endpoint for the client-credentials exchange
    #[arg(long, env = "APIGEE_TOKEN_URL")]
    token_url: Option<String>,

    #[arg(long, env = "APIGEE_CONSUMER_KEY")]
    client_id: Option<String>,

    #[arg(long, env = "APIGEE_CONSUMER_SECRET", hide_env_values = true)]
    client_secret: Option<String>,

    /// Give up on the LLM call after this many seconds
    #[arg(long, env = "APP_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[arg(long, env = "ARIZE_ENABLED", default_value_t = true, action = ArgAction::Set)]
    otel_enabled: bool,

    #[arg(long, env = "ARIZE_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    otel_endpoint: String,

    #[arg(long, env = "ARIZE_SPACE_ID")]
    otel_space_id: Option<String>,

    #[arg(long, env = "ARIZE_API_KEY", hide_env_values = true)]
    otel_api_key: Option<String>,

    #[arg(long, env = "ARIZE_MODEL_ID", default_value = "llm-call-tracer")]
    model_id: String,

    #[arg(long, env = "ARIZE_MODEL_VERSION", default_value = "0.1.0")]
    model_version: String,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {:?}", raw))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

impl Cli {
    fn request_config(&self) -> RequestConfig {
        let body = BodySource::from_options(self.body.clone(), self.body_file.clone());
        let config = RequestConfig::new(self.url.clone(), body)
            .with_extra_headers(self.env_headers.iter().chain(&self.headers).cloned());
        match &self.bearer_token {
            Some(token) => config.with_bearer_token(token.clone()),
            None => config,
        }
    }

    fn credentials(&self) -> Option<TokenCredentials> {
        TokenCredentials::from_parts(
            self.token_url.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
        )
    }

    fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            enabled: self.otel_enabled,
            endpoint: self.otel_endpoint.clone(),
            space_id: self.otel_space_id.clone(),
            api_key: self.otel_api_key.clone(),
            model_id: self.model_id.clone(),
            model_version: self.model_version.clone(),
        }
    }
}

fn init_logging() {
    // stdout carries only the response body
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("llm_call_tracer=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    dotenv().ok();
    let cli = Cli::parse();
    init_logging();

    let provider = init_tracer_provider(&cli.telemetry_config())?;
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    let pipeline = Pipeline::new(
        Arc::new(HttpClientWithMiddleware::from_reqwest(client)),
        provider.tracer("llm-call-tracer"),
    )
    .with_options(PipelineOptions {
        request_timeout: cli.timeout_secs.map(Duration::from_secs),
    });

    let config = cli.request_config();
    let credentials = cli.credentials();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let outcome = runtime.block_on(pipeline.run(&config, credentials.as_ref()));
    drop(runtime);

    // Flush the span before the process exits
    if let Err(e) = provider.shutdown() {
        warn!(error = ?e, "failed to flush spans");
    }

    match outcome {
        Ok(body) => {
            println!("{}", body);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Request failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("x-provider=acme"),
            Ok(("x-provider".to_string(), "acme".to_string()))
        );
        assert_eq!(
            parse_header("x-query= a=b "),
            Ok(("x-query".to_string(), "a=b".to_string()))
        );
        assert!(parse_header("no-separator").is_err());
    }

    #[test]
    fn test_cli_builds_request_config() {
        let cli = Cli::try_parse_from([
            "llm-call",
            "--url",
            "http://x/chat",
            "--body",
            r#"{"model":"gpt"}"#,
            "-H",
            "x-wf-client-id=c1",
            "--bearer-token",
            "tok",
            "--token-url",
            "http://auth/token",
        ])
        .unwrap();

        let config = cli.request_config();
        assert_eq!(config.target_url, "http://x/chat");
        assert_eq!(config.body, BodySource::Inline(r#"{"model":"gpt"}"#.to_string()));
        assert_eq!(
            config.extra_headers,
            vec![("x-wf-client-id".to_string(), "c1".to_string())]
        );
        assert_eq!(config.static_bearer_token.as_deref(), Some("tok"));

        // Partial credentials mean no token exchange
        assert!(cli.credentials().is_none());
    }

    #[test]
    fn test_header_value_keeps_commas() {
        let cli = Cli::try_parse_from([
            "llm-call",
            "--url",
            "http://x/chat",
            "-H",
            "accept=application/json, text/plain",
            "-H",
            "x-wf-scopes=a,b,c",
        ])
        .unwrap();

        assert_eq!(
            cli.request_config().extra_headers,
            vec![
                ("accept".to_string(), "application/json, text/plain".to_string()),
                ("x-wf-scopes".to_string(), "a,b,c".to_string()),
            ]
        );
    }

    #[test]
    fn test_header_list_is_split_and_overridden_by_flags() {
        let cli = Cli::try_parse_from([
            "llm-call",
            "--url",
            "http://x/chat",
            "--extra-headers",
            "x-provider=acme,x-wf-client-id=c1",
            "-H",
            "X-Provider=other",
        ])
        .unwrap();

        assert_eq!(
            cli.request_config().extra_headers,
            vec![
                ("x-provider".to_string(), "other".to_string()),
                ("x-wf-client-id".to_string(), "c1".to_string()),
            ]
        );
    }

    #[test]
    fn test_cli_requires_url() {
        assert!(Cli::try_parse_from(["llm-call", "--body", "{}"]).is_err());
    }
}
