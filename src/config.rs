//! Immutable run configuration consumed by the pipeline.

use std::fmt;
use std::path::PathBuf;

/// Where the JSON request body comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    Inline(String),
    File(PathBuf),
    Missing,
}

impl BodySource {
    /// Pick the body source from the two optional settings. A non-empty file
    /// path wins over an inline body.
    pub fn from_options(inline: Option<String>, file: Option<PathBuf>) -> Self {
        match (inline, file) {
            (_, Some(path)) if !path.as_os_str().is_empty() => BodySource::File(path),
            (Some(body), _) if !body.trim().is_empty() => BodySource::Inline(body),
            _ => BodySource::Missing,
        }
    }
}

/// Settings for the single outbound request.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub target_url: String,
    pub static_bearer_token: Option<String>,
    pub extra_headers: Vec<(String, String)>,
    pub body: BodySource,
}

impl RequestConfig {
    pub fn new(target_url: impl Into<String>, body: BodySource) -> Self {
        Self {
            target_url: target_url.into(),
            static_bearer_token: None,
            extra_headers: Vec::new(),
            body,
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.static_bearer_token = (!token.trim().is_empty()).then_some(token);
        self
    }

    /// Add an extra header. Empty names are ignored; a repeated name (compared
    /// case-insensitively) replaces the earlier value.
    pub fn with_extra_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if name.trim().is_empty() {
            return self;
        }
        let value = value.into();
        match self
            .extra_headers
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(idx) => self.extra_headers[idx].1 = value,
            None => self.extra_headers.push((name, value)),
        }
        self
    }

    pub fn with_extra_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        headers
            .into_iter()
            .fold(self, |config, (k, v)| config.with_extra_header(k, v))
    }
}

/// OAuth2 client-credentials settings for the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenCredentials {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl TokenCredentials {
    /// Returns `None` unless all three parts are present and non-empty.
    pub fn from_parts(
        token_url: Option<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Option<Self> {
        let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        Some(Self {
            token_url: non_empty(token_url)?,
            client_id: non_empty(client_id)?,
            client_secret: non_empty(client_secret)?,
        })
    }
}

impl fmt::Debug for TokenCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}
