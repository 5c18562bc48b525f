//! HTTP transport backed by `reqwest`.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use tracing::debug;

use super::{FetchOptions, Transport};
use crate::config::Config;
use crate::error::{BoxError, Error, Result};
use crate::middleware::BoxFuture;
use crate::model::{Body, Headers, Method, RawResponse};

/// Sends exchanges through a shared [`reqwest::Client`].
///
/// `credentials` on a request has no meaning for a server-side client and is
/// ignored; authentication comes from the client's default headers.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Build a client with the configured timeout, user agent and bearer token.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        if let Some(token) = &config.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| Error::Config(format!("invalid bearer token: {e}")))?;
            value.set_sensitive(true);
            default_headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(default_headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn send(&self, url: &str, options: FetchOptions) -> std::result::Result<RawResponse, BoxError> {
        let mut builder = self.client.request(to_reqwest_method(&options.method)?, url);
        for (name, value) in options.headers.iter() {
            builder = builder.header(name, value);
        }
        builder = match options.body {
            Some(Body::Text(text)) => builder.body(text),
            Some(Body::Json(value)) => builder.json(&value),
            None => builder,
        };
        if options.credentials.is_some() {
            debug!(url, "credentials are not used by the HTTP transport");
        }

        let response = builder.send().await?;

        let status = response.status();
        let mut headers = Headers::new();
        for (name, value) in response.headers() {
            headers.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }
        let final_url = response.url().to_string();
        let text = response.text().await?;

        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            url: final_url,
            text,
        })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::with_client(reqwest::Client::new())
    }
}

impl Transport for HttpTransport {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        options: FetchOptions,
    ) -> BoxFuture<'a, std::result::Result<RawResponse, BoxError>> {
        Box::pin(self.send(url, options))
    }
}

fn to_reqwest_method(method: &Method) -> std::result::Result<reqwest::Method, BoxError> {
    Ok(match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Other(name) => reqwest::Method::from_bytes(name.as_bytes())?,
    })
}
