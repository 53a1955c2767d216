//! HTTP transport implementation using reqwest.

use reqwest::{Client, header::CONTENT_TYPE};
use tracing::{debug, instrument};
use url::Url;

use super::config::{HttpConfig, HttpVersion};
use crate::{
    error::{PayboxError, Result},
    params::{ParameterMap, decode_text},
    transport::Transport,
};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Validates URL for security constraints.
///
/// Ensures the URL uses HTTPS and does not point to localhost.
fn validate_url(url: &Url) -> Result<()> {
    if url.scheme() != "https" {
        return Err(PayboxError::TransportFailure("Only HTTPS URLs are allowed".to_owned()));
    }

    let Some(host) = url.host_str() else {
        return Err(PayboxError::TransportFailure(format!("URL missing host: {url}")));
    };

    if host == "localhost" || host == "127.0.0.1" || host == "::1" || host == "[::1]" {
        return Err(PayboxError::TransportFailure("Localhost URLs are not allowed".to_owned()));
    }

    Ok(())
}

/// Form-posting transport over HTTP/1.1 or HTTP/2.
///
/// Reply bodies are decoded with [`decode_text`], so ISO-8859-1 replies keep
/// their accented characters.
///
/// # Examples
///
/// ```
/// use paybox_gateway::transport::{HttpConfig, HttpTransport, HttpVersion, Transport};
///
/// let config =
///     HttpConfig { timeout_secs: 20, http_version: HttpVersion::Http1, ..Default::default() };
/// let transport = HttpTransport::with_config(&config).unwrap();
/// assert_eq!(transport.protocol_name(), "http/1.1");
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    http_version: HttpVersion,
}

impl HttpTransport {
    /// Creates a transport with the default timeouts (30 s request, 10 s connect).
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_config(&HttpConfig::default())
    }

    /// Creates a transport with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::ConfigError`] if the configuration is out of bounds
    /// and [`PayboxError::HttpError`] if client creation fails.
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout());

        if config.http_version == HttpVersion::Http1 {
            builder = builder.http1_only();
        }

        let client = builder.build().map_err(PayboxError::HttpError)?;

        Ok(Self { client, http_version: config.http_version })
    }

    #[instrument(skip(self, url, params), fields(url = %url, fields = params.len()))]
    async fn execute_post(&self, url: &Url, params: &ParameterMap) -> Result<String> {
        validate_url(url)?;

        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(params.to_form_body())
            .send()
            .await?;

        let status = response.status();
        debug!(status = status.as_u16(), "paybox server replied");

        if !status.is_success() {
            return Err(PayboxError::TransportFailure(format!(
                "server returned status {}",
                status.as_u16()
            )));
        }

        let body = response.bytes().await?;
        Ok(decode_text(&body).into_owned())
    }
}

impl Transport for HttpTransport {
    async fn post<'a>(&'a self, url: &'a Url, params: &'a ParameterMap) -> Result<String> {
        self.execute_post(url, params).await
    }

    fn protocol_name(&self) -> &'static str {
        match self.http_version {
            HttpVersion::Http1 => "http/1.1",
            HttpVersion::Auto => "http/2+http/1.1",
        }
    }
}
