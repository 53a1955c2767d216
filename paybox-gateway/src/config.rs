//! Merchant configuration.
//!
//! A merchant is configured from a TOML document:
//!
//! ```toml
//! site = "1999888"
//! rank = "32"
//! identifier = "107904482"
//! back_office_password = "1999888I"
//! hmac_key = "paybox.hmac_key"
//! test = true
//! currency = "EUR"
//!
//! [return_urls]
//! accepted = "https://shop.example.com/payment/accepted"
//! notification = "https://shop.example.com/payment/ipn"
//!
//! [notification]
//! trusted_ips = ["194.2.122.158", "195.25.7.166"]
//!
//! [transport]
//! timeout_secs = 20
//! ```
//!
//! The HMAC secret itself never appears in the configuration: `hmac_key` names
//! the entry a [`SecretStore`](crate::signing::SecretStore) resolves it from.

use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::{
    amount::Currency,
    error::{PayboxError, Result},
    notification::NotificationConfig,
    requests::Language,
    server::{ServerConfig, ServerSelector},
    transport::HttpConfig,
};

/// Length of a Paybox site number.
const SITE_LENGTH: usize = 7;

/// Accepted lengths of a Paybox rank number.
const RANK_LENGTHS: std::ops::RangeInclusive<usize> = 2..=3;

/// Root merchant configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PayboxConfig {
    /// Site number (`PBX_SITE`, `SITE`), seven digits.
    pub site: String,

    /// Rank number (`PBX_RANG`, `RANG`).
    pub rank: String,

    /// Paybox merchant identifier (`PBX_IDENTIFIANT`).
    pub identifier: String,

    /// Back-office password, sent as `CLE` to Paybox Direct.
    pub back_office_password: String,

    /// Secret store entry holding the hex-encoded HMAC key.
    pub hmac_key: String,

    /// Use the pre-production platform.
    #[serde(default)]
    pub test: bool,

    /// Default currency of new requests.
    #[serde(default)]
    pub currency: Currency,

    /// Hosted page language; Paybox picks one when absent.
    #[serde(default)]
    pub language: Option<Language>,

    /// Server list replacing the built-in Paybox servers.
    #[serde(default)]
    pub servers: Option<ServerConfig>,

    /// Default return URLs of authorization forms.
    #[serde(default)]
    pub return_urls: ReturnUrls,

    /// Callback verification settings.
    #[serde(default)]
    pub notification: NotificationConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub transport: HttpConfig,
}

/// Browser and server callback URLs of the Paybox System form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReturnUrls {
    /// `PBX_EFFECTUE`: payment accepted.
    pub accepted: Option<Url>,
    /// `PBX_REFUSE`: payment refused.
    pub refused: Option<Url>,
    /// `PBX_ANNULE`: payment aborted by the customer.
    pub aborted: Option<Url>,
    /// `PBX_ATTENTE`: payment pending.
    pub waiting: Option<Url>,
    /// `PBX_REPONDRE_A`: server-to-server notification.
    pub notification: Option<Url>,
}

impl ReturnUrls {
    fn iter(&self) -> impl Iterator<Item = (&'static str, &Url)> {
        [
            ("accepted", self.accepted.as_ref()),
            ("refused", self.refused.as_ref()),
            ("aborted", self.aborted.as_ref()),
            ("waiting", self.waiting.as_ref()),
            ("notification", self.notification.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, url)| url.map(|url| (name, url)))
    }
}

impl PayboxConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::ConfigError`] if parsing or validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use paybox_gateway::config::PayboxConfig;
    ///
    /// let config = PayboxConfig::from_toml(
    ///     r#"
    ///     site = "1999888"
    ///     rank = "32"
    ///     identifier = "107904482"
    ///     back_office_password = "1999888I"
    ///     hmac_key = "paybox.hmac_key"
    ///     test = true
    /// "#,
    /// )?;
    /// assert!(config.test);
    /// # Ok::<(), paybox_gateway::PayboxError>(())
    /// ```
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)
            .map_err(|e| PayboxError::ConfigError(format!("invalid TOML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::ConfigError`] if the file cannot be read or is invalid.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PayboxError::ConfigError(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Validates the configuration.
    ///
    /// This method checks for:
    /// - a seven-digit site and a two- or three-digit rank
    /// - non-empty identifier, password and HMAC key entry
    /// - HTTPS return URLs that are not loopback addresses
    /// - valid server and transport sections
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::ConfigError`] on the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.site.len() != SITE_LENGTH || !is_digits(&self.site) {
            return Err(PayboxError::ConfigError(format!(
                "site must be {SITE_LENGTH} digits, got '{}'",
                self.site
            )));
        }

        if !RANK_LENGTHS.contains(&self.rank.len()) || !is_digits(&self.rank) {
            return Err(PayboxError::ConfigError(format!(
                "rank must be 2 or 3 digits, got '{}'",
                self.rank
            )));
        }

        for (name, value) in [
            ("identifier", &self.identifier),
            ("back_office_password", &self.back_office_password),
            ("hmac_key", &self.hmac_key),
        ] {
            if value.trim().is_empty() {
                return Err(PayboxError::ConfigError(format!("{name} must not be empty")));
            }
        }

        for (name, url) in self.return_urls.iter() {
            validate_return_url(name, url)?;
        }

        if let Some(servers) = &self.servers {
            servers.validate()?;
        }

        self.transport.validate()
    }

    /// Builds the server selector: the configured servers, or the built-in
    /// Paybox servers of the selected platform.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::ConfigError`] if the server section is invalid.
    pub fn selector(&self) -> Result<ServerSelector> {
        match &self.servers {
            Some(servers) => ServerSelector::from_config(servers),
            None => ServerSelector::paybox_defaults(self.test),
        }
    }

    /// Paybox test account on the pre-production platform.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        let url = |path: &str| Url::parse(&format!("https://shop.example.com/payment/{path}")).ok();
        Self {
            site: "1999888".to_owned(),
            rank: "32".to_owned(),
            identifier: "107904482".to_owned(),
            back_office_password: "1999888I".to_owned(),
            hmac_key: "paybox.hmac_key".to_owned(),
            test: true,
            currency: Currency::Eur,
            language: None,
            servers: None,
            return_urls: ReturnUrls {
                accepted: url("accepted"),
                refused: url("refused"),
                aborted: url("aborted"),
                waiting: url("waiting"),
                notification: url("ipn"),
            },
            notification: NotificationConfig::default(),
            transport: HttpConfig::default(),
        }
    }
}

fn is_digits(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_digit())
}

fn validate_return_url(name: &str, url: &Url) -> Result<()> {
    if url.scheme() != "https" {
        return Err(PayboxError::ConfigError(format!(
            "return_urls.{name} must use HTTPS, got: {}",
            url.scheme()
        )));
    }

    if let Some(host) = url.host_str() {
        let host = host.to_lowercase();
        if host == "localhost" || host == "[::1]" || host.starts_with("127.") {
            return Err(PayboxError::ConfigError(format!(
                "return_urls.{name} must not be localhost or loopback: {host}"
            )));
        }
    }

    Ok(())
}
