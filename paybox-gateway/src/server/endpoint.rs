//! Server endpoint configuration types.
//!
//! This module defines TOML-deserializable descriptions of Paybox servers.

use serde::Deserialize;
use url::Url;

use crate::error::{PayboxError, Result};

/// Role of an endpoint within its candidate list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerRole {
    /// Preferred server, tried first.
    #[default]
    Primary,
    /// Fallback server.
    Backup,
}

/// How [`ServerSelector::find_from`](super::ServerSelector::find_from) moves to
/// another server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPolicy {
    /// Next slot, wrapping to the first candidate after the last.
    #[default]
    Cycle,
    /// Primary to first backup, any backup back to the primary.
    PrimaryBackup,
}

/// A single Paybox server.
///
/// # Examples
///
/// ```
/// use paybox_gateway::server::{ServerEndpoint, ServerRole};
///
/// let toml = r#"
///     service = "paybox"
///     operation = "paybox_direct"
///     role = "backup"
///     url = "https://ppps1.paybox.com/PPPS.php"
/// "#;
///
/// let endpoint: ServerEndpoint = toml::from_str(toml).unwrap();
/// assert_eq!(endpoint.role, ServerRole::Backup);
/// assert!(endpoint.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerEndpoint {
    /// Service the endpoint belongs to (e.g. `paybox`).
    pub service: String,

    /// Operation type served (e.g. `paybox_direct`).
    ///
    /// Endpoints without an operation form the service default list, used for
    /// operations that have no dedicated servers.
    #[serde(default)]
    pub operation: Option<String>,

    /// Primary or backup.
    #[serde(default)]
    pub role: ServerRole,

    /// Absolute URL requests are posted to.
    pub url: Url,
}

impl ServerEndpoint {
    /// Creates an endpoint dedicated to `operation`.
    #[must_use]
    pub fn new(
        service: impl Into<String>,
        operation: impl Into<String>,
        role: ServerRole,
        url: Url,
    ) -> Self {
        Self { service: service.into(), operation: Some(operation.into()), role, url }
    }

    /// Creates an endpoint in the service default list.
    #[must_use]
    pub fn service_default(service: impl Into<String>, role: ServerRole, url: Url) -> Self {
        Self { service: service.into(), operation: None, role, url }
    }

    /// Validates the endpoint.
    ///
    /// Checks that:
    /// - the service name is not empty
    /// - the URL uses HTTPS and has a host
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::ConfigError`] if any check fails.
    pub fn validate(&self) -> Result<()> {
        if self.service.trim().is_empty() {
            return Err(PayboxError::ConfigError(format!(
                "endpoint {} has an empty service name",
                self.url
            )));
        }

        if self.url.scheme() != "https" {
            return Err(PayboxError::ConfigError(format!(
                "endpoint URL must use HTTPS, got: {}",
                self.url
            )));
        }

        if self.url.host_str().is_none() {
            return Err(PayboxError::ConfigError(format!("endpoint URL has no host: {}", self.url)));
        }

        Ok(())
    }

    pub(crate) fn serves(&self, service: &str, operation: Option<&str>) -> bool {
        self.service == service && self.operation.as_deref() == operation
    }
}

/// `[servers]` configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Rotation policy used when moving to another server.
    #[serde(default)]
    pub rotation: RotationPolicy,

    /// Configured endpoints, in preference order within each role.
    #[serde(default)]
    pub endpoints: Vec<ServerEndpoint>,
}

impl ServerConfig {
    /// Validates every endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::ConfigError`] if the list is empty or an endpoint
    /// is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(PayboxError::ConfigError(
                "[servers] must list at least one endpoint".to_owned(),
            ));
        }

        self.endpoints.iter().try_for_each(ServerEndpoint::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_defaults_to_primary() {
        let toml = r#"
            service = "paybox"
            url = "https://tpeweb.paybox.com/cgi/MYchoix_pagepaiement.cgi"
        "#;

        let endpoint: ServerEndpoint = toml::from_str(toml).unwrap();
        assert_eq!(endpoint.role, ServerRole::Primary);
        assert!(endpoint.operation.is_none());
    }

    #[test]
    fn test_server_config_from_toml() {
        let toml = r#"
            rotation = "primary_backup"

            [[endpoints]]
            service = "paybox"
            operation = "paybox_direct"
            role = "primary"
            url = "https://ppps.paybox.com/PPPS.php"

            [[endpoints]]
            service = "paybox"
            operation = "paybox_direct"
            role = "backup"
            url = "https://ppps1.paybox.com/PPPS.php"
        "#;

        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.rotation, RotationPolicy::PrimaryBackup);
        assert_eq!(config.endpoints.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rotation_defaults_to_cycle() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.rotation, RotationPolicy::Cycle);
    }

    #[test]
    fn test_http_endpoint_rejected() {
        let endpoint = ServerEndpoint::new(
            "paybox",
            "paybox_direct",
            ServerRole::Primary,
            Url::parse("http://ppps.paybox.com/PPPS.php").unwrap(),
        );
        let result = endpoint.validate();
        assert!(matches!(result, Err(PayboxError::ConfigError(_))));
    }

    #[test]
    fn test_empty_service_rejected() {
        let endpoint = ServerEndpoint::service_default(
            " ",
            ServerRole::Primary,
            Url::parse("https://ppps.paybox.com/PPPS.php").unwrap(),
        );
        assert!(endpoint.validate().is_err());
    }

    #[test]
    fn test_empty_endpoint_list_rejected() {
        assert!(ServerConfig::default().validate().is_err());
    }

    #[test]
    fn test_unknown_role_rejected() {
        let toml = r#"
            service = "paybox"
            role = "tertiary"
            url = "https://ppps.paybox.com/PPPS.php"
        "#;
        assert!(toml::from_str::<ServerEndpoint>(toml).is_err());
    }
}
