//! Error types for the Paybox gateway.
//!
//! All fallible operations return [`Result<T>`], an alias over [`PayboxError`].
//! Errors derive [`std::error::Error`] through [`thiserror::Error`].
//!
//! # Error Categories
//!
//! - **Validation errors** ([`PayboxError::InvalidAmount`],
//!   [`PayboxError::InvalidSequenceNumber`], [`PayboxError::InvalidSecretEncoding`],
//!   [`PayboxError::MissingField`], [`PayboxError::InvalidInput`]): fatal to the
//!   current build call, never retried internally
//! - **Configuration errors** ([`PayboxError::NoServerConfigured`],
//!   [`PayboxError::ConfigError`]): misconfiguration, not a transient condition
//! - **Infrastructure errors** ([`PayboxError::SecretUnavailable`],
//!   [`PayboxError::TransportFailure`], [`PayboxError::HttpError`]): the caller
//!   may retry, optionally against another server
//! - **Protocol errors** ([`PayboxError::MalformedResponse`]): Paybox replied with
//!   something that is not a Paybox Direct answer
//!
//! A notification whose signature does not match is *not* an error: verification
//! returns `false` for it.
//!
//! # Examples
//!
//! ```
//! use paybox_gateway::error::{PayboxError, Result};
//!
//! fn check_reference(reference: &str) -> Result<&str> {
//!     if reference.is_empty() {
//!         return Err(PayboxError::MissingField("REFERENCE"));
//!     }
//!     Ok(reference)
//! }
//!
//! assert!(check_reference("order-1").is_ok());
//! ```

use thiserror::Error;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, PayboxError>;

/// Errors that can occur while building, signing, sending or parsing Paybox messages.
///
/// # Error Recovery
///
/// - **Transient errors** ([`SecretUnavailable`](Self::SecretUnavailable),
///   [`TransportFailure`](Self::TransportFailure), [`HttpError`](Self::HttpError)):
///   retry the whole operation; for transport failures consider
///   [`ServerSelector::find_from`](crate::server::ServerSelector::find_from) with
///   `other = true`
/// - **Validation errors**: fix the input
/// - **Configuration errors**: fix the configuration file
#[must_use = "errors should be handled, propagated, or explicitly panicked"]
#[derive(Debug, Error)]
pub enum PayboxError {
    /// Amount is negative or does not fit the protocol width.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Day request number is outside `[1, 2147483647]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use paybox_gateway::error::PayboxError;
    ///
    /// let err = PayboxError::InvalidSequenceNumber(0);
    /// assert!(err.to_string().contains("1..=2147483647"));
    /// ```
    #[error("Invalid day request number {0}: must be in range 1..=2147483647")]
    InvalidSequenceNumber(i64),

    /// The signing secret is not valid hexadecimal text.
    #[error("Invalid secret encoding: {0}")]
    InvalidSecretEncoding(String),

    /// The signing secret could not be loaded from its store.
    ///
    /// # Recovery
    ///
    /// Check that the secret file or environment variable exists and is
    /// readable, then retry the signing operation.
    #[error("Secret unavailable: {0}")]
    SecretUnavailable(String),

    /// No endpoint is configured for the requested service and operation type.
    #[error("No server configured for service '{service}' and operation '{operation}'")]
    NoServerConfigured {
        /// Service name (e.g. `paybox`).
        service: String,
        /// Operation type (e.g. `paybox_direct`).
        operation: String,
    },

    /// Network-layer failure reported by a transport.
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// HTTP request failed.
    ///
    /// Wraps [`reqwest::Error`] for timeouts, refused connections, DNS and TLS
    /// failures.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Configuration is invalid.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A field the protocol requires was never set on the builder.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Paybox replied with a body that cannot be decoded.
    #[error("Malformed Paybox response: {0}")]
    MalformedResponse(String),

    /// Caller supplied a value the protocol cannot carry.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PayboxError {
    /// Returns `true` when the failure is transient and the caller may retry.
    ///
    /// Validation, configuration and protocol errors are never retryable.
    /// `reqwest` errors are retryable for timeouts, connection failures and
    /// server-side (5xx) statuses.
    ///
    /// # Examples
    ///
    /// ```
    /// use paybox_gateway::PayboxError;
    ///
    /// assert!(PayboxError::TransportFailure("reset".into()).is_retryable());
    /// assert!(!PayboxError::InvalidSequenceNumber(0).is_retryable());
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::HttpError(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            Self::SecretUnavailable(_) | Self::TransportFailure(_) => true,
            Self::InvalidAmount(_)
            | Self::InvalidSequenceNumber(_)
            | Self::InvalidSecretEncoding(_)
            | Self::NoServerConfigured { .. }
            | Self::ConfigError(_)
            | Self::MissingField(_)
            | Self::MalformedResponse(_)
            | Self::InvalidInput(_) => false,
        }
    }

    /// Returns `true` for network-layer failures.
    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        matches!(self, Self::TransportFailure(_) | Self::HttpError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = PayboxError::InvalidAmount("-1".into());
        assert_eq!(error.to_string(), "Invalid amount: -1");
    }

    #[test]
    fn test_no_server_configured_display() {
        let error = PayboxError::NoServerConfigured {
            service: "paybox".to_owned(),
            operation: "paybox_direct".to_owned(),
        };
        assert_eq!(
            error.to_string(),
            "No server configured for service 'paybox' and operation 'paybox_direct'"
        );
    }

    #[test]
    fn test_missing_field_display() {
        let error = PayboxError::MissingField("NUMAPPEL");
        assert_eq!(error.to_string(), "Missing required field: NUMAPPEL");
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(PayboxError::SecretUnavailable("io".into()).is_retryable());
        assert!(PayboxError::TransportFailure("timeout".into()).is_retryable());
    }

    #[test]
    fn test_not_retryable_kinds() {
        assert!(!PayboxError::InvalidAmount("-1".into()).is_retryable());
        assert!(!PayboxError::InvalidSecretEncoding("zz".into()).is_retryable());
        assert!(!PayboxError::ConfigError("bad".into()).is_retryable());
        assert!(!PayboxError::MalformedResponse("empty".into()).is_retryable());
        assert!(
            !PayboxError::NoServerConfigured {
                service: "paybox".into(),
                operation: "paybox".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_transport_failure_classification() {
        assert!(PayboxError::TransportFailure("reset".into()).is_transport_failure());
        assert!(!PayboxError::MissingField("SITE").is_transport_failure());
    }
}
