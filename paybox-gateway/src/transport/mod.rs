//! Transport abstraction for Paybox Direct calls.
//!
//! Request builders never open connections themselves: they hand the resolved
//! URL and the ordered fields to a [`Transport`], which posts them as an
//! `application/x-www-form-urlencoded` body and returns the raw reply text.
//!
//! The caller awaits the returned future. Transports neither retry nor switch
//! servers; failover is decided by the caller with
//! [`ServerSelector::find_from`](crate::server::ServerSelector::find_from).
//!
//! # Examples
//!
//! ```rust,no_run
//! use paybox_gateway::{
//!     params::ParameterMap,
//!     transport::{HttpTransport, Transport},
//! };
//! use url::Url;
//!
//! # async fn example() -> paybox_gateway::error::Result<()> {
//! let transport = HttpTransport::new()?;
//! let url = Url::parse("https://preprod-ppps.paybox.com/PPPS.php").unwrap();
//!
//! let params: ParameterMap = [("VERSION", "00104"), ("TYPE", "00002")].into_iter().collect();
//! let body = transport.post(&url, &params).await?;
//! println!("{body}");
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;

use url::Url;

use crate::{error::Result, params::ParameterMap};

pub mod config;
pub mod http;

pub use config::{HttpConfig, HttpVersion};
pub use http::HttpTransport;

/// Capability to POST a form to a Paybox server.
///
/// Implementations must send `params` in their iteration order and return the
/// response body as text, decoded with
/// [`decode_text`](crate::params::decode_text) when it arrives as bytes.
///
/// # Errors
///
/// Network-layer problems are reported as
/// [`PayboxError::TransportFailure`](crate::PayboxError::TransportFailure) or
/// [`PayboxError::HttpError`](crate::PayboxError::HttpError).
pub trait Transport: Send + Sync {
    /// Posts `params` to `url` and returns the response body.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent or the server answers with a
    /// non-success status.
    fn post<'a>(
        &'a self,
        url: &'a Url,
        params: &'a ParameterMap,
    ) -> impl Future<Output = Result<String>> + Send + 'a;

    /// Returns the protocol name for logging.
    fn protocol_name(&self) -> &'static str;
}
