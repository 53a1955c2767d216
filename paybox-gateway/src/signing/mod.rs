//! Paybox HMAC signing.
//!
//! Every Paybox System form and every IPN callback is authenticated with an
//! HMAC-SHA512 computed over the *canonical string* of the fields: `key=value`
//! pairs joined by `&`, in the order they are sent, without URL encoding.
//!
//! # Key Components
//!
//! - [`HmacHashGenerator`]: computes and verifies signatures
//! - [`SecretStore`]: where the hexadecimal key comes from
//! - [`SignedRequest`]: target URL plus parameters ending with `PBX_HMAC`
//!
//! # Signature Computation
//!
//! ```text
//! canonical = "PBX_SITE=1999888&PBX_RANG=32&...&PBX_TIME=2024-05-01T10:00:00+02:00"
//! PBX_HMAC  = upper(hex(HMAC-SHA512(hex_decode(secret), canonical)))
//! ```
//!
//! # Examples
//!
//! ```rust
//! use paybox_gateway::{
//!     params::ParameterMap,
//!     signing::{HmacHashGenerator, StaticSecretStore},
//! };
//! use url::Url;
//!
//! # fn example() -> paybox_gateway::error::Result<()> {
//! let store = StaticSecretStore::new().with_secret("paybox.hmac_key", "736563726574");
//! let generator = HmacHashGenerator::new(store, "paybox.hmac_key");
//!
//! let params: ParameterMap =
//!     [("param1", "value"), ("param2", "value % 2")].into_iter().collect();
//! let url = Url::parse("https://tpeweb.paybox.com/cgi/MYchoix_pagepaiement.cgi").unwrap();
//!
//! let signed = generator.sign(url, params)?;
//! assert!(signed.signature().unwrap().starts_with("5410E2CC"));
//! # Ok(())
//! # }
//! ```
//!
//! # Security Considerations
//!
//! - The key is loaded per call and held in a [`zeroize::Zeroizing`] buffer
//! - Verification compares in constant time
//! - Secrets and signatures are never recorded in tracing spans

mod generator;
mod secret;


pub use generator::HmacHashGenerator;
pub use secret::{EnvSecretStore, FileSecretStore, SecretStore, StaticSecretStore};
use serde::Serialize;
use url::Url;

use crate::params::ParameterMap;

/// Name of the field carrying the signature on outgoing Paybox System forms.
pub const HMAC_FIELD: &str = "PBX_HMAC";

/// A request ready to be posted: the target and its signed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedRequest {
    /// Server the form must be submitted to.
    pub url: Url,
    /// Fields in submission order, `PBX_HMAC` last.
    pub params: ParameterMap,
}

impl SignedRequest {
    /// The computed signature, if present.
    #[must_use]
    pub fn signature(&self) -> Option<&str> {
        self.params.get(HMAC_FIELD)
    }

    /// The fields as an `application/x-www-form-urlencoded` body.
    #[must_use]
    pub fn form_body(&self) -> String {
        self.params.to_form_body()
    }
}
