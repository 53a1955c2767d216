//! Instant payment notification (IPN) verification.
//!
//! After a Paybox System payment, Paybox calls the `PBX_REPONDRE_A` URL with the
//! fields requested in `PBX_RETOUR`, the signature last. A callback is accepted
//! only when its signature matches and, optionally, when it comes from a
//! trusted Paybox address.
//!
//! A bad signature is an expected outcome for hostile input: verification
//! returns `false` and never fails.

use std::net::IpAddr;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::{
    amount::{AmountFormatter, Currency},
    params::ParameterMap,
    requests::{DEFAULT_SIGNATURE_NAME, ReturnField, ReturnFields},
    signing::{HmacHashGenerator, SecretStore},
};

/// `[notification]` configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Addresses callbacks are accepted from; empty accepts any source.
    #[serde(default)]
    pub trusted_ips: Vec<IpAddr>,

    /// Name of the signature variable in `PBX_RETOUR`.
    #[serde(default = "default_signature_field")]
    pub signature_field: String,

    /// Callback fields requested in `PBX_RETOUR`; the built-in schema when unset.
    #[serde(default)]
    pub return_fields: Option<ReturnFields>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            trusted_ips: Vec::new(),
            signature_field: default_signature_field(),
            return_fields: None,
        }
    }
}

impl NotificationConfig {
    /// Return-field schema shared by payment forms and the gateway verifier,
    /// with the signature variable named `signature_field`.
    #[must_use]
    pub fn schema(&self) -> ReturnFields {
        self.return_fields
            .clone()
            .unwrap_or_default()
            .with_signature_name(self.signature_field.clone())
    }
}

fn default_signature_field() -> String {
    DEFAULT_SIGNATURE_NAME.to_owned()
}

/// A decoded callback together with its verification result.
#[derive(Debug, Clone)]
pub struct Notification {
    fields: ParameterMap,
    schema: ReturnFields,
    verified: bool,
}

impl Notification {
    /// `true` when the signature matched.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        self.verified
    }

    /// Received fields without the signature, in received order.
    #[must_use]
    pub const fn fields(&self) -> &ParameterMap {
        &self.fields
    }

    /// Value of a return variable, looked up through the schema.
    #[must_use]
    pub fn value(&self, field: ReturnField) -> Option<&str> {
        self.schema.name_of(field).and_then(|name| self.fields.get(name))
    }

    /// Amount in minor units (`M`).
    #[must_use]
    pub fn amount(&self) -> Option<&str> {
        self.value(ReturnField::Amount)
    }

    /// Merchant order reference (`R`).
    #[must_use]
    pub fn order_number(&self) -> Option<&str> {
        self.value(ReturnField::Reference)
    }

    /// Paybox call number (`T`).
    #[must_use]
    pub fn call_number(&self) -> Option<&str> {
        self.value(ReturnField::CallNumber)
    }

    /// Paybox transaction number (`S`).
    #[must_use]
    pub fn transaction_number(&self) -> Option<&str> {
        self.value(ReturnField::TransactionNumber)
    }

    /// Issuer authorization number (`A`).
    #[must_use]
    pub fn authorization_number(&self) -> Option<&str> {
        self.value(ReturnField::AuthorizationNumber)
    }

    /// Response code (`E`).
    #[must_use]
    pub fn response_code(&self) -> Option<&str> {
        self.value(ReturnField::ResponseCode)
    }

    /// `true` when the payment was accepted: response code `00000` and an
    /// authorization number present.
    ///
    /// Check [`is_verified`](Self::is_verified) first.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.response_code() == Some("00000")
            && self.authorization_number().is_some_and(|a| !a.is_empty())
    }

    /// `true` when the returned amount equals `amount` in `currency`.
    #[must_use]
    pub fn matches_amount(&self, amount: Decimal, currency: Currency) -> bool {
        let Ok(expected) = AmountFormatter::minor_units(amount, currency) else {
            return false;
        };
        match (self.amount().map(str::parse::<u64>), expected.parse::<u64>()) {
            (Some(Ok(received)), Ok(expected)) => received == expected,
            _ => false,
        }
    }
}

/// Verifies IPN callbacks.
///
/// # Examples
///
/// ```
/// use paybox_gateway::{
///     notification::{NotificationConfig, NotificationVerifier},
///     params::ParameterMap,
///     requests::ReturnFields,
///     signing::{HmacHashGenerator, StaticSecretStore},
/// };
///
/// let store = StaticSecretStore::new().with_secret("hmac", "736563726574");
/// let generator = HmacHashGenerator::new(store, "hmac");
///
/// let params: ParameterMap =
///     [("amount", "1234"), ("order_number", "order-1")].into_iter().collect();
/// let signature = generator.get(&params)?;
/// let raw = format!("{}&signature={signature}", params.to_form_body());
///
/// let config = NotificationConfig::default();
/// let verifier = NotificationVerifier::new(generator, ReturnFields::default(), &config);
/// let notification = verifier.verify_query(&raw);
///
/// assert!(notification.is_verified());
/// assert_eq!(notification.order_number(), Some("order-1"));
/// # Ok::<(), paybox_gateway::PayboxError>(())
/// ```
#[derive(Debug, Clone)]
pub struct NotificationVerifier<S> {
    generator: HmacHashGenerator<S>,
    schema: ReturnFields,
    trusted_ips: Vec<IpAddr>,
}

impl<S: SecretStore> NotificationVerifier<S> {
    /// Creates a verifier.
    ///
    /// The signature variable is renamed to `config.signature_field`.
    #[must_use]
    pub fn new(
        generator: HmacHashGenerator<S>,
        schema: ReturnFields,
        config: &NotificationConfig,
    ) -> Self {
        Self {
            generator,
            schema: schema.with_signature_name(config.signature_field.clone()),
            trusted_ips: config.trusted_ips.clone(),
        }
    }

    /// Generator used to recompute signatures.
    #[must_use]
    pub const fn generator(&self) -> &HmacHashGenerator<S> {
        &self.generator
    }

    /// Name of the signature field.
    #[must_use]
    pub fn signature_field(&self) -> &str {
        self.schema.signature_name()
    }

    /// Checks `supplied` against the received parameters.
    ///
    /// The signature field is excluded from the recomputed HMAC if present.
    /// Any failure, including an unreadable secret, yields `false`.
    #[instrument(skip(self, params, supplied), fields(fields = params.len()))]
    pub fn verify(&self, params: &ParameterMap, supplied: &str) -> bool {
        let mut signed = params.clone();
        signed.remove(self.signature_field());

        match self.generator.verify(&signed, supplied) {
            Ok(true) => true,
            Ok(false) => {
                warn!("notification signature mismatch");
                false
            }
            Err(e) => {
                warn!(error = %e, "notification signature could not be checked");
                false
            }
        }
    }

    /// Decodes a raw query string or form body and verifies it.
    ///
    /// A callback without a signature field is returned unverified.
    #[instrument(skip(self, raw))]
    pub fn verify_query(&self, raw: &str) -> Notification {
        let mut fields = ParameterMap::from_form_body(raw);
        let verified = match fields.remove(self.signature_field()) {
            Some(signature) => self.verify(&fields, &signature),
            None => {
                warn!(field = self.signature_field(), "notification carries no signature");
                false
            }
        };

        debug!(verified, "notification decoded");
        Notification { fields, schema: self.schema.clone(), verified }
    }

    /// `true` when callbacks from `ip` are accepted.
    #[must_use]
    pub fn is_trusted_source(&self, ip: IpAddr) -> bool {
        self.trusted_ips.is_empty() || self.trusted_ips.contains(&ip)
    }
}
