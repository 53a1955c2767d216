//! Paybox System authorization form.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{AmountStyle, RequestCore, ReturnFields, SYSTEM_TIME_FORMAT};
use crate::{
    amount::Currency,
    config::PayboxConfig,
    error::{PayboxError, Result},
    params::ParameterMap,
    server::{OPERATION_SYSTEM, ServerSelector},
    signing::{HmacHashGenerator, SecretStore, SignedRequest},
};

/// Hash algorithm announced in `PBX_HASH`.
const HASH_ALGORITHM: &str = "SHA512";

/// Whether the payment is captured together with the authorization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaptureMode {
    /// Authorize and capture at once.
    #[default]
    WithCapture,
    /// Authorize only (`PBX_AUTOSEULE=O`); capture later through Paybox Direct.
    WithoutCapture,
}

/// Language of the hosted payment page (`PBX_LANGUE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// French.
    French,
    /// English.
    English,
    /// Spanish.
    Spanish,
    /// Italian.
    Italian,
    /// German.
    German,
    /// Dutch.
    Dutch,
    /// Swedish.
    Swedish,
    /// Portuguese.
    Portuguese,
}

impl Language {
    /// Paybox three-letter code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::French => "FRA",
            Self::English => "GBR",
            Self::Spanish => "ESP",
            Self::Italian => "ITA",
            Self::German => "DEU",
            Self::Dutch => "NLD",
            Self::Swedish => "SWE",
            Self::Portuguese => "PRT",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Paybox System payment form.
///
/// The customer's browser posts the [`SignedRequest`] returned by
/// [`sign`](Self::sign) to Paybox, which hosts the card entry page.
///
/// Field order:
/// `PBX_SITE, PBX_RANG, PBX_IDENTIFIANT, PBX_TOTAL, PBX_DEVISE, PBX_CMD,
/// PBX_PORTEUR, PBX_RETOUR, PBX_HASH, PBX_TIME, [PBX_LANGUE], [PBX_EFFECTUE],
/// [PBX_REFUSE], [PBX_ANNULE], [PBX_ATTENTE], [PBX_REPONDRE_A], [PBX_AUTOSEULE]`,
/// then `PBX_HMAC` once signed.
#[derive(Debug, Clone)]
pub struct Authorization<'a, S> {
    core: RequestCore<'a>,
    generator: &'a HmacHashGenerator<S>,
    mode: CaptureMode,
    customer_email: Option<String>,
    return_fields: ReturnFields,
    language: Option<Language>,
    accepted_url: Option<Url>,
    refused_url: Option<Url>,
    aborted_url: Option<Url>,
    waiting_url: Option<Url>,
    notification_url: Option<Url>,
}

impl<'a, S: SecretStore> Authorization<'a, S> {
    /// Creates a form with the return URLs and return-field schema from `config`.
    #[must_use]
    pub fn new(
        config: &'a PayboxConfig,
        selector: &'a ServerSelector,
        generator: &'a HmacHashGenerator<S>,
        mode: CaptureMode,
    ) -> Self {
        let urls = &config.return_urls;
        Self {
            core: RequestCore::new(config, selector, OPERATION_SYSTEM, AmountStyle::Unpadded),
            generator,
            mode,
            customer_email: None,
            return_fields: config.notification.schema(),
            language: config.language,
            accepted_url: urls.accepted.clone(),
            refused_url: urls.refused.clone(),
            aborted_url: urls.aborted.clone(),
            waiting_url: urls.waiting.clone(),
            notification_url: urls.notification.clone(),
        }
    }

    /// Sets the amount, sent unpadded in minor units.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::InvalidAmount`] for negative or oversized amounts.
    pub fn set_amount(mut self, amount: Decimal, currency: Currency) -> Result<Self> {
        self.core.set_amount(amount, currency)?;
        Ok(self)
    }

    /// Sets the merchant order reference (`PBX_CMD`).
    #[must_use]
    pub fn set_payment_number(mut self, reference: impl Into<String>) -> Self {
        self.core.set_reference(reference.into());
        self
    }

    /// Sets the customer e-mail (`PBX_PORTEUR`).
    #[must_use]
    pub fn set_customer_email(mut self, email: impl Into<String>) -> Self {
        self.customer_email = Some(email.into());
        self
    }

    /// Sets `PBX_TIME`; defaults to the current local time.
    #[must_use]
    pub fn set_time(mut self, time: DateTime<FixedOffset>) -> Self {
        self.core.time = Some(time);
        self
    }

    /// Sets the payment page language.
    #[must_use]
    pub fn set_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    /// Replaces the callback field schema.
    ///
    /// The signature variable keeps the configured `notification.signature_field`
    /// name. Verify the callbacks with
    /// [`PayboxGateway::verifier_for`](crate::PayboxGateway::verifier_for) and the
    /// same schema.
    #[must_use]
    pub fn set_return_fields(mut self, fields: ReturnFields) -> Self {
        let signature = self.core.config.notification.signature_field.clone();
        self.return_fields = fields.with_signature_name(signature);
        self
    }

    /// Overrides the page shown after an accepted payment.
    #[must_use]
    pub fn set_accepted_url(mut self, url: Url) -> Self {
        self.accepted_url = Some(url);
        self
    }

    /// Overrides the page shown after a refused payment.
    #[must_use]
    pub fn set_refused_url(mut self, url: Url) -> Self {
        self.refused_url = Some(url);
        self
    }

    /// Overrides the page shown after the customer aborted.
    #[must_use]
    pub fn set_aborted_url(mut self, url: Url) -> Self {
        self.aborted_url = Some(url);
        self
    }

    /// Overrides the page shown while the payment is pending.
    #[must_use]
    pub fn set_waiting_url(mut self, url: Url) -> Self {
        self.waiting_url = Some(url);
        self
    }

    /// Overrides the IPN callback URL.
    #[must_use]
    pub fn set_notification_url(mut self, url: Url) -> Self {
        self.notification_url = Some(url);
        self
    }

    /// Targets the primary Paybox System server.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::NoServerConfigured`] if no server is configured.
    pub fn set_url(mut self) -> Result<Self> {
        self.core.set_url()?;
        Ok(self)
    }

    /// Targets a server relative to `previous`.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::NoServerConfigured`] if no server is configured.
    pub fn set_url_from(mut self, previous: &Url, other: bool) -> Result<Self> {
        self.core.set_url_from(previous, other)?;
        Ok(self)
    }

    /// Resolved server, if any.
    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        self.core.url.as_ref()
    }

    /// Callback field schema.
    #[must_use]
    pub const fn return_fields(&self) -> &ReturnFields {
        &self.return_fields
    }

    /// Builds the unsigned form fields.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::MissingField`] when the amount, reference or
    /// customer e-mail is missing.
    pub fn parameters(&self) -> Result<ParameterMap> {
        let config = self.core.config;
        let email =
            self.customer_email.as_deref().ok_or(PayboxError::MissingField("customer email"))?;

        let mut params = ParameterMap::new();
        params.insert("PBX_SITE", config.site.as_str());
        params.insert("PBX_RANG", config.rank.as_str());
        params.insert("PBX_IDENTIFIANT", config.identifier.as_str());
        params.insert("PBX_TOTAL", self.core.require_amount()?);
        params.insert("PBX_DEVISE", self.core.currency.numeric_code());
        params.insert("PBX_CMD", self.core.require_reference()?);
        params.insert("PBX_PORTEUR", email);
        params.insert("PBX_RETOUR", self.return_fields.to_pbx_retour());
        params.insert("PBX_HASH", HASH_ALGORITHM);
        params.insert("PBX_TIME", self.core.time_or_now().format(SYSTEM_TIME_FORMAT).to_string());
        params.insert_opt("PBX_LANGUE", self.language.map(Language::code));
        params.insert_opt("PBX_EFFECTUE", self.accepted_url.as_ref().map(Url::as_str));
        params.insert_opt("PBX_REFUSE", self.refused_url.as_ref().map(Url::as_str));
        params.insert_opt("PBX_ANNULE", self.aborted_url.as_ref().map(Url::as_str));
        params.insert_opt("PBX_ATTENTE", self.waiting_url.as_ref().map(Url::as_str));
        params.insert_opt("PBX_REPONDRE_A", self.notification_url.as_ref().map(Url::as_str));
        if self.mode == CaptureMode::WithoutCapture {
            params.insert("PBX_AUTOSEULE", "O");
        }

        Ok(params)
    }

    /// Builds and signs the form.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::MissingField`] when a mandatory value or the URL is
    /// missing, and secret errors from the generator.
    #[instrument(skip(self), fields(mode = ?self.mode))]
    pub fn sign(&self) -> Result<SignedRequest> {
        let url = self.core.require_url()?.clone();
        let params = self.parameters()?;
        debug!(%url, fields = params.len(), "signing authorization form");
        self.generator.sign(url, params)
    }
}
