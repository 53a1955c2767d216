//! Paybox request builders.
//!
//! - [`Authorization`]: Paybox System hosted payment form, with or without
//!   immediate capture, signed with `PBX_HMAC`
//! - [`DirectRequest`]: Paybox Direct server-to-server capture, cancel and refund
//!
//! Builders are consumed by value so that fallible setters chain with `?`:
//!
//! ```rust,no_run
//! # use paybox_gateway::{
//! #     PayboxGateway, amount::Currency, error::Result, signing::FileSecretStore,
//! #     transport::HttpTransport,
//! # };
//! # use rust_decimal::Decimal;
//! # use url::Url;
//! # async fn example(gateway: &PayboxGateway<HttpTransport, FileSecretStore>) -> Result<()> {
//! let previous = Url::parse("https://tpeweb.paybox.com/cgi/MYchoix_pagepaiement.cgi").unwrap();
//! let response = gateway
//!     .capture()
//!     .set_amount(Decimal::new(1234, 2), Currency::Eur)?
//!     .set_payment_number("order-42")
//!     .set_day_request_number(5)?
//!     .set_paybox_call_number("0000783458")
//!     .set_paybox_transaction_number("0000571234")
//!     .set_url_from(&previous, false)?
//!     .send(None)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod authorization;
mod direct;
mod return_fields;

pub use authorization::{Authorization, CaptureMode, Language};
use chrono::{DateTime, FixedOffset, Local};
pub use direct::{DirectOperation, DirectRequest};
use rust_decimal::Decimal;
pub use return_fields::{DEFAULT_SIGNATURE_NAME, ReturnField, ReturnFields};
use url::Url;

use crate::{
    amount::{AmountFormatter, Currency},
    config::PayboxConfig,
    error::{PayboxError, Result},
    server::{SERVICE, ServerSelector},
};

/// Paybox Direct `DATEQ` format: `ddMMyyyyHHmmss`.
pub const DIRECT_DATE_FORMAT: &str = "%d%m%Y%H%M%S";

/// Paybox System `PBX_TIME` format: ISO 8601 with offset.
pub const SYSTEM_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// How the amount is rendered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AmountStyle {
    /// Ten digits, zero-padded (Paybox Direct).
    Padded,
    /// Bare integer (Paybox System).
    Unpadded,
}

/// State shared by every builder: merchant configuration, amount, reference,
/// timestamp and the resolved server.
#[derive(Debug, Clone)]
pub(crate) struct RequestCore<'a> {
    pub(crate) config: &'a PayboxConfig,
    selector: &'a ServerSelector,
    operation: &'static str,
    amount_style: AmountStyle,
    pub(crate) amount: Option<String>,
    pub(crate) currency: Currency,
    pub(crate) reference: Option<String>,
    pub(crate) time: Option<DateTime<FixedOffset>>,
    pub(crate) url: Option<Url>,
}

impl<'a> RequestCore<'a> {
    pub(crate) fn new(
        config: &'a PayboxConfig,
        selector: &'a ServerSelector,
        operation: &'static str,
        amount_style: AmountStyle,
    ) -> Self {
        Self {
            config,
            selector,
            operation,
            amount_style,
            amount: None,
            currency: config.currency,
            reference: None,
            time: None,
            url: None,
        }
    }

    pub(crate) fn set_amount(&mut self, amount: Decimal, currency: Currency) -> Result<()> {
        let formatted = match self.amount_style {
            AmountStyle::Padded => AmountFormatter::format(amount, currency)?,
            AmountStyle::Unpadded => AmountFormatter::minor_units(amount, currency)?,
        };
        self.amount = Some(formatted);
        self.currency = currency;
        Ok(())
    }

    pub(crate) fn set_reference(&mut self, reference: String) {
        self.reference = Some(reference);
    }

    pub(crate) fn set_url(&mut self) -> Result<()> {
        self.url = Some(self.selector.select(SERVICE, self.operation)?);
        Ok(())
    }

    pub(crate) fn set_url_from(&mut self, previous: &Url, other: bool) -> Result<()> {
        self.url = Some(self.selector.find_from(SERVICE, self.operation, previous, other)?);
        Ok(())
    }

    pub(crate) fn require_amount(&self) -> Result<&str> {
        self.amount.as_deref().ok_or(PayboxError::MissingField("amount"))
    }

    pub(crate) fn require_reference(&self) -> Result<&str> {
        self.reference.as_deref().ok_or(PayboxError::MissingField("payment reference"))
    }

    pub(crate) fn require_url(&self) -> Result<&Url> {
        self.url.as_ref().ok_or(PayboxError::MissingField("url"))
    }

    /// Set time, or the current local time.
    pub(crate) fn time_or_now(&self) -> DateTime<FixedOffset> {
        self.time.unwrap_or_else(|| Local::now().fixed_offset())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::server::OPERATION_DIRECT;

    #[test]
    fn test_date_formats() {
        let paris = FixedOffset::east_opt(2 * 3600).unwrap();
        let time = paris.with_ymd_and_hms(2024, 5, 1, 9, 5, 3).unwrap();

        assert_eq!(time.format(DIRECT_DATE_FORMAT).to_string(), "01052024090503");
        assert_eq!(time.format(SYSTEM_TIME_FORMAT).to_string(), "2024-05-01T09:05:03+02:00");
    }

    #[test]
    fn test_core_amount_styles() {
        let config = PayboxConfig::for_tests();
        let selector = ServerSelector::paybox_defaults(true).unwrap();

        let mut padded =
            RequestCore::new(&config, &selector, OPERATION_DIRECT, AmountStyle::Padded);
        padded.set_amount(Decimal::new(1234, 2), Currency::Eur).unwrap();
        assert_eq!(padded.require_amount().unwrap(), "0000001234");

        let mut bare =
            RequestCore::new(&config, &selector, OPERATION_DIRECT, AmountStyle::Unpadded);
        bare.set_amount(Decimal::new(1234, 2), Currency::Usd).unwrap();
        assert_eq!(bare.require_amount().unwrap(), "1234");
        assert_eq!(bare.currency, Currency::Usd);
    }

    #[test]
    fn test_core_missing_values() {
        let config = PayboxConfig::for_tests();
        let selector = ServerSelector::paybox_defaults(true).unwrap();
        let core = RequestCore::new(&config, &selector, OPERATION_DIRECT, AmountStyle::Padded);

        assert!(matches!(core.require_amount(), Err(PayboxError::MissingField("amount"))));
        assert!(matches!(core.require_reference(), Err(PayboxError::MissingField(_))));
        assert!(matches!(core.require_url(), Err(PayboxError::MissingField("url"))));
    }

    #[test]
    fn test_core_invalid_amount_keeps_previous() {
        let config = PayboxConfig::for_tests();
        let selector = ServerSelector::paybox_defaults(true).unwrap();
        let mut core = RequestCore::new(&config, &selector, OPERATION_DIRECT, AmountStyle::Padded);

        core.set_amount(Decimal::ONE, Currency::Eur).unwrap();
        assert!(core.set_amount(Decimal::NEGATIVE_ONE, Currency::Eur).is_err());
        assert_eq!(core.require_amount().unwrap(), "0000000100");
    }
}
