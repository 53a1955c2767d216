//! Paybox Direct server-to-server operations.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use url::Url;

use super::{AmountStyle, DIRECT_DATE_FORMAT, RequestCore};
use crate::{
    amount::Currency,
    config::PayboxConfig,
    error::{PayboxError, Result},
    params::ParameterMap,
    response::DirectResponse,
    server::{OPERATION_DIRECT, ServerSelector},
    transport::Transport,
};

/// Paybox Direct protocol version.
pub const DIRECT_VERSION: &str = "00104";

/// Upper bound of the day request number (`NUMQUESTION`).
const MAX_REQUEST_NUMBER: i64 = 2_147_483_647;

/// Width of the zero-padded `NUMQUESTION` field.
const REQUEST_NUMBER_WIDTH: usize = 10;

/// Paybox Direct operation, sent in `TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectOperation {
    /// Capture of a previously authorized payment.
    Capture,
    /// Cancellation of an authorized or captured payment.
    Cancel,
    /// Refund of a captured payment.
    Refund,
}

impl DirectOperation {
    /// Five-digit `TYPE` code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Capture => "00002",
            Self::Cancel => "00005",
            Self::Refund => "00014",
        }
    }
}

impl fmt::Display for DirectOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Capture => "capture",
            Self::Cancel => "cancel",
            Self::Refund => "refund",
        })
    }
}

/// A Paybox Direct request.
///
/// Field order:
/// `VERSION, TYPE, SITE, RANG, CLE, NUMQUESTION, MONTANT, DEVISE, REFERENCE,
/// NUMAPPEL, NUMTRANS, DATEQ`.
///
/// The call and transaction numbers come from the authorization callback
/// ([`Notification::call_number`] and [`Notification::transaction_number`]).
///
/// [`Notification::call_number`]: crate::notification::Notification::call_number
/// [`Notification::transaction_number`]: crate::notification::Notification::transaction_number
#[derive(Debug)]
pub struct DirectRequest<'a, T> {
    core: RequestCore<'a>,
    transport: &'a T,
    operation: DirectOperation,
    request_number: Option<String>,
    call_number: Option<String>,
    transaction_number: Option<String>,
}

impl<'a, T: Transport> DirectRequest<'a, T> {
    /// Creates a request for `operation`.
    #[must_use]
    pub fn new(
        operation: DirectOperation,
        config: &'a PayboxConfig,
        selector: &'a ServerSelector,
        transport: &'a T,
    ) -> Self {
        Self {
            core: RequestCore::new(config, selector, OPERATION_DIRECT, AmountStyle::Padded),
            transport,
            operation,
            request_number: None,
            call_number: None,
            transaction_number: None,
        }
    }

    /// Operation sent in `TYPE`.
    #[must_use]
    pub const fn operation(&self) -> DirectOperation {
        self.operation
    }

    /// Sets the amount, sent as ten zero-padded digits.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::InvalidAmount`] for negative or oversized amounts.
    pub fn set_amount(mut self, amount: Decimal, currency: Currency) -> Result<Self> {
        self.core.set_amount(amount, currency)?;
        Ok(self)
    }

    /// Sets the merchant reference (`REFERENCE`).
    #[must_use]
    pub fn set_payment_number(mut self, reference: impl Into<String>) -> Self {
        self.core.set_reference(reference.into());
        self
    }

    /// Sets the number of this request within the current day (`NUMQUESTION`).
    ///
    /// The counter is owned by the caller; it must be unique per day.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::InvalidSequenceNumber`] outside `[1, 2147483647]`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use paybox_gateway::{
    /// #     config::PayboxConfig, error::Result, requests::{DirectOperation, DirectRequest},
    /// #     server::ServerSelector, transport::HttpTransport,
    /// # };
    /// # fn example(
    /// #     config: &PayboxConfig,
    /// #     selector: &ServerSelector,
    /// #     transport: &HttpTransport,
    /// # ) -> Result<()> {
    /// let request = DirectRequest::new(DirectOperation::Capture, config, selector, transport)
    ///     .set_day_request_number(5)?;
    /// assert_eq!(request.day_request_number(), Some("0000000005"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn set_day_request_number(mut self, number: i64) -> Result<Self> {
        if !(1..=MAX_REQUEST_NUMBER).contains(&number) {
            return Err(PayboxError::InvalidSequenceNumber(number));
        }
        self.request_number = Some(format!("{number:0>REQUEST_NUMBER_WIDTH$}"));
        Ok(self)
    }

    /// Formatted day request number, if set.
    #[must_use]
    pub fn day_request_number(&self) -> Option<&str> {
        self.request_number.as_deref()
    }

    /// Sets the Paybox call number (`NUMAPPEL`).
    #[must_use]
    pub fn set_paybox_call_number(mut self, call_number: impl Into<String>) -> Self {
        self.call_number = Some(call_number.into());
        self
    }

    /// Sets the Paybox transaction number (`NUMTRANS`).
    #[must_use]
    pub fn set_paybox_transaction_number(mut self, transaction_number: impl Into<String>) -> Self {
        self.transaction_number = Some(transaction_number.into());
        self
    }

    /// Sets `DATEQ`; defaults to the current local time.
    ///
    /// Paybox expects the time of its own time zone.
    #[must_use]
    pub fn set_time(mut self, time: DateTime<FixedOffset>) -> Self {
        self.core.time = Some(time);
        self
    }

    /// Targets the primary Paybox Direct server.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::NoServerConfigured`] if no server is configured.
    pub fn set_url(mut self) -> Result<Self> {
        self.core.set_url()?;
        Ok(self)
    }

    /// Targets the Paybox Direct server matching `previous`.
    ///
    /// `previous` is usually the Paybox System server that handled the
    /// authorization. With `other = true` another server is chosen, for a
    /// retry after a transport failure or a "repeat" response code.
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

    /// Builds the request fields.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::MissingField`] when the day request number, amount,
    /// reference, call number or transaction number is missing.
    pub fn parameters(&self) -> Result<ParameterMap> {
        let config = self.core.config;
        let request_number =
            self.request_number.as_deref().ok_or(PayboxError::MissingField("NUMQUESTION"))?;
        let call_number =
            self.call_number.as_deref().ok_or(PayboxError::MissingField("NUMAPPEL"))?;
        let transaction_number =
            self.transaction_number.as_deref().ok_or(PayboxError::MissingField("NUMTRANS"))?;

        let mut params = ParameterMap::new();
        params.insert("VERSION", DIRECT_VERSION);
        params.insert("TYPE", self.operation.code());
        params.insert("SITE", config.site.as_str());
        params.insert("RANG", config.rank.as_str());
        params.insert("CLE", config.back_office_password.as_str());
        params.insert("NUMQUESTION", request_number);
        params.insert("MONTANT", self.core.require_amount()?);
        params.insert("DEVISE", self.core.currency.numeric_code());
        params.insert("REFERENCE", self.core.require_reference()?);
        params.insert("NUMAPPEL", call_number);
        params.insert("NUMTRANS", transaction_number);
        params.insert("DATEQ", self.core.time_or_now().format(DIRECT_DATE_FORMAT).to_string());

        Ok(params)
    }

    /// Sends the request to the resolved server and decodes the reply.
    ///
    /// `params` replaces the built fields when given and not empty. The request
    /// is sent exactly once.
    ///
    /// # Errors
    ///
    /// - [`PayboxError::MissingField`] when the URL or a mandatory value is missing
    /// - transport errors from the [`Transport`]
    /// - [`PayboxError::MalformedResponse`] when the reply cannot be decoded
    #[instrument(
        skip(self, params),
        fields(operation = %self.operation, protocol = self.transport.protocol_name())
    )]
    pub async fn send(&self, params: Option<ParameterMap>) -> Result<DirectResponse> {
        let url = self.core.require_url()?;
        let params = match params {
            Some(params) if !params.is_empty() => params,
            _ => self.parameters()?,
        };

        let body = self.transport.post(url, &params).await?;
        let response = DirectResponse::parse(&body)?;

        if response.is_success() {
            info!(
                %url,
                transaction = response.transaction_number(),
                "paybox direct operation accepted"
            );
        } else {
            warn!(
                %url,
                code = response.response_code(),
                repeat = response.should_be_repeated(),
                comment = response.comment(),
                "paybox direct operation not accepted"
            );
        }

        Ok(response)
    }
}
