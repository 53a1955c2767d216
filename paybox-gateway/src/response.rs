//! Paybox Direct reply decoding.
//!
//! Paybox Direct answers with a form-encoded body such as
//! `NUMTRANS=0000571234&...&CODEREPONSE=00000&COMMENTAIRE=Demande traitée avec succès`.
//! `COMMENTAIRE` is ISO-8859-1 text, read through
//! [`decode_text`](crate::params::decode_text).

use std::fmt;

use serde::Serialize;

use crate::{
    error::{PayboxError, Result},
    params::ParameterMap,
};

/// Classification of a Paybox Direct `CODEREPONSE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCode {
    /// `00000`: operation accepted.
    Success,
    /// `00001`, `00097`, `00098`, `00099`: Paybox could not process the request
    /// on this server; send it again, preferably to another server.
    RetryElsewhere,
    /// `001xx`: refused by the card issuer, `xx` being the issuer's code.
    Refused,
    /// Any other code: request rejected by Paybox.
    Rejected,
}

impl ResponseCode {
    /// Classifies a raw five-digit code.
    ///
    /// # Examples
    ///
    /// ```
    /// use paybox_gateway::response::ResponseCode;
    ///
    /// assert_eq!(ResponseCode::classify("00000"), ResponseCode::Success);
    /// assert_eq!(ResponseCode::classify("00097"), ResponseCode::RetryElsewhere);
    /// assert_eq!(ResponseCode::classify("00105"), ResponseCode::Refused);
    /// assert_eq!(ResponseCode::classify("00004"), ResponseCode::Rejected);
    /// ```
    #[must_use]
    pub fn classify(code: &str) -> Self {
        match code {
            "00000" => Self::Success,
            "00001" | "00097" | "00098" | "00099" => Self::RetryElsewhere,
            c if c.len() == 5 && c.starts_with("001") && c.bytes().all(|b| b.is_ascii_digit()) => {
                Self::Refused
            }
            _ => Self::Rejected,
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::RetryElsewhere => "retry elsewhere",
            Self::Refused => "refused",
            Self::Rejected => "rejected",
        })
    }
}

/// A decoded Paybox Direct reply.
///
/// Fields keep the order they were received in; fields without an accessor
/// remain available through [`DirectResponse::get`].
///
/// # Examples
///
/// ```
/// use paybox_gateway::response::DirectResponse;
///
/// let response = DirectResponse::parse(
///     "NUMTRANS=0000571234&NUMAPPEL=0000783458&NUMQUESTION=0000000005&CODEREPONSE=00000",
/// )?;
///
/// assert!(response.is_success());
/// assert_eq!(response.transaction_number(), Some("0000571234"));
/// # Ok::<(), paybox_gateway::PayboxError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectResponse {
    fields: ParameterMap,
}

impl DirectResponse {
    /// Decodes a raw reply body.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::MalformedResponse`] when the body has no
    /// `CODEREPONSE` field.
    pub fn parse(body: &str) -> Result<Self> {
        let fields = ParameterMap::from_form_body(body);
        if !fields.contains_key("CODEREPONSE") {
            let preview: String = body.chars().take(64).collect();
            return Err(PayboxError::MalformedResponse(format!(
                "missing CODEREPONSE in reply: {preview:?}"
            )));
        }
        Ok(Self { fields })
    }

    /// Value of any received field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key)
    }

    /// All received fields, in reply order.
    #[must_use]
    pub const fn fields(&self) -> &ParameterMap {
        &self.fields
    }

    /// `CODEREPONSE`.
    #[must_use]
    pub fn response_code(&self) -> &str {
        self.fields.get("CODEREPONSE").unwrap_or_default()
    }

    /// Classification of [`response_code`](Self::response_code).
    #[must_use]
    pub fn code(&self) -> ResponseCode {
        ResponseCode::classify(self.response_code())
    }

    /// `NUMTRANS`: Paybox transaction number.
    #[must_use]
    pub fn transaction_number(&self) -> Option<&str> {
        self.fields.get("NUMTRANS")
    }

    /// `NUMAPPEL`: Paybox call number.
    #[must_use]
    pub fn call_number(&self) -> Option<&str> {
        self.fields.get("NUMAPPEL")
    }

    /// `NUMQUESTION`: echo of the day request number.
    #[must_use]
    pub fn request_number(&self) -> Option<&str> {
        self.fields.get("NUMQUESTION")
    }

    /// `SITE`.
    #[must_use]
    pub fn site(&self) -> Option<&str> {
        self.fields.get("SITE")
    }

    /// `RANG`.
    #[must_use]
    pub fn rank(&self) -> Option<&str> {
        self.fields.get("RANG")
    }

    /// `AUTORISATION`: authorization number from the issuer.
    #[must_use]
    pub fn authorization_number(&self) -> Option<&str> {
        self.fields.get("AUTORISATION")
    }

    /// `COMMENTAIRE`: human-readable message.
    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        self.fields.get("COMMENTAIRE")
    }

    /// `REFABONNE`: subscriber reference.
    #[must_use]
    pub fn subscriber_reference(&self) -> Option<&str> {
        self.fields.get("REFABONNE")
    }

    /// `PORTEUR`: card holder token.
    #[must_use]
    pub fn card_holder(&self) -> Option<&str> {
        self.fields.get("PORTEUR")
    }

    /// `true` when Paybox accepted the operation.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code() == ResponseCode::Success
    }

    /// `true` when the request should be sent again, to another server.
    ///
    /// Resolve that server with
    /// [`ServerSelector::find_from`](crate::server::ServerSelector::find_from)
    /// and `other = true`.
    #[must_use]
    pub fn should_be_repeated(&self) -> bool {
        self.code() == ResponseCode::RetryElsewhere
    }
}
