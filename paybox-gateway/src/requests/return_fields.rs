//! `PBX_RETOUR` return-field schema.
//!
//! When a payment completes, Paybox calls back the merchant with the fields
//! requested in `PBX_RETOUR`, each under a merchant-chosen name:
//! `amount:M;order_number:R;...;signature:K`.

use std::fmt;

use serde::Deserialize;

/// Variables Paybox can return, identified by a single letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnField {
    /// `M`: amount in minor units.
    Amount,
    /// `R`: merchant order reference (`PBX_CMD`).
    Reference,
    /// `T`: Paybox call number, needed for capture.
    CallNumber,
    /// `A`: issuer authorization number.
    AuthorizationNumber,
    /// `B`: subscription number.
    SubscriptionNumber,
    /// `C`: card type.
    CardType,
    /// `D`: card expiry date.
    CardExpiry,
    /// `E`: response code.
    ResponseCode,
    /// `F`: 3-D Secure authentication status.
    ThreeDsStatus,
    /// `I`: country of the customer IP address.
    IpCountry,
    /// `J`: last two digits of the card number.
    CardLastDigits,
    /// `K`: signature of the returned fields.
    Signature,
    /// `N`: first six digits of the card number.
    CardFirstDigits,
    /// `P`: payment type.
    PaymentType,
    /// `Q`: transaction time.
    TransactionTime,
    /// `S`: Paybox transaction number, needed for capture.
    TransactionNumber,
    /// `W`: processing date.
    ProcessingDate,
    /// `Y`: card country code.
    CardCountry,
}

impl ReturnField {
    /// The letter Paybox uses in `PBX_RETOUR`.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Amount => 'M',
            Self::Reference => 'R',
            Self::CallNumber => 'T',
            Self::AuthorizationNumber => 'A',
            Self::SubscriptionNumber => 'B',
            Self::CardType => 'C',
            Self::CardExpiry => 'D',
            Self::ResponseCode => 'E',
            Self::ThreeDsStatus => 'F',
            Self::IpCountry => 'I',
            Self::CardLastDigits => 'J',
            Self::Signature => 'K',
            Self::CardFirstDigits => 'N',
            Self::PaymentType => 'P',
            Self::TransactionTime => 'Q',
            Self::TransactionNumber => 'S',
            Self::ProcessingDate => 'W',
            Self::CardCountry => 'Y',
        }
    }
}

impl fmt::Display for ReturnField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Ordered `name -> variable` schema of the callback fields.
///
/// A name may be used only once; adding it again replaces its variable. The
/// signature variable is always rendered last, since Paybox signs the fields
/// that precede it.
///
/// # Examples
///
/// ```
/// use paybox_gateway::requests::{ReturnField, ReturnFields};
///
/// let fields = ReturnFields::empty()
///     .with("sig", ReturnField::Signature)
///     .with("amount", ReturnField::Amount)
///     .with("ref", ReturnField::Reference);
///
/// assert_eq!(fields.to_pbx_retour(), "amount:M;ref:R;sig:K");
/// ```
///
/// In TOML the schema is an ordered list of `[name, variable]` pairs:
///
/// ```toml
/// return_fields = [["montant", "amount"], ["ref", "reference"], ["appel", "call_number"]]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<(String, ReturnField)>")]
pub struct ReturnFields {
    fields: Vec<(String, ReturnField)>,
}

/// Name given to the signature variable when none is configured.
pub const DEFAULT_SIGNATURE_NAME: &str = "signature";

impl Default for ReturnFields {
    fn default() -> Self {
        Self::empty()
            .with("amount", ReturnField::Amount)
            .with("order_number", ReturnField::Reference)
            .with("call_number", ReturnField::CallNumber)
            .with("transaction_number", ReturnField::TransactionNumber)
            .with("authorization_number", ReturnField::AuthorizationNumber)
            .with("response_code", ReturnField::ResponseCode)
            .with("payment_type", ReturnField::PaymentType)
            .with("card_type", ReturnField::CardType)
            .with(DEFAULT_SIGNATURE_NAME, ReturnField::Signature)
    }
}

impl ReturnFields {
    /// A schema without any field.
    #[must_use]
    pub const fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    /// Adds `name` for `field`, replacing the variable of an existing name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, field: ReturnField) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = field,
            None => self.fields.push((name, field)),
        }
        self
    }

    /// Renames the signature variable, adding it when absent.
    #[must_use]
    pub fn with_signature_name(mut self, name: impl Into<String>) -> Self {
        self.fields.retain(|(_, f)| *f != ReturnField::Signature);
        self.with(name, ReturnField::Signature)
    }

    /// Name under which `field` is returned, if requested.
    #[must_use]
    pub fn name_of(&self, field: ReturnField) -> Option<&str> {
        self.fields.iter().find(|(_, f)| *f == field).map(|(n, _)| n.as_str())
    }

    /// Name of the signature variable; the last one configured for `K`.
    #[must_use]
    pub fn signature_name(&self) -> &str {
        self.fields
            .iter()
            .rev()
            .find(|(_, f)| *f == ReturnField::Signature)
            .map_or(DEFAULT_SIGNATURE_NAME, |(n, _)| n.as_str())
    }

    /// Iterates `(name, field)` in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ReturnField)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), *f))
    }

    /// Renders the `PBX_RETOUR` value with the signature last.
    ///
    /// A signature variable is added under [`DEFAULT_SIGNATURE_NAME`] when the
    /// schema does not request one.
    #[must_use]
    pub fn to_pbx_retour(&self) -> String {
        let signature = self.signature_name();
        let mut parts: Vec<String> = self
            .fields
            .iter()
            .filter(|(_, f)| *f != ReturnField::Signature)
            .map(|(n, f)| format!("{n}:{}", f.letter()))
            .collect();
        parts.push(format!("{signature}:{}", ReturnField::Signature.letter()));
        parts.join(";")
    }
}

impl From<Vec<(String, ReturnField)>> for ReturnFields {
    fn from(fields: Vec<(String, ReturnField)>) -> Self {
        fields.into_iter().collect()
    }
}

impl<N: Into<String>> FromIterator<(N, ReturnField)> for ReturnFields {
    fn from_iter<I: IntoIterator<Item = (N, ReturnField)>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |fields, (n, f)| fields.with(n, f))
    }
}
