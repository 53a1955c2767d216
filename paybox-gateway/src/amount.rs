//! Currency descriptors and amount formatting.
//!
//! Paybox carries amounts as integers in the currency's minor unit. Paybox Direct
//! additionally requires the integer to be left-padded with zeros to ten digits.

use std::{fmt, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::Deserialize;

use crate::error::{PayboxError, Result};

/// Width of the zero-padded `MONTANT` field.
pub const AMOUNT_WIDTH: usize = 10;

/// Largest minor-unit value that fits [`AMOUNT_WIDTH`] digits.
const MAX_MINOR_UNITS: u64 = 9_999_999_999;

/// Currencies accepted by Paybox.
///
/// Each currency knows its ISO 4217 numeric code (sent in `DEVISE` and
/// `PBX_DEVISE`) and its minor-unit exponent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Euro.
    #[default]
    Eur,
    /// US dollar.
    Usd,
    /// Swiss franc.
    Chf,
    /// Pound sterling.
    Gbp,
    /// Canadian dollar.
    Cad,
    /// Yen.
    Jpy,
    /// Mexican peso.
    Mxn,
    /// Turkish lira.
    Try,
    /// Australian dollar.
    Aud,
    /// New Zealand dollar.
    Nzd,
    /// Norwegian krone.
    Nok,
    /// Brazilian real.
    Brl,
    /// Argentine peso.
    Ars,
    /// Riel.
    Khr,
    /// New Taiwan dollar.
    Twd,
    /// Swedish krona.
    Sek,
    /// Danish krone.
    Dkk,
    /// Won.
    Krw,
    /// Singapore dollar.
    Sgd,
    /// CFP franc.
    Xpf,
    /// CFA franc BCEAO.
    Xof,
}

impl Currency {
    /// Every supported currency, in declaration order.
    pub const ALL: [Self; 21] = [
        Self::Eur,
        Self::Usd,
        Self::Chf,
        Self::Gbp,
        Self::Cad,
        Self::Jpy,
        Self::Mxn,
        Self::Try,
        Self::Aud,
        Self::Nzd,
        Self::Nok,
        Self::Brl,
        Self::Ars,
        Self::Khr,
        Self::Twd,
        Self::Sek,
        Self::Dkk,
        Self::Krw,
        Self::Sgd,
        Self::Xpf,
        Self::Xof,
    ];

    /// ISO 4217 numeric code, three digits.
    ///
    /// # Examples
    ///
    /// ```
    /// use paybox_gateway::amount::Currency;
    ///
    /// assert_eq!(Currency::Eur.numeric_code(), "978");
    /// assert_eq!(Currency::Aud.numeric_code(), "036");
    /// ```
    #[must_use]
    pub const fn numeric_code(self) -> &'static str {
        match self {
            Self::Eur => "978",
            Self::Usd => "840",
            Self::Chf => "756",
            Self::Gbp => "826",
            Self::Cad => "124",
            Self::Jpy => "392",
            Self::Mxn => "484",
            Self::Try => "949",
            Self::Aud => "036",
            Self::Nzd => "554",
            Self::Nok => "578",
            Self::Brl => "986",
            Self::Ars => "032",
            Self::Khr => "116",
            Self::Twd => "901",
            Self::Sek => "752",
            Self::Dkk => "208",
            Self::Krw => "410",
            Self::Sgd => "702",
            Self::Xpf => "953",
            Self::Xof => "952",
        }
    }

    /// ISO 4217 alphabetic code.
    #[must_use]
    pub const fn alpha_code(self) -> &'static str {
        match self {
            Self::Eur => "EUR",
            Self::Usd => "USD",
            Self::Chf => "CHF",
            Self::Gbp => "GBP",
            Self::Cad => "CAD",
            Self::Jpy => "JPY",
            Self::Mxn => "MXN",
            Self::Try => "TRY",
            Self::Aud => "AUD",
            Self::Nzd => "NZD",
            Self::Nok => "NOK",
            Self::Brl => "BRL",
            Self::Ars => "ARS",
            Self::Khr => "KHR",
            Self::Twd => "TWD",
            Self::Sek => "SEK",
            Self::Dkk => "DKK",
            Self::Krw => "KRW",
            Self::Sgd => "SGD",
            Self::Xpf => "XPF",
            Self::Xof => "XOF",
        }
    }

    /// Number of minor-unit digits (2 for cents, 0 for currencies without
    /// subdivision).
    #[must_use]
    pub const fn exponent(self) -> u32 {
        match self {
            Self::Jpy | Self::Krw | Self::Xpf | Self::Xof => 0,
            _ => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alpha_code())
    }
}

impl FromStr for Currency {
    type Err = PayboxError;

    fn from_str(s: &str) -> Result<Self> {
        let code = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.alpha_code().eq_ignore_ascii_case(code) || c.numeric_code() == code)
            .ok_or_else(|| PayboxError::InvalidInput(format!("unsupported currency: {s}")))
    }
}

/// Converts decimal amounts to Paybox minor-unit strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmountFormatter;

impl AmountFormatter {
    /// Formats `amount` as a ten-digit zero-padded minor-unit integer.
    ///
    /// The amount is rounded half away from zero to the currency's minor unit.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::InvalidAmount`] when the amount is negative or does
    /// not fit ten digits.
    ///
    /// # Examples
    ///
    /// ```
    /// use paybox_gateway::amount::{AmountFormatter, Currency};
    /// use rust_decimal::Decimal;
    ///
    /// let formatted = AmountFormatter::format(Decimal::new(1234, 2), Currency::Eur)?;
    /// assert_eq!(formatted, "0000001234");
    /// # Ok::<(), paybox_gateway::PayboxError>(())
    /// ```
    pub fn format(amount: Decimal, currency: Currency) -> Result<String> {
        let units = Self::to_minor_units(amount, currency)?;
        Ok(format!("{units:0>AMOUNT_WIDTH$}"))
    }

    /// Formats `amount` as an unpadded minor-unit integer.
    ///
    /// Paybox System (`PBX_TOTAL`) takes the amount without padding.
    ///
    /// # Errors
    ///
    /// Same conditions as [`AmountFormatter::format`].
    pub fn minor_units(amount: Decimal, currency: Currency) -> Result<String> {
        Self::to_minor_units(amount, currency).map(|units| units.to_string())
    }

    fn to_minor_units(amount: Decimal, currency: Currency) -> Result<u64> {
        if amount < Decimal::ZERO {
            return Err(PayboxError::InvalidAmount(format!("{amount} is negative")));
        }

        let scale = Decimal::from(10_u64.pow(currency.exponent()));
        let units = amount
            .checked_mul(scale)
            .map(|v| v.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
            .and_then(|v| v.to_u64())
            .ok_or_else(|| {
                PayboxError::InvalidAmount(format!("{amount} {currency} cannot be represented"))
            })?;

        if units > MAX_MINOR_UNITS {
            return Err(PayboxError::InvalidAmount(format!(
                "{amount} {currency} exceeds {AMOUNT_WIDTH} digits"
            )));
        }

        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_format_cents() {
        assert_eq!(
            AmountFormatter::format(Decimal::new(1234, 2), Currency::Eur).unwrap(),
            "0000001234"
        );
    }

    #[test]
    fn test_format_zero() {
        assert_eq!(AmountFormatter::format(Decimal::ZERO, Currency::Eur).unwrap(), "0000000000");
    }

    #[test]
    fn test_format_rounds_half_away_from_zero() {
        assert_eq!(
            AmountFormatter::format(Decimal::new(10_005, 3), Currency::Eur).unwrap(),
            "0000001001"
        );
        assert_eq!(
            AmountFormatter::format(Decimal::new(10_004, 3), Currency::Eur).unwrap(),
            "0000001000"
        );
    }

    #[test]
    fn test_format_zero_exponent_currency() {
        assert_eq!(
            AmountFormatter::format(Decimal::new(1500, 0), Currency::Jpy).unwrap(),
            "0000001500"
        );
    }

    #[test]
    fn test_format_negative_rejected() {
        let result = AmountFormatter::format(Decimal::new(-1, 2), Currency::Eur);
        assert!(matches!(result, Err(PayboxError::InvalidAmount(_))));
    }

    #[test]
    fn test_format_too_wide_rejected() {
        // 100 000 000.00 EUR = 10 000 000 000 cents, eleven digits
        let result = AmountFormatter::format(Decimal::new(100_000_000, 0), Currency::Eur);
        assert!(matches!(result, Err(PayboxError::InvalidAmount(_))));

        let largest = AmountFormatter::format(Decimal::new(9_999_999_999, 2), Currency::Eur);
        assert_eq!(largest.unwrap(), "9999999999");
    }

    #[test]
    fn test_minor_units_unpadded() {
        assert_eq!(
            AmountFormatter::minor_units(Decimal::new(1234, 2), Currency::Eur).unwrap(),
            "1234"
        );
        assert_eq!(AmountFormatter::minor_units(Decimal::ZERO, Currency::Eur).unwrap(), "0");
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!("eur".parse::<Currency>().unwrap(), Currency::Eur);
        assert_eq!("USD".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!("036".parse::<Currency>().unwrap(), Currency::Aud);
        assert!("XYZ".parse::<Currency>().is_err());
    }

    #[test]
    fn test_currency_numeric_codes_are_three_digits() {
        for currency in Currency::ALL {
            let code = currency.numeric_code();
            assert_eq!(code.len(), 3, "{currency}");
            assert!(code.chars().all(|c| c.is_ascii_digit()), "{currency}");
        }
    }

    #[test]
    fn test_currency_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            currency: Currency,
        }

        let wrapper: Wrapper = toml::from_str("currency = \"GBP\"").unwrap();
        assert_eq!(wrapper.currency, Currency::Gbp);
    }

    proptest! {
        #[test]
        fn test_format_is_fixed_width(cents in 0_i64..=9_999_999_999) {
            let formatted = AmountFormatter::format(Decimal::new(cents, 2), Currency::Eur).unwrap();
            prop_assert_eq!(formatted.len(), AMOUNT_WIDTH);
            prop_assert_eq!(formatted.parse::<i64>().unwrap(), cents);
        }
    }
}
