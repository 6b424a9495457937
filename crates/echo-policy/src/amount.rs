// amount.rs — Settlement-token amounts in smallest units.
//
// All spend arithmetic happens on integers. The settlement token (USDC) has
// 6 decimals, so "12.5" is held as 12_500_000 units. Converting a human amount
// scales by 10^6 and rounds to the nearest unit, which is exactly what the
// signing payload requires for `maxAmount`.
//
// On the wire an amount is a decimal string ("20.78"). Deserialization also
// accepts a JSON number so agents can submit `{"amount": 12.5}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;

/// An amount of the settlement token, in smallest units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "AmountRepr", into = "String")]
pub struct TokenAmount(u64);

impl TokenAmount {
    /// Decimal places of the settlement token.
    pub const DECIMALS: u32 = 6;

    /// 10^DECIMALS.
    pub const SCALE: u64 = 1_000_000;

    pub const ZERO: TokenAmount = TokenAmount(0);

    /// Wrap a raw smallest-unit value.
    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    /// Whole tokens (e.g. `whole(50)` is 50 USDC).
    pub const fn whole(tokens: u64) -> Self {
        Self(tokens.saturating_mul(Self::SCALE))
    }

    /// The raw smallest-unit value.
    pub fn units(&self) -> u64 {
        self.0
    }

    /// Convert a human amount, rounding to the nearest unit (half away from zero).
    pub fn from_human(value: f64) -> Result<Self, PolicyError> {
        if !value.is_finite() {
            return Err(PolicyError::InvalidAmount {
                input: value.to_string(),
                reason: "not a finite number".to_string(),
            });
        }
        if value < 0.0 {
            return Err(PolicyError::InvalidAmount {
                input: value.to_string(),
                reason: "negative".to_string(),
            });
        }
        let scaled = (value * Self::SCALE as f64).round();
        if scaled > u64::MAX as f64 {
            return Err(PolicyError::InvalidAmount {
                input: value.to_string(),
                reason: "too large".to_string(),
            });
        }
        Ok(Self(scaled as u64))
    }

    pub fn checked_add(self, other: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_add(other.0).map(TokenAmount)
    }

    pub fn saturating_add(self, other: TokenAmount) -> TokenAmount {
        TokenAmount(self.0.saturating_add(other.0))
    }
}

impl FromStr for TokenAmount {
    type Err = PolicyError;

    /// Parse an exact decimal string. More than six fractional digits are
    /// rounded to the nearest unit, matching `from_human`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| PolicyError::InvalidAmount {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty"));
        }
        if trimmed.starts_with('-') {
            return Err(invalid("negative"));
        }
        let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);

        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("no digits"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("not a decimal number"));
        }

        let whole_units: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("too large"))?
        };

        let digits = Self::DECIMALS as usize;
        let mut frac_units: u64 = 0;
        for (i, c) in frac.chars().take(digits).enumerate() {
            let d = c as u64 - '0' as u64;
            frac_units += d * 10u64.pow((digits - 1 - i) as u32);
        }
        // Round on the first dropped digit.
        if let Some(next) = frac.chars().nth(digits) {
            if next >= '5' {
                frac_units += 1;
            }
        }

        whole_units
            .checked_mul(Self::SCALE)
            .and_then(|w| w.checked_add(frac_units))
            .map(TokenAmount)
            .ok_or_else(|| invalid("too large"))
    }
}

impl fmt::Display for TokenAmount {
    /// Human form with trailing zeros trimmed: 20_780_000 → "20.78".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / Self::SCALE;
        let frac = self.0 % Self::SCALE;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let frac = format!("{:06}", frac);
        write!(f, "{}.{}", whole, frac.trim_end_matches('0'))
    }
}

impl From<TokenAmount> for String {
    fn from(amount: TokenAmount) -> Self {
        amount.to_string()
    }
}

/// Accepted input shapes for an amount.
#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<AmountRepr> for TokenAmount {
    type Error = PolicyError;

    fn try_from(repr: AmountRepr) -> Result<Self, Self::Error> {
        match repr {
            AmountRepr::Number(n) => TokenAmount::from_human(n),
            AmountRepr::Text(s) => s.parse(),
        }
    }
}
