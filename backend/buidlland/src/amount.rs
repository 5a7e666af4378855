//! Integer token amounts and their fixed-point display.
//!
//! All arithmetic happens on base units (`u128`). Scaling for display goes
//! through a single [`Decimals`] value resolved from the ledger for the
//! configured coin, so every page uses the same divisor.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Largest power of ten representable in a `u128`.
const MAX_DECIMALS: u8 = 38;
/// Fraction digits shown on screen.
const DISPLAY_FRACTION_DIGITS: u32 = 2;

/// A quantity of the configured coin, in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Self = Self(0);

    pub const fn from_base_units(units: u128) -> Self {
        Self(units)
    }

    pub const fn base_units(self) -> u128 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    /// Funding progress as a whole percentage: `floor(self * 100 / goal)`,
    /// clamped to `[0, 100]`. A zero goal yields 0.
    pub fn percent_of(self, goal: Amount) -> u8 {
        if goal.0 == 0 {
            return 0;
        }
        if self.0 >= goal.0 {
            return 100;
        }
        if let Some(scaled) = self.0.checked_mul(100) {
            return (scaled / goal.0) as u8;
        }
        // 100 * raised overflows: add `raised` a hundred times modulo `goal`
        // and count the wrap-arounds.
        let gap = goal.0 - self.0;
        let (mut acc, mut pct) = (0u128, 0u8);
        for _ in 0..100 {
            if acc >= gap {
                acc -= gap;
                pct += 1;
            } else {
                acc += self.0;
            }
        }
        pct
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Base units travel as decimal strings, the way the ledger encodes `u64`
/// and `u128` in JSON.
impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Text(String),
            Number(u64),
        }
        match Wire::deserialize(deserializer)? {
            Wire::Text(s) => s
                .parse::<u128>()
                .map(Amount)
                .map_err(serde::de::Error::custom),
            Wire::Number(n) => Ok(Amount(n as u128)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("decimal count {0} exceeds the supported maximum of 38")]
    TooManyDecimals(u8),
    #[error("{0:?} is not a decimal number")]
    Malformed(String),
    #[error("{input:?} has more than {decimals} fraction digits")]
    TooPrecise { input: String, decimals: u8 },
    #[error("{0:?} does not fit in a token amount")]
    Overflow(String),
    #[error("amount must be greater than zero")]
    Zero,
}

/// Decimal count of the configured coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimals(u8);

impl Decimals {
    pub fn new(decimals: u8) -> Result<Self, AmountError> {
        if decimals > MAX_DECIMALS {
            return Err(AmountError::TooManyDecimals(decimals));
        }
        Ok(Self(decimals))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    fn scale(self) -> u128 {
        10u128.pow(self.0 as u32)
    }

    /// Render `amount` in whole tokens with thousands separators and at most
    /// two fraction digits (truncated, trailing zeros dropped).
    pub fn format(self, amount: Amount) -> String {
        let scale = self.scale();
        let whole = amount.0 / scale;
        let rest = amount.0 % scale;

        let mut out = group_thousands(whole);
        let shown = DISPLAY_FRACTION_DIGITS.min(self.0 as u32);
        if shown > 0 {
            let fraction = rest / 10u128.pow(self.0 as u32 - shown);
            let digits = format!("{fraction:0>width$}", width = shown as usize);
            let digits = digits.trim_end_matches('0');
            if !digits.is_empty() {
                out.push('.');
                out.push_str(digits);
            }
        }
        out
    }

    /// Parse a user-entered token quantity ("1.5") into base units.
    pub fn parse(self, input: &str) -> Result<Amount, AmountError> {
        let trimmed = input.trim();
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
            return Err(AmountError::Malformed(input.to_string()));
        }
        if fraction.len() > self.0 as usize {
            return Err(AmountError::TooPrecise {
                input: input.to_string(),
                decimals: self.0,
            });
        }

        let overflow = || AmountError::Overflow(input.to_string());
        let whole_units = if whole.is_empty() {
            0
        } else {
            whole.parse::<u128>().map_err(|_| overflow())?
        };
        let fraction_units = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{fraction:0<width$}", width = self.0 as usize);
            padded.parse::<u128>().map_err(|_| overflow())?
        };

        let units = whole_units
            .checked_mul(self.scale())
            .and_then(|v| v.checked_add(fraction_units))
            .ok_or_else(overflow)?;
        if units == 0 {
            return Err(AmountError::Zero);
        }
        Ok(Amount(units))
    }
}

fn group_thousands(value: u128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(n: u128) -> Amount {
        Amount::from_base_units(n)
    }

    #[test]
    fn progress_is_floored() {
        assert_eq!(units(3200).percent_of(units(5000)), 64);
        assert_eq!(units(1).percent_of(units(3)), 33);
        assert_eq!(units(2).percent_of(units(3)), 66);
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(units(7000).percent_of(units(5000)), 100);
        assert_eq!(units(5000).percent_of(units(5000)), 100);
        assert_eq!(units(0).percent_of(units(5000)), 0);
        assert_eq!(units(10).percent_of(Amount::ZERO), 0);
    }

    #[test]
    fn progress_survives_huge_values() {
        let goal = units(u128::MAX - 1);
        assert_eq!(units((u128::MAX - 1) / 2).percent_of(goal), 50);
        assert_eq!(units((u128::MAX - 1) / 3).percent_of(goal), 33);
        assert_eq!(units(u128::MAX).percent_of(goal), 100);
    }

    #[test]
    fn format_groups_and_truncates() {
        let d = Decimals::new(8).unwrap();
        assert_eq!(d.format(units(300_000 * 100_000_000)), "300,000");
        assert_eq!(d.format(units(250_000_000)), "2.5");
        assert_eq!(d.format(units(123_456_789)), "1.23");
        assert_eq!(d.format(units(999)), "0");
        assert_eq!(d.format(Amount::ZERO), "0");
    }

    #[test]
    fn format_without_decimals() {
        let d = Decimals::new(0).unwrap();
        assert_eq!(d.format(units(1_234_567)), "1,234,567");
    }

    #[test]
    fn parse_scales_by_decimals() {
        let d = Decimals::new(8).unwrap();
        assert_eq!(d.parse("1").unwrap(), units(100_000_000));
        assert_eq!(d.parse("1.5").unwrap(), units(150_000_000));
        assert_eq!(d.parse(".25").unwrap(), units(25_000_000));
        assert_eq!(d.parse(" 2. ").unwrap(), units(200_000_000));
    }

    #[test]
    fn parse_rejects_bad_input() {
        let d = Decimals::new(2).unwrap();
        assert!(matches!(d.parse("abc"), Err(AmountError::Malformed(_))));
        assert!(matches!(d.parse("-1"), Err(AmountError::Malformed(_))));
        assert!(matches!(d.parse("."), Err(AmountError::Malformed(_))));
        assert!(matches!(d.parse("1.234"), Err(AmountError::TooPrecise { .. })));
        assert!(matches!(d.parse("0.00"), Err(AmountError::Zero)));
        assert!(matches!(
            d.parse("999999999999999999999999999999999999999"),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn decimals_bounded() {
        assert!(Decimals::new(38).is_ok());
        assert_eq!(Decimals::new(39), Err(AmountError::TooManyDecimals(39)));
    }

    #[test]
    fn wire_format_is_string_but_accepts_numbers() {
        let a = units(340_282_366_920_938_463_463_374_607_431_768_211_455);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"340282366920938463463374607431768211455\"");
        assert_eq!(serde_json::from_str::<Amount>(&json).unwrap(), a);
        assert_eq!(serde_json::from_str::<Amount>("42").unwrap(), units(42));
    }
}
