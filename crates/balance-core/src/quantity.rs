//! Resource quantity parsing.
//!
//! Quantities use the manifest notation: an unsigned decimal number with an
//! optional suffix. Decimal SI (`m`, `k`, `G`, ...), binary (`Ki`, `Mi`,
//! `Gi`, ...) and exponent (`e3`, `E-2`) suffixes are accepted. Values are
//! kept as an exact fraction and rounded up when converted to base units.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<int>[0-9]*)(?:\.(?P<frac>[0-9]*))?(?P<suffix>[eE][+-]?[0-9]+|Ki|Mi|Gi|Ti|Pi|Ei|n|u|m|k|M|G|T|P|E)?$",
    )
    .expect("quantity pattern is valid")
});

/// Longest fraction accepted; keeps the exact fraction inside `u128`.
const MAX_FRACTION_DIGITS: usize = 18;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantityError {
    #[error("malformed quantity: {0:?}")]
    Malformed(String),
    #[error("negative quantity: {0:?}")]
    Negative(String),
    #[error("quantity out of range: {0:?}")]
    Overflow(String),
}

/// An exact, non-negative resource quantity (`numerator / denominator`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantity {
    numerator: u128,
    denominator: u128,
}

impl Quantity {
    pub fn parse(input: &str) -> Result<Self, QuantityError> {
        let s = input.trim();
        if s.starts_with('-') {
            return Err(QuantityError::Negative(input.to_string()));
        }
        let s = s.strip_prefix('+').unwrap_or(s);

        let caps = QUANTITY_RE
            .captures(s)
            .ok_or_else(|| QuantityError::Malformed(input.to_string()))?;
        let int = caps.name("int").map_or("", |m| m.as_str());
        let frac = caps.name("frac").map_or("", |m| m.as_str());
        if int.is_empty() && frac.is_empty() {
            return Err(QuantityError::Malformed(input.to_string()));
        }
        if frac.len() > MAX_FRACTION_DIGITS {
            return Err(QuantityError::Overflow(input.to_string()));
        }

        let overflow = || QuantityError::Overflow(input.to_string());
        let digits = format!("{int}{frac}");
        let mut numerator: u128 = digits.parse().map_err(|_| overflow())?;
        let mut denominator: u128 = 10u128.pow(frac.len() as u32);

        match caps.name("suffix").map(|m| m.as_str()) {
            None => {}
            Some(suffix) => match binary_exponent(suffix) {
                Some(power) => {
                    numerator = numerator
                        .checked_mul(1u128 << (10 * power))
                        .ok_or_else(overflow)?;
                }
                None => {
                    let exp = decimal_exponent(suffix)
                        .ok_or_else(|| QuantityError::Malformed(input.to_string()))?;
                    let factor = 10u128
                        .checked_pow(exp.unsigned_abs())
                        .ok_or_else(overflow)?;
                    if exp >= 0 {
                        numerator = numerator.checked_mul(factor).ok_or_else(overflow)?;
                    } else {
                        denominator = denominator.checked_mul(factor).ok_or_else(overflow)?;
                    }
                }
            },
        }

        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Value in whole units, rounded up.
    pub fn value(&self) -> Result<u64, QuantityError> {
        self.scaled(1)
    }

    /// Value in thousandths of a unit, rounded up.
    pub fn milli_value(&self) -> Result<u64, QuantityError> {
        self.scaled(1000)
    }

    fn scaled(&self, factor: u128) -> Result<u64, QuantityError> {
        let overflow = || QuantityError::Overflow(self.to_string());
        let scaled = self.numerator.checked_mul(factor).ok_or_else(overflow)?;
        let value = scaled.div_ceil(self.denominator);
        u64::try_from(value).map_err(|_| overflow())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

fn binary_exponent(suffix: &str) -> Option<u32> {
    match suffix {
        "Ki" => Some(1),
        "Mi" => Some(2),
        "Gi" => Some(3),
        "Ti" => Some(4),
        "Pi" => Some(5),
        "Ei" => Some(6),
        _ => None,
    }
}

fn decimal_exponent(suffix: &str) -> Option<i32> {
    match suffix {
        "n" => Some(-9),
        "u" => Some(-6),
        "m" => Some(-3),
        "k" => Some(3),
        "M" => Some(6),
        "G" => Some(9),
        "T" => Some(12),
        "P" => Some(15),
        "E" => Some(18),
        exp => exp[1..].parse().ok(),
    }
}

/// Convert a manifest quantity to base units for `resource`.
///
/// Resources named in `milli_resources` are expressed in milli-units,
/// everything else in whole units.
pub fn to_base_units(
    resource: &str,
    raw: &str,
    milli_resources: &[String],
) -> Result<u64, QuantityError> {
    let quantity = Quantity::parse(raw)?;
    if milli_resources.iter().any(|r| r == resource) {
        quantity.milli_value()
    } else {
        quantity.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn milli() -> Vec<String> {
        vec!["cpu".to_string()]
    }

    #[test]
    fn plain_integers() {
        assert_eq!(Quantity::parse("4").unwrap().value().unwrap(), 4);
        assert_eq!(Quantity::parse("0").unwrap().value().unwrap(), 0);
        assert_eq!(Quantity::parse("+2").unwrap().value().unwrap(), 2);
    }

    #[test]
    fn cpu_converts_to_millicores() {
        assert_eq!(to_base_units("cpu", "4", &milli()).unwrap(), 4000);
        assert_eq!(to_base_units("cpu", "500m", &milli()).unwrap(), 500);
        assert_eq!(to_base_units("cpu", "0.25", &milli()).unwrap(), 250);
        assert_eq!(to_base_units("cpu", "1.5", &milli()).unwrap(), 1500);
    }

    #[test]
    fn memory_suffixes() {
        assert_eq!(to_base_units("memory", "1Gi", &milli()).unwrap(), 1 << 30);
        assert_eq!(to_base_units("memory", "512Mi", &milli()).unwrap(), 512 << 20);
        assert_eq!(to_base_units("memory", "8G", &milli()).unwrap(), 8_000_000_000);
        assert_eq!(to_base_units("memory", "1k", &milli()).unwrap(), 1000);
        assert_eq!(to_base_units("memory", "2Ki", &milli()).unwrap(), 2048);
    }

    #[test]
    fn exponent_suffixes() {
        assert_eq!(Quantity::parse("1e3").unwrap().value().unwrap(), 1000);
        assert_eq!(Quantity::parse("5E-1").unwrap().milli_value().unwrap(), 500);
        // A bare `E` is exa, not an exponent.
        assert_eq!(
            Quantity::parse("1E").unwrap().value().unwrap(),
            1_000_000_000_000_000_000
        );
    }

    #[test]
    fn fractions_round_up() {
        assert_eq!(Quantity::parse("100m").unwrap().value().unwrap(), 1);
        assert_eq!(Quantity::parse("1.2").unwrap().value().unwrap(), 2);
        assert_eq!(Quantity::parse("1n").unwrap().milli_value().unwrap(), 1);
        assert_eq!(Quantity::parse(".5").unwrap().milli_value().unwrap(), 500);
    }

    #[test]
    fn rejects_negative() {
        assert!(matches!(
            Quantity::parse("-1"),
            Err(QuantityError::Negative(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        for raw in ["", "abc", "1.2.3", "1Qi", "Gi", "1 Gi", "."] {
            assert!(
                matches!(Quantity::parse(raw), Err(QuantityError::Malformed(_))),
                "expected {raw:?} to be malformed"
            );
        }
    }

    #[test]
    fn rejects_overflow() {
        assert!(matches!(
            Quantity::parse("100E").unwrap().value(),
            Err(QuantityError::Overflow(_))
        ));
        assert!(matches!(
            Quantity::parse("1e400"),
            Err(QuantityError::Overflow(_))
        ));
    }

    #[test]
    fn extended_resources_are_counts() {
        assert_eq!(to_base_units("nvidia.com/gpu", "2", &milli()).unwrap(), 2);
    }
}
