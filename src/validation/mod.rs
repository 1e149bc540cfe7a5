use bigdecimal::BigDecimal;
use std::fmt;
use thiserror::Error;

/// Fractional digits kept on every amount.
pub const AMOUNT_SCALE: i64 = 2;
/// Largest accepted amount, in cents (99,999,999.99).
pub const MAX_AMOUNT_CENTS: i64 = 9_999_999_999;
/// Every accepted amount is below 10^8.
const MAX_AMOUNT_MAGNITUDE: i64 = 8;
pub const NAMESPACE_MAX_LEN: usize = 128;
pub const REASON_MAX_LEN: usize = 256;
pub const REGION_MAX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("recharge amount is negative")]
    Negative,
    #[error("recharge amount is too big")]
    TooLarge,
}

pub fn max_amount() -> BigDecimal {
    BigDecimal::from(MAX_AMOUNT_CENTS) / BigDecimal::from(100)
}

/// Normalises an amount to two decimals and bounds-checks it.
///
/// Extra precision is dropped, not rejected: `10.999` validates as `10.99`.
/// The returned value is the one every later step must use.
pub fn validate_amount(amount: &BigDecimal) -> Result<BigDecimal, AmountError> {
    // Rescaling or comparing multiplies by 10^|exponent|, so "1e999999999999"
    // must be bounded from its digits before any decimal arithmetic runs.
    let (digits, scale) = amount.as_bigint_and_exponent();
    let digits = digits.to_string();
    if digits.starts_with('-') {
        return Err(AmountError::Negative);
    }
    if digits == "0" {
        return Ok(BigDecimal::from(0).with_scale(AMOUNT_SCALE));
    }

    // amount lies in [10^(magnitude-1), 10^magnitude)
    let magnitude = digits.len() as i64 - scale;
    if magnitude > MAX_AMOUNT_MAGNITUDE {
        return Err(AmountError::TooLarge);
    }
    if magnitude <= -AMOUNT_SCALE {
        return Ok(BigDecimal::from(0).with_scale(AMOUNT_SCALE));
    }

    let truncated = amount.with_scale(AMOUNT_SCALE);
    if truncated > max_amount() {
        return Err(AmountError::TooLarge);
    }

    Ok(truncated)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_namespace(namespace: &str) -> Result<String, ValidationError> {
    let namespace = sanitize_string(namespace);
    validate_required("namespace", &namespace)?;
    validate_max_len("namespace", &namespace, NAMESPACE_MAX_LEN)?;

    if namespace.contains(' ') {
        return Err(ValidationError::new("namespace", "must not contain spaces"));
    }

    Ok(namespace)
}

/// Cleans an optional descriptive field; blank values become `None`.
pub fn normalize_optional(
    field: &'static str,
    value: Option<&str>,
    max_len: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(sanitize_string) {
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => {
            validate_max_len(field, &v, max_len)?;
            Ok(Some(v))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).expect("valid decimal")
    }

    #[test]
    fn accepts_amounts_with_up_to_two_decimals() {
        for raw in ["0", "7", "7.5", "7.25", "0.01", "99999999.99"] {
            assert_eq!(validate_amount(&dec(raw)), Ok(dec(raw)), "amount {}", raw);
        }
    }

    #[test]
    fn truncates_extra_precision_instead_of_rejecting() {
        assert_eq!(validate_amount(&dec("10.999")), validate_amount(&dec("10.99")));
        assert_eq!(validate_amount(&dec("0.019")), Ok(dec("0.01")));
        assert_eq!(validate_amount(&dec("99999999.999")), Ok(dec("99999999.99")));
    }

    #[test]
    fn truncated_amount_has_two_decimal_scale() {
        let validated = validate_amount(&dec("3.14159")).unwrap();
        assert_eq!(validated.to_string(), "3.14");
    }

    #[test]
    fn rejects_negative_amounts() {
        for raw in ["-1", "-0.01", "-0.001", "-99999999999"] {
            assert_eq!(validate_amount(&dec(raw)), Err(AmountError::Negative), "amount {}", raw);
        }
    }

    #[test]
    fn rejects_amounts_above_ceiling() {
        for raw in ["100000000", "100000000.00", "123456789012"] {
            assert_eq!(validate_amount(&dec(raw)), Err(AmountError::TooLarge), "amount {}", raw);
        }
    }

    #[test]
    fn exponent_amounts_are_bounded_before_rescaling() {
        assert_eq!(validate_amount(&dec("1e12")), Err(AmountError::TooLarge));
        assert_eq!(validate_amount(&dec("1e8")), Err(AmountError::TooLarge));
        assert_eq!(validate_amount(&dec("1e999999999999")), Err(AmountError::TooLarge));
        assert_eq!(validate_amount(&dec("-1e999999999999")), Err(AmountError::Negative));
        assert_eq!(validate_amount(&dec("1e-999999999999")), Ok(dec("0.00")));
        assert_eq!(validate_amount(&dec("0.009")), Ok(dec("0.00")));
        assert_eq!(validate_amount(&dec("9.99e7")), Ok(dec("99900000")));
        assert_eq!(validate_amount(&dec("1234e-2")), Ok(dec("12.34")));
    }

    #[test]
    fn zero_validates_with_two_decimal_scale() {
        assert_eq!(validate_amount(&dec("0")).unwrap().to_string(), "0.00");
        assert_eq!(validate_amount(&dec("0e-50")).unwrap().to_string(), "0.00");
    }

    #[test]
    fn validates_required_field() {
        assert!(validate_required("field", "value").is_ok());
        assert!(validate_required("field", "   ").is_err());
    }

    #[test]
    fn validates_max_len() {
        assert!(validate_max_len("field", "abc", 3).is_ok());
        assert!(validate_max_len("field", "abcd", 3).is_err());
    }

    #[test]
    fn sanitizes_string() {
        assert_eq!(sanitize_string("  hello\tworld  "), "hello world");
        assert_eq!(sanitize_string(" \n "), "");
        assert_eq!(sanitize_string("ab\u{0000}cd\u{0007}"), "abcd");
    }

    #[test]
    fn validates_namespace() {
        assert_eq!(validate_namespace("  team-a ").unwrap(), "team-a");
        assert!(validate_namespace("").is_err());
        assert!(validate_namespace("two words").is_err());
        assert!(validate_namespace(&"n".repeat(129)).is_err());
    }

    #[test]
    fn normalizes_optional_fields() {
        assert_eq!(normalize_optional("reason", None, 10).unwrap(), None);
        assert_eq!(normalize_optional("reason", Some("  "), 10).unwrap(), None);
        assert_eq!(
            normalize_optional("reason", Some(" top up "), 10).unwrap(),
            Some("top up".to_string())
        );
        assert!(normalize_optional("reason", Some("way too long"), 5).is_err());
    }
}
