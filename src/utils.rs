//! Utility functions for UPAY operations.
//!
//! Helpers for amount formatting, URL normalization and value conversions
//! used throughout the library.

use crate::errors::{Result, UpayError};
use serde_json::Value;
use url::Url;

/// Renders an amount the way it is signed.
///
/// Uses the shortest representation that round-trips, which agrees with the
/// upstream server's `%g` formatting for ordinary amounts.
///
/// # Examples
///
/// ```
/// use upay_rs::utils::format_amount;
///
/// assert_eq!(format_amount(100.0), "100");
/// assert_eq!(format_amount(10.5), "10.5");
/// assert_eq!(format_amount(0.01), "0.01");
/// ```
pub fn format_amount(amount: f64) -> String {
    format!("{}", amount)
}

/// Rounds an amount to two decimal places.
///
/// # Examples
///
/// ```
/// use upay_rs::utils::round_to_cents;
///
/// assert_eq!(round_to_cents(10.456), 10.46);
/// assert_eq!(round_to_cents(3.0), 3.0);
/// ```
pub fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Converts an integer amount in cents to a decimal amount.
///
/// # Examples
///
/// ```
/// use upay_rs::utils::cents_to_amount;
///
/// assert_eq!(cents_to_amount(1050), 10.5);
/// ```
pub fn cents_to_amount(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Smallest amount the upstream API accepts for an order.
pub const MIN_AMOUNT: f64 = 0.01;

/// Checks that an amount can be sent to the upstream API.
///
/// # Examples
///
/// ```
/// use upay_rs::utils::validate_amount;
///
/// assert!(validate_amount(0.01).is_ok());
/// assert!(validate_amount(0.005).is_err());
/// ```
pub fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < MIN_AMOUNT {
        return Err(UpayError::InvalidAmount(format!(
            "Amount must be at least {}, got {}",
            MIN_AMOUNT, amount
        )));
    }
    Ok(())
}

/// Validates an API base URL and strips any trailing slashes.
///
/// # Examples
///
/// ```
/// use upay_rs::utils::normalize_api_url;
///
/// let url = normalize_api_url("https://pay.example.com/").unwrap();
/// assert_eq!(url, "https://pay.example.com");
///
/// assert!(normalize_api_url("not a url").is_err());
/// ```
pub fn normalize_api_url(api_url: &str) -> Result<String> {
    let trimmed = api_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(UpayError::Config("API URL is not configured".to_string()));
    }

    let parsed = Url::parse(trimmed)?;
    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(UpayError::Config(format!(
            "API URL must use http or https, got '{}'",
            other
        ))),
    }
}

/// Converts a scalar JSON value to the text that is signed.
///
/// Strings are taken verbatim and numbers use their parsed textual form.
/// Booleans, null, arrays and objects have no signable form.
///
/// # Examples
///
/// ```
/// use upay_rs::utils::json_value_to_text;
/// use serde_json::json;
///
/// assert_eq!(json_value_to_text(&json!("abc")), Some("abc".to_string()));
/// assert_eq!(json_value_to_text(&json!(2)), Some("2".to_string()));
/// assert_eq!(json_value_to_text(&json!(10.5)), Some("10.5".to_string()));
/// assert_eq!(json_value_to_text(&json!(null)), None);
/// ```
pub fn json_value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Gets the current Unix timestamp in seconds.
///
/// # Examples
///
/// ```
/// use upay_rs::utils::current_timestamp;
///
/// let now = current_timestamp();
/// assert!(now > 1600000000); // After Sept 2020
/// ```
pub fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
