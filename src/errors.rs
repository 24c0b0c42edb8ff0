//! Error types for the upay-rs library.
//!
//! This module defines all error types that can occur while signing, submitting
//! orders to the upstream payment API, and verifying payment callbacks.
//!
//! No variant ever carries the secret key or the canonical string that was signed.

use thiserror::Error;

/// Main error type for UPAY operations.
#[derive(Error, Debug)]
pub enum UpayError {
    /// Network failure, timeout or cancellation while talking to the upstream API
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream answered with a non-2xx HTTP status
    #[error("HTTP error {status}: {}", message.as_deref().unwrap_or("no message"))]
    HttpStatus {
        /// HTTP status code returned by the upstream API
        status: u16,
        /// `message` field parsed from the error body, if any
        message: Option<String>,
    },

    /// Upstream answered 2xx but reported a non-200 `status_code` in the body
    #[error("Upstream rejected order (status_code {status_code}): {message}")]
    UpstreamRejected {
        /// `status_code` field from the response body
        status_code: i64,
        /// `message` field from the response body
        message: String,
    },

    /// Unexpected or missing fields in an otherwise successful response
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Inbound callback is missing required fields or cannot be parsed
    #[error("Malformed callback payload: {0}")]
    MalformedPayload(String),

    /// Callback signature does not match the recomputed one
    #[error("Signature mismatch for order {order_id}")]
    SignatureMismatch {
        /// `order_id` claimed by the rejected callback
        order_id: String,
    },

    /// Callback is authentic but does not report a paid order
    #[error("Order {order_id} not paid (status {status})")]
    NotPaid {
        /// `order_id` of the callback
        order_id: String,
        /// Raw status code reported by the upstream
        status: i64,
    },

    /// Error parsing URL
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Payment type not offered by the upstream API
    #[error("Unsupported payment type: {0}")]
    UnsupportedPaymentType(String),

    /// Invoice referenced by a callback does not exist in the host
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Failure reported by the host's invoice store
    #[error("Invoice store error: {0}")]
    Store(String),
}

impl UpayError {
    /// Returns true if the callback itself was refused: bad payload, bad
    /// signature, unpaid status or unknown invoice.
    ///
    /// Any other error is a local failure. Both are answered with `fail` so
    /// the upstream re-delivers, but only local failures are logged as errors.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            UpayError::MalformedPayload(_)
                | UpayError::SignatureMismatch { .. }
                | UpayError::NotPaid { .. }
                | UpayError::InvoiceNotFound(_)
        )
    }

    /// Message that is safe to show to an end user.
    ///
    /// Transport-level failures collapse into a generic text; upstream
    /// messages are passed through for diagnostics.
    pub fn user_message(&self) -> String {
        match self {
            UpayError::Transport(_) => "Payment service is temporarily unavailable".to_string(),
            UpayError::HttpStatus { status, message } => match message {
                Some(msg) => format!("Payment request failed (HTTP {}): {}", status, msg),
                None => format!("Payment request failed (HTTP {})", status),
            },
            UpayError::UpstreamRejected { message, .. } => {
                format!("Failed to create payment order: {}", message)
            }
            other => format!("Failed to create payment order: {}", other),
        }
    }
}

/// Result type alias for UPAY operations.
pub type Result<T> = std::result::Result<T, UpayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = UpayError::MalformedPayload("missing field: token".to_string());
        assert_eq!(err.to_string(), "Malformed callback payload: missing field: token");

        let err = UpayError::HttpStatus {
            status: 400,
            message: Some("订单号已存在,请勿重复提交".to_string()),
        };
        assert_eq!(err.to_string(), "HTTP error 400: 订单号已存在,请勿重复提交");

        let err = UpayError::HttpStatus { status: 502, message: None };
        assert_eq!(err.to_string(), "HTTP error 502: no message");
    }

    #[test]
    fn test_error_conversion() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let upay_err: UpayError = url_err.into();
        assert!(matches!(upay_err, UpayError::UrlParse(_)));
    }

    #[test]
    fn test_rejection_classification() {
        assert!(UpayError::SignatureMismatch { order_id: "1".into() }.is_rejection());
        assert!(UpayError::NotPaid { order_id: "1".into(), status: 1 }.is_rejection());
        assert!(UpayError::MalformedPayload("x".into()).is_rejection());
        assert!(!UpayError::Config("x".into()).is_rejection());
        assert!(!UpayError::Protocol("x".into()).is_rejection());
        assert!(UpayError::InvoiceNotFound("1".into()).is_rejection());
        assert!(!UpayError::Store("db down".into()).is_rejection());
    }

    #[test]
    fn test_user_message_passes_upstream_text() {
        let err = UpayError::UpstreamRejected {
            status_code: 400,
            message: "请先添加钱包地址".to_string(),
        };
        assert_eq!(err.user_message(), "Failed to create payment order: 请先添加钱包地址");
    }
}
