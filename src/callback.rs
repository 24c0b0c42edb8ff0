//! Verification of inbound payment callbacks.
//!
//! The upstream POSTs a callback to the order's `notify_url` when a payment
//! reaches a final state. This module parses the body (JSON or form-encoded),
//! checks that every required field is present, recomputes the signature over
//! the signed fields and only yields a [`VerifiedPayment`] for an authentic
//! callback reporting status 2 (paid).
//!
//! Crediting the invoice and rejecting duplicate transaction ids is left to
//! the host; see [`crate::hosts::InvoiceStore`].

use crate::errors::{Result, UpayError};
use crate::signing::{verify_signature, Canonicalization, SignableParams};
use crate::types::{
    CallbackPayload, PaymentStatus, VerifiedPayment, CALLBACK_REQUIRED_FIELDS, SIGNATURE_FIELD,
    SIGNED_CALLBACK_FIELDS,
};
use crate::utils::json_value_to_text;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Raw callback fields, keyed by name.
pub type CallbackFields = BTreeMap<String, String>;

/// Encoding of a callback body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// `application/json` object
    Json,
    /// `application/x-www-form-urlencoded`
    Form,
}

impl PayloadFormat {
    /// Picks the format from the `Content-Type` header, falling back to
    /// sniffing the body when the header is absent or unrecognized.
    pub fn detect(content_type: Option<&str>, body: &[u8]) -> Self {
        if let Some(content_type) = content_type {
            let content_type = content_type.to_ascii_lowercase();
            if content_type.contains("json") {
                return PayloadFormat::Json;
            }
            if content_type.contains("x-www-form-urlencoded") {
                return PayloadFormat::Form;
            }
        }

        match body.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => PayloadFormat::Json,
            _ => PayloadFormat::Form,
        }
    }
}

/// Parses a callback body into its raw fields.
///
/// JSON strings are kept verbatim and JSON numbers keep their parsed textual
/// form, since that text is what the upstream signed.
///
/// # Examples
///
/// ```
/// use upay_rs::callback::parse_callback;
///
/// let fields = parse_callback(br#"{"order_id": "1001", "status": 2}"#, None).unwrap();
/// assert_eq!(fields["status"], "2");
///
/// let fields = parse_callback(b"order_id=1001&status=2", None).unwrap();
/// assert_eq!(fields["order_id"], "1001");
/// ```
pub fn parse_callback(body: &[u8], content_type: Option<&str>) -> Result<CallbackFields> {
    match PayloadFormat::detect(content_type, body) {
        PayloadFormat::Json => parse_json(body),
        PayloadFormat::Form => Ok(url::form_urlencoded::parse(body).into_owned().collect()),
    }
}

fn parse_json(body: &[u8]) -> Result<CallbackFields> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| UpayError::MalformedPayload(format!("Invalid JSON body: {}", e)))?;

    let object = match value {
        Value::Object(object) => object,
        _ => {
            return Err(UpayError::MalformedPayload(
                "Callback body is not a JSON object".to_string(),
            ))
        }
    };

    object
        .into_iter()
        .map(|(key, value)| match json_value_to_text(&value) {
            Some(text) => Ok((key, text)),
            None => Err(UpayError::MalformedPayload(format!(
                "Field '{}' has no signable value",
                key
            ))),
        })
        .collect()
}

/// Checks that every required callback field is present.
pub fn check_required_fields(fields: &CallbackFields) -> Result<()> {
    let missing: Vec<&str> = CALLBACK_REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|name| !fields.contains_key(*name))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(UpayError::MalformedPayload(format!(
            "Missing required field: {}",
            missing.join(", ")
        )))
    }
}

/// Verifies already parsed callback fields.
///
/// The signature is recomputed over [`SIGNED_CALLBACK_FIELDS`]; any other
/// field the upstream adds is ignored. A mismatch is logged as a potential
/// forgery and never retried.
pub fn verify_fields(
    fields: CallbackFields,
    secret: &str,
    variant: Canonicalization,
) -> Result<VerifiedPayment> {
    verify_fields_with(fields, secret, variant, Some(SIGNED_CALLBACK_FIELDS))
}

/// Verifies callback fields against an explicit set of signed fields.
///
/// `None` signs every received field except `signature`.
pub fn verify_fields_with(
    mut fields: CallbackFields,
    secret: &str,
    variant: Canonicalization,
    signed_fields: Option<&[&str]>,
) -> Result<VerifiedPayment> {
    check_required_fields(&fields)?;

    let claimed = fields.remove(SIGNATURE_FIELD).unwrap_or_default();
    let order_id = fields.get("order_id").cloned().unwrap_or_default();

    let params: SignableParams = fields
        .iter()
        .filter(|(k, _)| signed_fields.map_or(true, |names| names.contains(&k.as_str())))
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    if !verify_signature(&params, secret, &claimed, variant) {
        warn!(
            order_id = %order_id,
            trade_id = fields.get("trade_id").map(String::as_str).unwrap_or(""),
            "Callback signature mismatch, possible forgery"
        );
        return Err(UpayError::SignatureMismatch { order_id });
    }

    let raw_status = fields
        .get("status")
        .map(|s| s.trim())
        .unwrap_or_default()
        .parse::<i64>()
        .map_err(|_| UpayError::MalformedPayload("Field 'status' is not an integer".to_string()))?;

    if PaymentStatus::from_code(raw_status) != PaymentStatus::Paid {
        debug!(order_id = %order_id, status = raw_status, "Callback does not report a paid order");
        return Err(UpayError::NotPaid {
            order_id,
            status: raw_status,
        });
    }

    let mut take = |name: &str| fields.remove(name).unwrap_or_default();
    let amount = take("amount");
    let actual_amount = take("actual_amount");
    let payment = VerifiedPayment {
        invoice_ref: take("order_id"),
        external_txn_id: take("trade_id"),
        credit_amount: if actual_amount.is_empty() {
            amount.clone()
        } else {
            actual_amount.clone()
        },
        amount,
        actual_amount,
        token: take("token"),
        block_transaction_id: take("block_transaction_id"),
        raw_status,
    };

    info!(
        order_id = %payment.invoice_ref,
        trade_id = %payment.external_txn_id,
        amount = %payment.credit_amount,
        "Payment callback verified"
    );
    Ok(payment)
}

/// Parses and verifies a raw callback body.
///
/// # Examples
///
/// ```
/// use upay_rs::callback::verify_callback;
/// use upay_rs::signing::{sign, Canonicalization};
/// use upay_rs::errors::UpayError;
///
/// let fields = [
///     ("trade_id", "T1"),
///     ("order_id", "1001"),
///     ("amount", "10.5"),
///     ("actual_amount", "1.47"),
///     ("token", "TXabc"),
///     ("block_transaction_id", "0xhash"),
///     ("status", "2"),
/// ];
/// let signature = sign(fields, "k1", Canonicalization::SortByKey);
/// let body = format!(
///     "trade_id=T1&order_id=1001&amount=10.5&actual_amount=1.47&token=TXabc\
///      &block_transaction_id=0xhash&status=2&signature={}",
///     signature
/// );
///
/// let payment = verify_callback(body.as_bytes(), None, "k1", Canonicalization::SortByKey).unwrap();
/// assert_eq!(payment.invoice_ref, "1001");
/// assert_eq!(payment.credit_amount, "1.47");
///
/// let forged = verify_callback(body.as_bytes(), None, "k2", Canonicalization::SortByKey);
/// assert!(matches!(forged, Err(UpayError::SignatureMismatch { .. })));
/// ```
pub fn verify_callback(
    body: &[u8],
    content_type: Option<&str>,
    secret: &str,
    variant: Canonicalization,
) -> Result<VerifiedPayment> {
    let fields = parse_callback(body, content_type)?;
    verify_fields(fields, secret, variant)
}

/// Parses and verifies a raw callback body against an explicit set of
/// signed fields. See [`verify_fields_with`].
pub fn verify_callback_with(
    body: &[u8],
    content_type: Option<&str>,
    secret: &str,
    variant: Canonicalization,
    signed_fields: Option<&[&str]>,
) -> Result<VerifiedPayment> {
    let fields = parse_callback(body, content_type)?;
    verify_fields_with(fields, secret, variant, signed_fields)
}

/// Verifies a typed callback payload.
pub fn verify_payload(
    payload: &CallbackPayload,
    secret: &str,
    variant: Canonicalization,
) -> Result<VerifiedPayment> {
    verify_fields(payload_fields(payload), secret, variant)
}

/// Flattens a typed payload into raw fields, signature included.
pub fn payload_fields(payload: &CallbackPayload) -> CallbackFields {
    [
        ("trade_id", &payload.trade_id),
        ("order_id", &payload.order_id),
        ("amount", &payload.amount),
        ("actual_amount", &payload.actual_amount),
        ("token", &payload.token),
        ("block_transaction_id", &payload.block_transaction_id),
        ("status", &payload.status),
        (SIGNATURE_FIELD, &payload.signature),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.clone()))
    .collect()
}
