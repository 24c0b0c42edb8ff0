//! Core type definitions for the UPAY protocol.
//!
//! This module contains the wire shapes exchanged with the upstream payment API
//! (order requests, order responses, callbacks) and the typed results the
//! library hands back to host integrations.

use serde::{Deserialize, Serialize};

/// Path of the order creation endpoint on UPAY servers.
pub const CREATE_ORDER_PATH: &str = "/api/create_order";

/// Path of the order creation endpoint on EPUSDT servers.
pub const EPUSDT_CREATE_ORDER_PATH: &str = "/api/v1/order/create-transaction";

/// Name of the signature field in every signed payload.
pub const SIGNATURE_FIELD: &str = "signature";

/// Payment types accepted by the upstream API.
pub const SUPPORTED_PAYMENT_TYPES: &[&str] = &[
    "USDT-TRC20",
    "TRX",
    "USDT-Polygon",
    "USDT-BSC",
    "USDT-ERC20",
    "USDT-ArbitrumOne",
    "USDC-ERC20",
    "USDC-Polygon",
    "USDC-BSC",
    "USDC-ArbitrumOne",
];

/// Returns true if `payment_type` is one of [`SUPPORTED_PAYMENT_TYPES`].
pub fn is_supported_payment_type(payment_type: &str) -> bool {
    SUPPORTED_PAYMENT_TYPES.contains(&payment_type)
}

/// Outbound order creation request, before signing.
///
/// # Examples
///
/// ```
/// use upay_rs::types::OrderRequest;
///
/// let order = OrderRequest::new(
///     "1001",
///     10.5,
///     "USDT-TRC20",
///     "https://shop.example.com/notify",
///     "https://shop.example.com/return",
/// );
/// assert_eq!(order.amount_text(), "10.5");
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OrderRequest {
    /// Merchant order id, unique per invoice attempt
    pub order_id: String,

    /// Amount in the invoice currency
    pub amount: f64,

    /// Payment type (e.g., "USDT-TRC20"); EPUSDT upstreams take none
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub payment_type: Option<String>,

    /// URL the upstream will POST the payment callback to
    pub notify_url: String,

    /// URL the payer is sent back to after paying
    pub redirect_url: String,
}

impl OrderRequest {
    /// Creates a new order request.
    pub fn new(
        order_id: impl Into<String>,
        amount: f64,
        payment_type: impl Into<String>,
        notify_url: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            order_id: order_id.into(),
            amount,
            payment_type: Some(payment_type.into()),
            notify_url: notify_url.into(),
            redirect_url: redirect_url.into(),
        }
    }

    /// Drops the payment type, for upstreams that neither take nor sign it.
    pub fn without_payment_type(mut self) -> Self {
        self.payment_type = None;
        self
    }

    /// Text form of `amount` that goes into the signature.
    ///
    /// Shortest round-trip rendering: `100.0` signs as `"100"`, `10.5` as `"10.5"`.
    pub fn amount_text(&self) -> String {
        crate::utils::format_amount(self.amount)
    }
}

/// Signed order request as sent on the wire.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SignedOrderRequest {
    /// The order fields
    #[serde(flatten)]
    pub order: OrderRequest,

    /// 32-char lowercase hex MD5 signature
    pub signature: String,
}

/// Response body of the order creation endpoint.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateOrderResponse {
    /// Application level status (200 on success)
    pub status_code: i64,

    /// Error or informational message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Order data, present on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<OrderData>,
}

/// The `data` object of a successful order creation.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct OrderData {
    /// Upstream transaction id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,

    /// Echo of the merchant order id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    /// Order amount in the invoice currency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,

    /// Amount the payer must send, in crypto units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_amount: Option<f64>,

    /// Receiving wallet address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Unix timestamp after which the order expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,

    /// Checkout page to redirect the payer to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
}

/// A successfully created order.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedOrder {
    /// Checkout page to redirect the payer to
    pub payment_url: String,

    /// Upstream transaction id, if reported
    pub trade_id: Option<String>,

    /// Amount the payer must send, if reported
    pub actual_amount: Option<f64>,

    /// Receiving wallet address, if reported
    pub token: Option<String>,

    /// Expiry as a Unix timestamp, if reported
    pub expiration_time: Option<i64>,
}

/// Status codes carried by payment callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    /// Waiting for the payer
    Pending,
    /// Paid and confirmed on chain
    Paid,
    /// Expired without payment
    Expired,
    /// Any other code
    Unknown(i64),
}

impl PaymentStatus {
    /// Maps the raw numeric code to a status.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => PaymentStatus::Pending,
            2 => PaymentStatus::Paid,
            3 => PaymentStatus::Expired,
            other => PaymentStatus::Unknown(other),
        }
    }

    /// The raw numeric code.
    pub fn code(self) -> i64 {
        match self {
            PaymentStatus::Pending => 1,
            PaymentStatus::Paid => 2,
            PaymentStatus::Expired => 3,
            PaymentStatus::Unknown(code) => code,
        }
    }
}

/// Inbound payment callback as the upstream sends it.
///
/// Every value is kept as the text that was received, since the signature is
/// computed over exactly that text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CallbackPayload {
    /// Upstream transaction id
    pub trade_id: String,
    /// Merchant order id
    pub order_id: String,
    /// Order amount in the invoice currency
    pub amount: String,
    /// Amount received, in crypto units
    pub actual_amount: String,
    /// Receiving wallet address
    pub token: String,
    /// On-chain transaction hash
    pub block_transaction_id: String,
    /// Raw status code
    pub status: String,
    /// Claimed signature
    pub signature: String,
}

/// Fields every callback must carry.
pub const CALLBACK_REQUIRED_FIELDS: &[&str] = &[
    SIGNATURE_FIELD,
    "trade_id",
    "order_id",
    "amount",
    "actual_amount",
    "token",
    "block_transaction_id",
    "status",
];

/// Callback fields covered by the upstream's signature.
pub const SIGNED_CALLBACK_FIELDS: &[&str] = &[
    "trade_id",
    "order_id",
    "amount",
    "actual_amount",
    "token",
    "block_transaction_id",
    "status",
];

/// A callback whose signature checked out and whose status is "paid".
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPayment {
    /// Merchant order id (the invoice reference)
    pub invoice_ref: String,
    /// Upstream transaction id, used for duplicate detection by the host
    pub external_txn_id: String,
    /// Amount to credit: `actual_amount`, or `amount` when that is empty
    pub credit_amount: String,
    /// Order amount in the invoice currency
    pub amount: String,
    /// Amount received, in crypto units
    pub actual_amount: String,
    /// Receiving wallet address
    pub token: String,
    /// On-chain transaction hash
    pub block_transaction_id: String,
    /// Raw status code (always 2)
    pub raw_status: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signed_order_request_wire_shape() {
        let signed = SignedOrderRequest {
            order: OrderRequest::new("1001", 10.5, "USDT-TRC20", "https://x/n", "https://x/r"),
            signature: "0".repeat(32),
        };

        let value = serde_json::to_value(&signed).unwrap();
        assert_eq!(
            value,
            json!({
                "order_id": "1001",
                "amount": 10.5,
                "type": "USDT-TRC20",
                "notify_url": "https://x/n",
                "redirect_url": "https://x/r",
                "signature": "00000000000000000000000000000000",
            })
        );
    }

    #[test]
    fn test_order_without_payment_type_omits_type() {
        let signed = SignedOrderRequest {
            order: OrderRequest::new("1001", 10.5, "USDT-TRC20", "https://x/n", "https://x/r")
                .without_payment_type(),
            signature: "0".repeat(32),
        };

        let value = serde_json::to_value(&signed).unwrap();
        assert!(value.get("type").is_none());
        assert_eq!(value.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_create_order_response_parsing() {
        let body = r#"{
            "status_code": 200,
            "message": "success",
            "data": {
                "trade_id": "T1",
                "order_id": "1001",
                "amount": 10.5,
                "actual_amount": 1.47,
                "token": "TXabc",
                "expiration_time": 1700000000,
                "payment_url": "https://pay.example.com/pay/checkout-counter/T1"
            }
        }"#;

        let response: CreateOrderResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.status_code, 200);
        let data = response.data.unwrap();
        assert_eq!(data.trade_id.as_deref(), Some("T1"));
        assert_eq!(data.actual_amount, Some(1.47));
    }

    #[test]
    fn test_error_response_parsing() {
        let response: CreateOrderResponse =
            serde_json::from_str(r#"{"status_code": 400, "message": "bad"}"#).unwrap();
        assert!(response.data.is_none());
        assert_eq!(response.message.as_deref(), Some("bad"));
    }

    #[test]
    fn test_payment_status_codes() {
        assert_eq!(PaymentStatus::from_code(2), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_code(1), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_code(3), PaymentStatus::Expired);
        assert_eq!(PaymentStatus::from_code(9), PaymentStatus::Unknown(9));
        assert_eq!(PaymentStatus::Unknown(9).code(), 9);
    }

    #[test]
    fn test_supported_payment_types() {
        assert!(is_supported_payment_type("USDT-TRC20"));
        assert!(is_supported_payment_type("USDC-ArbitrumOne"));
        assert!(!is_supported_payment_type("usdt-trc20"));
        assert!(!is_supported_payment_type("BTC"));
    }
}
