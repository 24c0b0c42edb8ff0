//! Order submission to the upstream payment API.
//!
//! This module holds the per-gateway configuration and the functions that sign
//! an order, POST it to the upstream `create_order` endpoint and turn the
//! response into a payment URL for the host to redirect to.

use crate::errors::{Result, UpayError};
use crate::signing::{sign_order, Canonicalization};
use crate::types::{
    CreateOrderResponse, CreatedOrder, OrderRequest, SignedOrderRequest, CREATE_ORDER_PATH,
};
use crate::utils::{normalize_api_url, validate_amount};
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for the order creation call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent with every upstream request.
pub const DEFAULT_USER_AGENT: &str = concat!("upay-rs/", env!("CARGO_PKG_VERSION"));

/// Configuration of one gateway installation.
///
/// Owned by the host; the library only reads it.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Base URL of the upstream API (e.g., "https://pay.example.com")
    pub api_url: String,

    /// Shared secret used to sign requests and verify callbacks
    pub secret_key: String,

    /// Payment type requested for new orders (e.g., "USDT-TRC20")
    pub payment_type: String,

    /// Timeout applied to each upstream call
    pub timeout: Duration,

    /// Canonicalization expected by the upstream
    pub canonicalization: Canonicalization,

    /// Path of the order creation endpoint, appended to `api_url`
    pub create_order_path: String,

    /// HTTP client to use for requests
    pub http_client: Client,
}

impl GatewayConfig {
    /// Creates a new gateway configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use upay_rs::client::GatewayConfig;
    ///
    /// let config = GatewayConfig::new("https://pay.example.com", "secret", "USDT-TRC20");
    /// assert_eq!(config.create_order_path, "/api/create_order");
    /// ```
    pub fn new(
        api_url: impl Into<String>,
        secret_key: impl Into<String>,
        payment_type: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            secret_key: secret_key.into(),
            payment_type: payment_type.into(),
            timeout: DEFAULT_TIMEOUT,
            canonicalization: Canonicalization::default(),
            create_order_path: CREATE_ORDER_PATH.to_string(),
            http_client: Client::new(),
        }
    }

    /// Loads the configuration from `UPAY_API_URL`, `UPAY_SECRET_KEY`,
    /// `UPAY_PAYMENT_TYPE` and the optional `UPAY_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        fn required(name: &str) -> Result<String> {
            std::env::var(name)
                .map_err(|_| UpayError::Config(format!("Environment variable {} is not set", name)))
        }

        let mut config = Self::new(
            required("UPAY_API_URL")?,
            required("UPAY_SECRET_KEY")?,
            std::env::var("UPAY_PAYMENT_TYPE").unwrap_or_else(|_| "USDT-TRC20".to_string()),
        );

        if let Ok(secs) = std::env::var("UPAY_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|_| {
                UpayError::Config(format!("UPAY_TIMEOUT_SECS must be an integer, got '{}'", secs))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Sets the timeout for upstream calls.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the canonicalization the upstream expects.
    pub fn with_canonicalization(mut self, canonicalization: Canonicalization) -> Self {
        self.canonicalization = canonicalization;
        self
    }

    /// Sets the order creation endpoint path.
    pub fn with_create_order_path(mut self, path: impl Into<String>) -> Self {
        self.create_order_path = path.into();
        self
    }

    /// Sets a custom HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }

    /// Builds an order request using this gateway's payment type.
    pub fn order(
        &self,
        order_id: impl Into<String>,
        amount: f64,
        notify_url: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> OrderRequest {
        OrderRequest::new(order_id, amount, self.payment_type.clone(), notify_url, redirect_url)
    }

    /// Checks that the configuration can be used for a call.
    ///
    /// Returns the normalized API base URL.
    pub fn validate(&self) -> Result<String> {
        if self.secret_key.is_empty() {
            return Err(UpayError::Config("Secret key is not configured".to_string()));
        }
        normalize_api_url(&self.api_url)
    }

    /// Full URL of the order creation endpoint.
    pub fn create_order_url(&self) -> Result<String> {
        Ok(format!("{}{}", self.validate()?, self.create_order_path))
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_url", &self.api_url)
            .field("secret_key", &"<redacted>")
            .field("payment_type", &self.payment_type)
            .field("timeout", &self.timeout)
            .field("canonicalization", &self.canonicalization)
            .field("create_order_path", &self.create_order_path)
            .finish()
    }
}

/// Creates an order on the upstream API.
///
/// Signs `order` with the gateway secret, POSTs it as JSON and returns the
/// created order. Nothing is retried: the caller may retry with the same
/// `order_id` and rely on the upstream to reject duplicates.
///
/// # Examples
///
/// ```no_run
/// use upay_rs::client::{create_order, GatewayConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GatewayConfig::new("https://pay.example.com", "secret", "USDT-TRC20");
/// let order = config.order(
///     "1001",
///     10.5,
///     "https://shop.example.com/notify",
///     "https://shop.example.com/return",
/// );
///
/// let created = create_order(&config, &order).await?;
/// println!("Redirect to: {}", created.payment_url);
/// # Ok(())
/// # }
/// ```
pub async fn create_order(config: &GatewayConfig, order: &OrderRequest) -> Result<CreatedOrder> {
    let url = config.create_order_url()?;
    validate_amount(order.amount)?;

    let body = SignedOrderRequest {
        signature: sign_order(order, &config.secret_key, config.canonicalization),
        order: order.clone(),
    };

    debug!(
        order_id = %order.order_id,
        payment_type = order.payment_type.as_deref().unwrap_or(""),
        amount = %order.amount_text(),
        url = %url,
        "Submitting order"
    );

    let response = config
        .http_client
        .post(&url)
        .timeout(config.timeout)
        .header(USER_AGENT, DEFAULT_USER_AGENT)
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let message = error_message(&text);
        warn!(
            order_id = %order.order_id,
            status = status.as_u16(),
            upstream_message = message.as_deref().unwrap_or(""),
            "Order creation failed"
        );
        return Err(UpayError::HttpStatus {
            status: status.as_u16(),
            message,
        });
    }

    let parsed: CreateOrderResponse = serde_json::from_str(&text)
        .map_err(|e| UpayError::Protocol(format!("Invalid response body: {}", e)))?;

    let created = parse_create_order_response(parsed)?;
    info!(
        order_id = %order.order_id,
        trade_id = created.trade_id.as_deref().unwrap_or(""),
        "Order created"
    );
    Ok(created)
}

/// Creates an order and returns only the payment URL.
pub async fn create_order_url(config: &GatewayConfig, order: &OrderRequest) -> Result<String> {
    create_order(config, order).await.map(|created| created.payment_url)
}

/// Interprets the body of a 2xx order creation response.
///
/// # Examples
///
/// ```
/// use upay_rs::client::parse_create_order_response;
/// use upay_rs::types::CreateOrderResponse;
///
/// let response: CreateOrderResponse = serde_json::from_str(
///     r#"{"status_code": 200, "data": {"payment_url": "https://pay.example.com/p/1"}}"#,
/// ).unwrap();
///
/// let created = parse_create_order_response(response).unwrap();
/// assert_eq!(created.payment_url, "https://pay.example.com/p/1");
/// ```
pub fn parse_create_order_response(response: CreateOrderResponse) -> Result<CreatedOrder> {
    if response.status_code != 200 {
        let message = response
            .message
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!(
            status_code = response.status_code,
            upstream_message = %message,
            "Upstream rejected order"
        );
        return Err(UpayError::UpstreamRejected {
            status_code: response.status_code,
            message,
        });
    }

    let data = response
        .data
        .ok_or_else(|| UpayError::Protocol("Missing field: data".to_string()))?;

    let payment_url = data
        .payment_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| UpayError::Protocol("Missing field: data.payment_url".to_string()))?;

    Ok(CreatedOrder {
        payment_url,
        trade_id: data.trade_id,
        actual_amount: data.actual_amount,
        token: data.token,
        expiration_time: data.expiration_time,
    })
}

/// Extracts the `message` field from an error body, if it is JSON.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_owned))
}
