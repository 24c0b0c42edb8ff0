//! 智简魔方 (mofang) gateway plugin adapter.
//!
//! mofang bills are submitted as `mofang_pay_<bill>_<unix time>` so that a
//! bill can be paid again after an order expired. Callbacks carry that order
//! id back and the bill id is recovered from it.
//!
//! The same host also ships an EPUSDT plugin. It has its own settings and
//! neither sends nor signs a payment type.

use super::{join_url, parse_amount, Invoice, PaymentGatewayAdapter};
use crate::client::GatewayConfig;
use crate::errors::{Result, UpayError};
use crate::types::{OrderRequest, VerifiedPayment, EPUSDT_CREATE_ORDER_PATH};
use crate::utils::{current_timestamp, round_to_cents};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Prefix of every order id submitted by this adapter.
pub const ORDER_ID_PREFIX: &str = "mofang_pay";

/// mofang gives the upstream five seconds to answer.
pub const MOFANG_TIMEOUT: Duration = Duration::from_secs(5);

/// Plugin settings as stored by mofang.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MofangConfig {
    /// API base URL
    #[serde(rename = "upay_api")]
    pub api_url: String,

    /// Shared secret
    #[serde(rename = "upay_token")]
    pub token: String,

    /// Payment type
    #[serde(rename = "upay_type")]
    pub payment_type: String,
}

impl MofangConfig {
    /// Converts to the shared gateway configuration.
    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig::new(&self.api_url, &self.token, &self.payment_type).with_timeout(MOFANG_TIMEOUT)
    }
}

/// EPUSDT plugin settings as stored by mofang.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpusdtConfig {
    /// API base URL
    #[serde(rename = "epusdt_api")]
    pub api_url: String,

    /// Shared secret
    #[serde(rename = "epusdt_token")]
    pub token: String,
}

impl EpusdtConfig {
    /// Converts to the shared gateway configuration.
    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig::new(&self.api_url, &self.token, "")
            .with_timeout(MOFANG_TIMEOUT)
            .with_create_order_path(EPUSDT_CREATE_ORDER_PATH)
    }
}

/// Builds the order id for a bill at a given time.
pub fn order_id_for(bill_id: &str, timestamp: i64) -> String {
    format!("{}_{}_{}", ORDER_ID_PREFIX, bill_id, timestamp)
}

/// Recovers the bill id from an order id built by [`order_id_for`].
pub fn bill_id_from(order_id: &str) -> Result<String> {
    let malformed = || UpayError::MalformedPayload(format!("Unexpected order id '{}'", order_id));

    let rest = order_id
        .strip_prefix(ORDER_ID_PREFIX)
        .and_then(|rest| rest.strip_prefix('_'))
        .ok_or_else(malformed)?;
    match rest.split('_').next() {
        Some(bill_id) if !bill_id.is_empty() => Ok(bill_id.to_string()),
        _ => Err(malformed()),
    }
}

/// Adapter for the mofang UPAY and EPUSDT plugins.
#[derive(Debug, Clone)]
pub struct MofangAdapter {
    domain: String,
    module: String,
    gateway: GatewayConfig,
    sends_payment_type: bool,
}

impl MofangAdapter {
    /// Creates an adapter for the `upay` plugin on the mofang site at `domain`.
    pub fn new(domain: impl Into<String>, config: &MofangConfig) -> Self {
        Self {
            domain: domain.into(),
            module: "upay".to_string(),
            gateway: config.gateway(),
            sends_payment_type: true,
        }
    }

    /// Creates an adapter for the `epusdt` plugin, which talks to an EPUSDT
    /// compatible upstream.
    pub fn epusdt(domain: impl Into<String>, config: &EpusdtConfig) -> Self {
        Self {
            domain: domain.into(),
            module: "epusdt".to_string(),
            gateway: config.gateway(),
            sends_payment_type: false,
        }
    }

    /// Replaces the gateway configuration.
    pub fn with_gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }

    /// Callback URL of this plugin.
    pub fn notify_url(&self) -> String {
        join_url(
            &self.domain,
            &format!("gateway/{}/index/notify_handle", self.module),
        )
    }

    /// Bill page the payer returns to.
    pub fn bill_url(&self, bill_id: &str) -> String {
        join_url(&self.domain, &format!("viewbilling?id={}", bill_id))
    }

    /// Builds the order for `invoice` as if submitted at `timestamp`.
    pub fn build_order_at(&self, invoice: &Invoice, timestamp: i64) -> OrderRequest {
        let order = OrderRequest::new(
            order_id_for(&invoice.id, timestamp),
            round_to_cents(invoice.amount),
            invoice
                .payment_type
                .clone()
                .unwrap_or_else(|| self.gateway.payment_type.clone()),
            invoice.notify_url.clone().unwrap_or_else(|| self.notify_url()),
            invoice
                .return_url
                .clone()
                .unwrap_or_else(|| self.bill_url(&invoice.id)),
        );

        if self.sends_payment_type {
            order
        } else {
            order.without_payment_type()
        }
    }
}

#[async_trait]
impl PaymentGatewayAdapter for MofangAdapter {
    fn name(&self) -> &str {
        "mofang"
    }

    fn gateway(&self) -> &GatewayConfig {
        &self.gateway
    }

    fn build_order(&self, invoice: &Invoice) -> Result<OrderRequest> {
        Ok(self.build_order_at(invoice, current_timestamp()))
    }

    fn invoice_id(&self, order_id: &str) -> Result<String> {
        bill_id_from(order_id)
    }

    fn credit_amount(&self, payment: &VerifiedPayment) -> Result<f64> {
        parse_amount(&payment.amount)
    }
}
