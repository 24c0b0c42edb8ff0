//! WHMCS gateway module adapter.
//!
//! WHMCS uses the invoice id as the upstream order id, receives callbacks at
//! `modules/gateways/callback/<module>.php` and expects the literal `success`.
//! Invoices are credited with the callback's `amount`, which is in the
//! invoice currency.

use super::{join_url, parse_amount, Invoice, PaymentGatewayAdapter};
use crate::client::GatewayConfig;
use crate::errors::Result;
use crate::types::{OrderRequest, VerifiedPayment};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Gateway settings as stored by WHMCS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhmcsConfig {
    /// API base URL
    #[serde(rename = "apiurl")]
    pub api_url: String,

    /// Shared secret
    #[serde(rename = "apikey")]
    pub api_key: String,

    /// Payment type
    #[serde(rename = "paymenttype", default = "default_payment_type")]
    pub payment_type: String,
}

fn default_payment_type() -> String {
    "USDT-TRC20".to_string()
}

impl WhmcsConfig {
    /// Converts to the shared gateway configuration.
    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig::new(&self.api_url, &self.api_key, &self.payment_type)
    }
}

/// Adapter for one WHMCS gateway module (e.g., `upay_usdt_trc20`).
#[derive(Debug, Clone)]
pub struct WhmcsAdapter {
    module: String,
    system_url: String,
    gateway: GatewayConfig,
}

impl WhmcsAdapter {
    /// Creates an adapter for `module` on the WHMCS install at `system_url`.
    pub fn new(module: impl Into<String>, system_url: impl Into<String>, config: &WhmcsConfig) -> Self {
        Self {
            module: module.into(),
            system_url: system_url.into(),
            gateway: config.gateway(),
        }
    }

    /// Replaces the gateway configuration.
    pub fn with_gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }

    /// Callback URL of this module.
    pub fn notify_url(&self) -> String {
        join_url(
            &self.system_url,
            &format!("modules/gateways/callback/{}.php", self.module),
        )
    }

    /// Invoice page the payer returns to by default.
    pub fn invoice_url(&self, invoice_id: &str) -> String {
        join_url(&self.system_url, &format!("viewinvoice.php?id={}", invoice_id))
    }
}

#[async_trait]
impl PaymentGatewayAdapter for WhmcsAdapter {
    fn name(&self) -> &str {
        "whmcs"
    }

    fn gateway(&self) -> &GatewayConfig {
        &self.gateway
    }

    fn success_body(&self) -> &'static str {
        "success"
    }

    fn build_order(&self, invoice: &Invoice) -> Result<OrderRequest> {
        Ok(OrderRequest::new(
            invoice.id.clone(),
            invoice.amount,
            invoice
                .payment_type
                .clone()
                .unwrap_or_else(|| self.gateway.payment_type.clone()),
            invoice.notify_url.clone().unwrap_or_else(|| self.notify_url()),
            invoice
                .return_url
                .clone()
                .unwrap_or_else(|| self.invoice_url(&invoice.id)),
        ))
    }

    fn credit_amount(&self, payment: &VerifiedPayment) -> Result<f64> {
        parse_amount(&payment.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> WhmcsAdapter {
        let config: WhmcsConfig = serde_json::from_str(
            r#"{"apiurl": "https://pay.example.com/", "apikey": "k1", "paymenttype": "USDC-Polygon"}"#,
        )
        .unwrap();
        WhmcsAdapter::new("upay_usdc_polygon", "https://billing.example.com/", &config)
    }

    #[test]
    fn test_config_parsing() {
        let config: WhmcsConfig =
            serde_json::from_str(r#"{"apiurl": "https://pay.example.com", "apikey": "k1"}"#).unwrap();
        assert_eq!(config.payment_type, "USDT-TRC20");
        assert_eq!(config.gateway().secret_key, "k1");
    }

    #[test]
    fn test_notify_url() {
        assert_eq!(
            adapter().notify_url(),
            "https://billing.example.com/modules/gateways/callback/upay_usdc_polygon.php"
        );
    }

    #[test]
    fn test_build_order() {
        let order = adapter().build_order(&Invoice::new("42", 19.99)).unwrap();
        assert_eq!(order.order_id, "42");
        assert_eq!(order.amount, 19.99);
        assert_eq!(order.payment_type.as_deref(), Some("USDC-Polygon"));
        assert_eq!(order.redirect_url, "https://billing.example.com/viewinvoice.php?id=42");
    }

    #[test]
    fn test_build_order_prefers_invoice_urls() {
        let invoice = Invoice::new("42", 1.0).with_return_url("https://billing.example.com/done");
        let order = adapter().build_order(&invoice).unwrap();
        assert_eq!(order.redirect_url, "https://billing.example.com/done");
    }

    #[test]
    fn test_success_literal() {
        assert_eq!(adapter().success_body(), "success");
    }
}
