//! 易支付 (epay) plugin adapter.
//!
//! epay orders carry the payer's chosen coin, which must be one of the coins
//! this plugin offers and, when the channel pins a currency, that currency.
//! Callbacks arrive at `pay/notify/<trade_no>/` and are acknowledged with `ok`.
//! epay signs every field of a callback, not only the standard ones.

use super::{join_url, Invoice, PaymentGatewayAdapter};
use crate::client::GatewayConfig;
use crate::errors::{Result, UpayError};
use crate::types::OrderRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Payment types the epay plugin offers.
pub const EPAY_PAYMENT_TYPES: &[&str] = &["USDT-TRC20", "TRX", "USDT-Polygon"];

/// Channel settings as stored by epay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpayConfig {
    /// API base URL
    #[serde(rename = "appurl")]
    pub api_url: String,

    /// Shared secret (the UPAY API token)
    #[serde(rename = "appkey")]
    pub api_key: String,

    /// Currency this channel is pinned to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl EpayConfig {
    /// Converts to the shared gateway configuration.
    pub fn gateway(&self) -> GatewayConfig {
        let payment_type = self
            .pinned_currency()
            .unwrap_or(EPAY_PAYMENT_TYPES[0])
            .to_string();
        GatewayConfig::new(&self.api_url, &self.api_key, payment_type)
    }

    fn pinned_currency(&self) -> Option<&str> {
        self.currency.as_deref().filter(|c| !c.is_empty())
    }

    /// Payment types this channel accepts.
    pub fn supported_types(&self) -> Vec<&str> {
        match self.pinned_currency() {
            Some(currency) => vec![currency],
            None => EPAY_PAYMENT_TYPES.to_vec(),
        }
    }
}

/// An order as epay passes it to payment plugins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpayOrder {
    /// Trade number
    pub trade_no: String,

    /// Amount actually charged, after epay's fee rules
    pub realmoney: f64,

    /// Coin chosen by the payer
    #[serde(rename = "type")]
    pub payment_type: String,
}

impl From<EpayOrder> for Invoice {
    fn from(order: EpayOrder) -> Self {
        Invoice::new(order.trade_no, order.realmoney).with_payment_type(order.payment_type)
    }
}

/// Adapter for the epay UPAY plugin.
#[derive(Debug, Clone)]
pub struct EpayAdapter {
    site_url: String,
    local_url: String,
    config: EpayConfig,
    gateway: GatewayConfig,
}

impl EpayAdapter {
    /// Creates an adapter for the epay site at `site_url`.
    pub fn new(site_url: impl Into<String>, config: EpayConfig) -> Self {
        let site_url = site_url.into();
        Self {
            local_url: site_url.clone(),
            site_url,
            gateway: config.gateway(),
            config,
        }
    }

    /// Sets the URL the upstream should use to reach this site, when it
    /// differs from the public one.
    pub fn with_local_url(mut self, local_url: impl Into<String>) -> Self {
        self.local_url = local_url.into();
        self
    }

    /// Replaces the gateway configuration.
    pub fn with_gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }

    /// Callback URL for a trade.
    pub fn notify_url(&self, trade_no: &str) -> String {
        join_url(&self.local_url, &format!("pay/notify/{}/", trade_no))
    }

    /// Return URL for a trade.
    pub fn return_url(&self, trade_no: &str) -> String {
        join_url(&self.site_url, &format!("pay/return/{}/", trade_no))
    }

    fn payment_type(&self, invoice: &Invoice) -> Result<String> {
        let payment_type = match invoice.payment_type.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => return Err(UpayError::Config("Payment type is required".to_string())),
        };

        if !EPAY_PAYMENT_TYPES.contains(&payment_type)
            || !self.config.supported_types().contains(&payment_type)
        {
            return Err(UpayError::UnsupportedPaymentType(payment_type.to_string()));
        }
        Ok(payment_type.to_string())
    }
}

#[async_trait]
impl PaymentGatewayAdapter for EpayAdapter {
    fn name(&self) -> &str {
        "epay"
    }

    fn gateway(&self) -> &GatewayConfig {
        &self.gateway
    }

    fn signed_callback_fields(&self) -> Option<&'static [&'static str]> {
        None
    }

    fn build_order(&self, invoice: &Invoice) -> Result<OrderRequest> {
        Ok(OrderRequest::new(
            invoice.id.clone(),
            invoice.amount,
            self.payment_type(invoice)?,
            invoice
                .notify_url
                .clone()
                .unwrap_or_else(|| self.notify_url(&invoice.id)),
            invoice
                .return_url
                .clone()
                .unwrap_or_else(|| self.return_url(&invoice.id)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(currency: Option<&str>) -> EpayConfig {
        EpayConfig {
            api_url: "https://pay.example.com".to_string(),
            api_key: "token".to_string(),
            currency: currency.map(str::to_string),
        }
    }

    #[test]
    fn test_config_parsing() {
        let config: EpayConfig = serde_json::from_str(
            r#"{"appurl": "https://pay.example.com", "appkey": "token", "currency": "TRX"}"#,
        )
        .unwrap();
        assert_eq!(config.gateway().payment_type, "TRX");
        assert_eq!(config.supported_types(), vec!["TRX"]);

        let config: EpayConfig =
            serde_json::from_str(r#"{"appurl": "https://pay.example.com", "appkey": "token"}"#)
                .unwrap();
        assert_eq!(config.supported_types(), EPAY_PAYMENT_TYPES.to_vec());
    }

    #[test]
    fn test_urls() {
        let adapter = EpayAdapter::new("https://epay.example.com/", config(None))
            .with_local_url("http://10.0.0.2/");
        assert_eq!(adapter.notify_url("T100"), "http://10.0.0.2/pay/notify/T100/");
        assert_eq!(adapter.return_url("T100"), "https://epay.example.com/pay/return/T100/");
    }

    #[test]
    fn test_build_order() {
        let adapter = EpayAdapter::new("https://epay.example.com/", config(None));
        let invoice = Invoice::new("T100", 25.0).with_payment_type("USDT-Polygon");

        let order = adapter.build_order(&invoice).unwrap();
        assert_eq!(order.order_id, "T100");
        assert_eq!(order.payment_type.as_deref(), Some("USDT-Polygon"));
        assert_eq!(order.notify_url, "https://epay.example.com/pay/notify/T100/");
    }

    #[test]
    fn test_order_conversion() {
        let order: EpayOrder = serde_json::from_str(
            r#"{"trade_no": "2024010112345678", "realmoney": 9.9, "type": "TRX"}"#,
        )
        .unwrap();
        let invoice: Invoice = order.into();
        assert_eq!(invoice.amount, 9.9);

        let adapter = EpayAdapter::new("https://epay.example.com/", config(None));
        let request = adapter.build_order(&invoice).unwrap();
        assert_eq!(request.payment_type.as_deref(), Some("TRX"));
        assert_eq!(request.order_id, "2024010112345678");
    }

    #[test]
    fn test_unsupported_payment_types() {
        let adapter = EpayAdapter::new("https://epay.example.com", config(None));
        let invoice = Invoice::new("T1", 1.0).with_payment_type("USDC-BSC");
        assert!(matches!(
            adapter.build_order(&invoice),
            Err(UpayError::UnsupportedPaymentType(_))
        ));

        let pinned = EpayAdapter::new("https://epay.example.com", config(Some("TRX")));
        let invoice = Invoice::new("T1", 1.0).with_payment_type("USDT-TRC20");
        assert!(matches!(
            pinned.build_order(&invoice),
            Err(UpayError::UnsupportedPaymentType(_))
        ));

        assert!(matches!(
            adapter.build_order(&Invoice::new("T1", 1.0)),
            Err(UpayError::Config(_))
        ));
    }
}
