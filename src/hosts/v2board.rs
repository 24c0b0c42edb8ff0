//! v2board payment plugin adapter.
//!
//! v2board hands over orders with integer cent amounts and its own notify and
//! return URLs. Its upstream signs sorted `key=value` strings rather than
//! sorted keys, so this adapter uses [`Canonicalization::SortByKeyValuePair`].

use super::{Invoice, PaymentGatewayAdapter};
use crate::client::GatewayConfig;
use crate::errors::{Result, UpayError};
use crate::signing::Canonicalization;
use crate::types::OrderRequest;
use crate::utils::cents_to_amount;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Plugin form values as stored by v2board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V2boardConfig {
    /// API base URL
    #[serde(rename = "upaypro_url")]
    pub api_url: String,

    /// Shared secret
    pub secret_key: String,

    /// Payment type
    #[serde(rename = "type")]
    pub payment_type: String,
}

impl V2boardConfig {
    /// Converts to the shared gateway configuration.
    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig::new(&self.api_url, &self.secret_key, &self.payment_type)
            .with_canonicalization(Canonicalization::SortByKeyValuePair)
    }
}

/// An order as v2board passes it to payment plugins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct V2boardOrder {
    /// Trade number
    pub trade_no: String,

    /// Total in cents
    pub total_amount: i64,

    /// Callback URL built by v2board
    pub notify_url: String,

    /// Return URL built by v2board
    pub return_url: String,
}

impl From<V2boardOrder> for Invoice {
    fn from(order: V2boardOrder) -> Self {
        Invoice::new(order.trade_no, cents_to_amount(order.total_amount))
            .with_notify_url(order.notify_url)
            .with_return_url(order.return_url)
    }
}

/// Adapter for the v2board payment plugin.
#[derive(Debug, Clone)]
pub struct V2boardAdapter {
    gateway: GatewayConfig,
}

impl V2boardAdapter {
    /// Creates an adapter from plugin settings.
    pub fn new(config: &V2boardConfig) -> Self {
        Self {
            gateway: config.gateway(),
        }
    }

    /// Replaces the gateway configuration.
    pub fn with_gateway(mut self, gateway: GatewayConfig) -> Self {
        self.gateway = gateway;
        self
    }
}

#[async_trait]
impl PaymentGatewayAdapter for V2boardAdapter {
    fn name(&self) -> &str {
        "v2board"
    }

    fn gateway(&self) -> &GatewayConfig {
        &self.gateway
    }

    fn canonicalization(&self) -> Canonicalization {
        Canonicalization::SortByKeyValuePair
    }

    fn build_order(&self, invoice: &Invoice) -> Result<OrderRequest> {
        let notify_url = invoice
            .notify_url
            .clone()
            .ok_or_else(|| UpayError::Config("v2board order has no notify_url".to_string()))?;
        let return_url = invoice
            .return_url
            .clone()
            .ok_or_else(|| UpayError::Config("v2board order has no return_url".to_string()))?;

        Ok(OrderRequest::new(
            invoice.id.clone(),
            invoice.amount,
            invoice
                .payment_type
                .clone()
                .unwrap_or_else(|| self.gateway.payment_type.clone()),
            notify_url,
            return_url,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> V2boardAdapter {
        let config: V2boardConfig = serde_json::from_str(
            r#"{"upaypro_url": "https://pay.example.com", "secret_key": "k1", "type": "USDT-BSC"}"#,
        )
        .unwrap();
        V2boardAdapter::new(&config)
    }

    #[test]
    fn test_config_uses_pair_canonicalization() {
        let adapter = adapter();
        assert_eq!(adapter.canonicalization(), Canonicalization::SortByKeyValuePair);
        assert_eq!(
            adapter.gateway().canonicalization,
            Canonicalization::SortByKeyValuePair
        );
    }

    #[test]
    fn test_order_conversion_from_cents() {
        let invoice: Invoice = V2boardOrder {
            trade_no: "2024010112345".to_string(),
            total_amount: 1050,
            notify_url: "https://panel.example.com/api/v1/guest/payment/notify/UpayPro/abc".to_string(),
            return_url: "https://panel.example.com/#/order/2024010112345".to_string(),
        }
        .into();

        let order = adapter().build_order(&invoice).unwrap();
        assert_eq!(order.order_id, "2024010112345");
        assert_eq!(order.amount, 10.5);
        assert_eq!(order.payment_type.as_deref(), Some("USDT-BSC"));
        assert_eq!(order.redirect_url, "https://panel.example.com/#/order/2024010112345");
    }

    #[test]
    fn test_build_order_requires_host_urls() {
        assert!(matches!(
            adapter().build_order(&Invoice::new("1", 1.0)),
            Err(UpayError::Config(_))
        ));
    }

    #[test]
    fn test_success_literal() {
        assert_eq!(adapter().success_body(), "ok");
    }
}
