//! Billing host adapters.
//!
//! Each supported host (WHMCS, v2board, epay, mofang) gets a thin adapter that
//! knows the host's config schema, how it names orders, where callbacks land
//! and what literal the upstream expects back. Signing, order submission and
//! callback verification are shared and live in [`crate::signing`],
//! [`crate::client`] and [`crate::callback`].

pub mod epay;
pub mod mofang;
pub mod store;
pub mod v2board;
pub mod whmcs;

pub use store::{Credit, CreditOutcome, InvoiceStore, MemoryInvoiceStore};

use crate::callback::verify_callback_with;
use crate::client::{create_order, GatewayConfig};
use crate::errors::{Result, UpayError};
use crate::signing::Canonicalization;
use crate::types::{CreatedOrder, OrderRequest, VerifiedPayment, SIGNED_CALLBACK_FIELDS};
use async_trait::async_trait;
use tracing::{error, info, warn};

/// An invoice as the host hands it to an adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    /// Host invoice id or trade number
    pub id: String,

    /// Amount due, in the invoice currency
    pub amount: f64,

    /// Payment type chosen for this invoice, overriding the gateway default
    pub payment_type: Option<String>,

    /// Callback URL supplied by the host, if it builds its own
    pub notify_url: Option<String>,

    /// Page the payer returns to, if the host supplies one
    pub return_url: Option<String>,
}

impl Invoice {
    /// Creates an invoice with a decimal amount.
    pub fn new(id: impl Into<String>, amount: f64) -> Self {
        Self {
            id: id.into(),
            amount,
            payment_type: None,
            notify_url: None,
            return_url: None,
        }
    }

    /// Sets the payment type for this invoice.
    pub fn with_payment_type(mut self, payment_type: impl Into<String>) -> Self {
        self.payment_type = Some(payment_type.into());
        self
    }

    /// Sets the callback URL.
    pub fn with_notify_url(mut self, url: impl Into<String>) -> Self {
        self.notify_url = Some(url.into());
        self
    }

    /// Sets the return URL.
    pub fn with_return_url(mut self, url: impl Into<String>) -> Self {
        self.return_url = Some(url.into());
        self
    }
}

/// Where to send the payer after an order was created.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRedirect {
    /// Order id that was submitted upstream
    pub order_id: String,

    /// The upstream's answer
    pub order: CreatedOrder,
}

impl PaymentRedirect {
    /// Checkout page URL.
    pub fn url(&self) -> &str {
        &self.order.payment_url
    }
}

/// Plain-text HTTP reply to a payment callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackReply {
    /// HTTP status code
    pub status: u16,

    /// Response body
    pub body: &'static str,
}

impl CallbackReply {
    /// Acknowledges the callback with the host's literal.
    pub fn accept(body: &'static str) -> Self {
        Self { status: 200, body }
    }

    /// Rejects the callback so the upstream re-delivers it.
    pub fn reject() -> Self {
        Self {
            status: 400,
            body: "fail",
        }
    }

    /// Returns true for an acknowledgement.
    pub fn is_accepted(&self) -> bool {
        self.status == 200
    }
}

/// Result of handling an authentic, paid callback.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// The invoice was credited
    Credited(VerifiedPayment),

    /// The transaction id had already been credited
    Duplicate(VerifiedPayment),
}

/// A billing host integration.
///
/// Implementors supply the host-specific pieces; order creation and callback
/// handling are provided on top of them.
#[async_trait]
pub trait PaymentGatewayAdapter: Send + Sync {
    /// Host name used in logs (e.g., "whmcs").
    fn name(&self) -> &str;

    /// Gateway configuration of this installation.
    fn gateway(&self) -> &GatewayConfig;

    /// Body returned to the upstream when a callback is accepted.
    fn success_body(&self) -> &'static str {
        "ok"
    }

    /// Canonicalization the upstream of this host expects.
    fn canonicalization(&self) -> Canonicalization {
        self.gateway().canonicalization
    }

    /// Callback fields covered by the signature, or `None` to sign every
    /// received field except `signature`.
    fn signed_callback_fields(&self) -> Option<&'static [&'static str]> {
        Some(SIGNED_CALLBACK_FIELDS)
    }

    /// Builds the upstream order for a host invoice.
    fn build_order(&self, invoice: &Invoice) -> Result<OrderRequest>;

    /// Maps a callback `order_id` back to the host invoice id.
    fn invoice_id(&self, order_id: &str) -> Result<String> {
        Ok(order_id.to_string())
    }

    /// Amount to credit for a verified payment.
    fn credit_amount(&self, payment: &VerifiedPayment) -> Result<f64> {
        parse_amount(&payment.credit_amount)
    }

    /// Creates an upstream order for `invoice`.
    async fn create_order(&self, invoice: &Invoice) -> Result<PaymentRedirect> {
        let order = self.build_order(invoice)?;
        let mut gateway = self.gateway().clone();
        gateway.canonicalization = self.canonicalization();

        let created = create_order(&gateway, &order).await.map_err(|e| {
            warn!(host = self.name(), invoice_id = %invoice.id, error = %e, "Order creation failed");
            e
        })?;

        Ok(PaymentRedirect {
            order_id: order.order_id,
            order: created,
        })
    }

    /// Verifies a callback and credits the invoice.
    async fn process_callback(
        &self,
        body: &[u8],
        content_type: Option<&str>,
        store: &dyn InvoiceStore,
    ) -> Result<CallbackOutcome> {
        let payment = verify_callback_with(
            body,
            content_type,
            &self.gateway().secret_key,
            self.canonicalization(),
            self.signed_callback_fields(),
        )?;

        let invoice_id = self.invoice_id(&payment.invoice_ref)?;
        if store.find_invoice(&invoice_id).await?.is_none() {
            return Err(UpayError::InvoiceNotFound(invoice_id));
        }

        let amount = self.credit_amount(&payment)?;
        match store
            .credit_invoice(&invoice_id, amount, &payment.external_txn_id)
            .await?
        {
            CreditOutcome::Credited => {
                info!(
                    host = self.name(),
                    invoice_id = %invoice_id,
                    trade_id = %payment.external_txn_id,
                    amount,
                    "Invoice credited"
                );
                Ok(CallbackOutcome::Credited(payment))
            }
            CreditOutcome::AlreadyCredited => {
                info!(
                    host = self.name(),
                    invoice_id = %invoice_id,
                    trade_id = %payment.external_txn_id,
                    "Transaction already credited"
                );
                Ok(CallbackOutcome::Duplicate(payment))
            }
        }
    }

    /// Handles a callback end to end and returns the reply for the upstream.
    async fn handle_callback(
        &self,
        body: &[u8],
        content_type: Option<&str>,
        store: &dyn InvoiceStore,
    ) -> CallbackReply {
        match self.process_callback(body, content_type, store).await {
            Ok(_) => CallbackReply::accept(self.success_body()),
            Err(e) if e.is_rejection() => {
                warn!(host = self.name(), error = %e, "Callback rejected");
                CallbackReply::reject()
            }
            Err(e) => {
                error!(host = self.name(), error = %e, "Callback could not be processed");
                CallbackReply::reject()
            }
        }
    }
}

/// Parses a decimal amount received in a callback.
pub fn parse_amount(text: &str) -> Result<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
        .ok_or_else(|| UpayError::MalformedPayload(format!("Invalid amount '{}'", text)))
}

/// Joins a base URL and a path with exactly one `/` between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_builders() {
        let invoice = Invoice::new("42", 9.99)
            .with_payment_type("TRX")
            .with_notify_url("https://x/n")
            .with_return_url("https://x/r");

        assert_eq!(invoice.id, "42");
        assert_eq!(invoice.payment_type.as_deref(), Some("TRX"));
        assert_eq!(invoice.notify_url.as_deref(), Some("https://x/n"));
        assert_eq!(invoice.return_url.as_deref(), Some("https://x/r"));
    }

    #[test]
    fn test_callback_replies() {
        assert_eq!(CallbackReply::accept("success").body, "success");
        assert!(CallbackReply::accept("ok").is_accepted());

        let reject = CallbackReply::reject();
        assert_eq!(reject.status, 400);
        assert_eq!(reject.body, "fail");
        assert!(!reject.is_accepted());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("10.5").unwrap(), 10.5);
        assert_eq!(parse_amount(" 100 ").unwrap(), 100.0);
        assert!(parse_amount("").is_err());
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("inf").is_err());
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://a.com/", "/b/c"), "https://a.com/b/c");
        assert_eq!(join_url("https://a.com", "b"), "https://a.com/b");
    }
}
