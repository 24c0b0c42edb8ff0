//! Invoice store collaborator.
//!
//! The host owns invoices and the ledger. Adapters only look invoices up and
//! ask for a credit; the store decides whether a transaction id was already
//! applied.

use super::Invoice;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result of a credit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// The payment was applied
    Credited,
    /// A payment with the same transaction id was applied before
    AlreadyCredited,
}

/// Host invoice and ledger access.
///
/// Implementations must credit at most once per transaction id.
#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Looks up an invoice by host id.
    async fn find_invoice(&self, id: &str) -> Result<Option<Invoice>>;

    /// Applies a payment to an invoice.
    async fn credit_invoice(&self, id: &str, amount: f64, txn_id: &str) -> Result<CreditOutcome>;
}

/// A payment applied to an invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct Credit {
    /// Host invoice id
    pub invoice_id: String,
    /// Amount applied
    pub amount: f64,
    /// Upstream transaction id
    pub txn_id: String,
    /// When the credit was recorded
    pub credited_at: DateTime<Utc>,
}

/// In-memory [`InvoiceStore`] for tests and demos.
#[derive(Clone, Default)]
pub struct MemoryInvoiceStore {
    invoices: Arc<RwLock<HashMap<String, Invoice>>>,
    credits: Arc<RwLock<HashMap<String, Credit>>>,
}

impl MemoryInvoiceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an invoice.
    pub async fn insert(&self, invoice: Invoice) {
        self.invoices.write().await.insert(invoice.id.clone(), invoice);
    }

    /// All credits applied to an invoice.
    pub async fn credits_for(&self, invoice_id: &str) -> Vec<Credit> {
        self.credits
            .read()
            .await
            .values()
            .filter(|credit| credit.invoice_id == invoice_id)
            .cloned()
            .collect()
    }

    /// Total amount credited to an invoice.
    pub async fn amount_paid(&self, invoice_id: &str) -> f64 {
        self.credits_for(invoice_id)
            .await
            .iter()
            .map(|credit| credit.amount)
            .sum()
    }
}

#[async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn find_invoice(&self, id: &str) -> Result<Option<Invoice>> {
        Ok(self.invoices.read().await.get(id).cloned())
    }

    async fn credit_invoice(&self, id: &str, amount: f64, txn_id: &str) -> Result<CreditOutcome> {
        let mut credits = self.credits.write().await;
        if credits.contains_key(txn_id) {
            return Ok(CreditOutcome::AlreadyCredited);
        }

        credits.insert(
            txn_id.to_string(),
            Credit {
                invoice_id: id.to_string(),
                amount,
                txn_id: txn_id.to_string(),
                credited_at: Utc::now(),
            },
        );
        Ok(CreditOutcome::Credited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_invoice() {
        let store = MemoryInvoiceStore::new();
        store.insert(Invoice::new("1", 10.0)).await;

        assert!(store.find_invoice("1").await.unwrap().is_some());
        assert!(store.find_invoice("2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_credit_once_per_transaction() {
        let store = MemoryInvoiceStore::new();
        store.insert(Invoice::new("1", 10.0)).await;

        assert_eq!(
            store.credit_invoice("1", 10.0, "T1").await.unwrap(),
            CreditOutcome::Credited
        );
        assert_eq!(
            store.credit_invoice("1", 10.0, "T1").await.unwrap(),
            CreditOutcome::AlreadyCredited
        );
        assert_eq!(store.amount_paid("1").await, 10.0);

        assert_eq!(
            store.credit_invoice("1", 2.5, "T2").await.unwrap(),
            CreditOutcome::Credited
        );
        assert_eq!(store.amount_paid("1").await, 12.5);
        assert_eq!(store.credits_for("1").await.len(), 2);
    }
}
