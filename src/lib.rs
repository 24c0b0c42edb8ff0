//! # upay-rs
//!
//! A Rust implementation of the UPAY / EPUSDT payment signing protocol used by
//! billing hosts to accept crypto payments through a shared payment API.
//!
//! A host signs an order with a shared secret, submits it to the upstream
//! `create_order` endpoint and redirects the payer to the returned checkout
//! page. Once the payment settles, the upstream POSTs a signed callback which
//! the host verifies before crediting the invoice.
//!
//! ## Features
//!
//! - **Canonical Signer**: MD5 signatures over sorted `key=value` strings, in
//!   both canonicalization variants found in the wild
//! - **Order Submitter**: Signs and POSTs orders, mapping every failure mode to
//!   a typed error
//! - **Callback Verifier**: Parses JSON or form callbacks, checks required
//!   fields and signatures, and accepts only paid orders
//! - **Host Adapters**: WHMCS, v2board, epay and mofang integrations on top of
//!   one [`hosts::PaymentGatewayAdapter`] trait
//!
//! ## Quick Start
//!
//! ### Creating an Order
//!
//! ```rust,no_run
//! use upay_rs::client::{create_order, GatewayConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::new("https://pay.example.com", "secret", "USDT-TRC20");
//! let order = config.order(
//!     "1001",
//!     10.5,
//!     "https://shop.example.com/notify",
//!     "https://shop.example.com/return",
//! );
//!
//! let created = create_order(&config, &order).await?;
//! println!("Redirect to: {}", created.payment_url);
//! # Ok(())
//! # }
//! ```
//!
//! ### Verifying a Callback
//!
//! ```rust,no_run
//! use upay_rs::callback::verify_callback;
//! use upay_rs::signing::Canonicalization;
//!
//! # fn example(body: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let payment = verify_callback(
//!     body,
//!     Some("application/json"),
//!     "secret",
//!     Canonicalization::SortByKey,
//! )?;
//! println!("Order {} paid by {}", payment.invoice_ref, payment.external_txn_id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Signature Scheme
//!
//! 1. Drop the `signature` field
//! 2. Drop empty values and sort the remaining keys byte-wise
//! 3. Join `key=value` pairs with `&`
//! 4. Append the shared secret with no separator
//! 5. Lowercase hex MD5 of the result
//!
//! v2board and the reference server sort the rendered `key=value` strings
//! instead and keep empty values; see [`signing::Canonicalization`].
//!
//! ## Security
//!
//! - The secret key never appears in logs, errors or `Debug` output
//! - Signatures carry no timestamp or nonce; the host's
//!   [`hosts::InvoiceStore`] must credit each transaction id at most once
//! - MD5 is kept for wire compatibility with deployed upstreams

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod callback;
pub mod client;
pub mod errors;
pub mod hosts;
pub mod signing;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use callback::{verify_callback, CallbackFields};
pub use client::{create_order, create_order_url, GatewayConfig};
pub use errors::{Result, UpayError};
pub use hosts::{Invoice, InvoiceStore, MemoryInvoiceStore, PaymentGatewayAdapter};
pub use signing::{sign, sign_params, verify_signature, Canonicalization, SignableParams};
pub use types::{
    CallbackPayload, CreatedOrder, OrderRequest, PaymentStatus, VerifiedPayment,
    CREATE_ORDER_PATH,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_order_path() {
        assert_eq!(CREATE_ORDER_PATH, "/api/create_order");
    }

    #[test]
    fn test_module_accessibility() {
        // Ensure all modules are accessible
        let _ = client::GatewayConfig::new("https://pay.example.com", "key", "USDT-TRC20");
        let _ = hosts::whmcs::WhmcsConfig {
            api_url: "https://pay.example.com".to_string(),
            api_key: "key".to_string(),
            payment_type: "USDT-TRC20".to_string(),
        };
        let _ = signing::SignableParams::new();
    }

    #[test]
    fn test_root_reexports_sign() {
        let signature = sign(
            [
                ("order_id", "1001"),
                ("amount", "10.50"),
                ("type", "USDT-TRC20"),
                ("notify_url", "https://x/n"),
                ("redirect_url", "https://x/r"),
            ],
            "k1",
            Canonicalization::default(),
        );
        assert_eq!(signature, "4c0d75ac31699781c1b8f5cb78890544");
    }
}
