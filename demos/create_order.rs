//! Example order creation.
//!
//! Signs an order, submits it to the configured UPAY API and prints the
//! checkout URL the payer should be redirected to.
//!
//! Run with:
//! ```bash
//! cargo run --example create_order -- 1001 10.5
//! ```
//!
//! Environment variables (a `.env` file is honored):
//! - UPAY_API_URL: Base URL of the payment API
//! - UPAY_SECRET_KEY: Shared secret
//! - UPAY_PAYMENT_TYPE: Payment type (default: USDT-TRC20)
//! - UPAY_TIMEOUT_SECS: Request timeout in seconds (default: 30)
//! - SHOP_URL: Public URL of the shop (default: http://localhost:3000)

use anyhow::Context;
use upay_rs::client::{create_order, GatewayConfig};
use upay_rs::signing::{sign_order, SignableParams};
use upay_rs::types::is_supported_payment_type;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let order_id = args.next().unwrap_or_else(|| "1001".to_string());
    let amount: f64 = args
        .next()
        .unwrap_or_else(|| "10.5".to_string())
        .parse()
        .context("amount must be a number")?;

    let config = GatewayConfig::from_env().context("loading gateway configuration")?;
    if !is_supported_payment_type(&config.payment_type) {
        println!("⚠️  Payment type {} is not in the known list", config.payment_type);
    }

    let shop_url = std::env::var("SHOP_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let order = config.order(
        order_id,
        amount,
        format!("{}/notify", shop_url),
        format!("{}/orders/return", shop_url),
    );

    println!("🧾 UPAY order");
    println!("   API:       {}", config.create_order_url()?);
    println!("   Order:     {}", order.order_id);
    println!("   Amount:    {}", order.amount_text());
    println!("   Type:      {}", order.payment_type.as_deref().unwrap_or("-"));
    println!(
        "   Signature: {}",
        sign_order(&order, &config.secret_key, config.canonicalization)
    );
    println!(
        "   Signed:    {} fields",
        SignableParams::from(&order).len()
    );
    println!();

    match create_order(&config, &order).await {
        Ok(created) => {
            println!("✅ Order created");
            println!("   Pay at: {}", created.payment_url);
            if let (Some(amount), Some(token)) = (created.actual_amount, created.token.as_deref()) {
                println!("   Send {} to {}", amount, token);
            }
        }
        Err(e) => {
            println!("❌ {}", e.user_message());
            return Err(e.into());
        }
    }

    Ok(())
}
