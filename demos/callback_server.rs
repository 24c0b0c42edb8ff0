//! Example callback receiver using Axum.
//!
//! Serves a WHMCS-style callback endpoint backed by an in-memory invoice
//! store, plus a route that creates an order for a stored invoice.
//!
//! Run with:
//! ```bash
//! cargo run --example callback_server
//! ```
//!
//! Environment variables (a `.env` file is honored):
//! - UPAY_API_URL: Base URL of the payment API
//! - UPAY_SECRET_KEY: Shared secret
//! - UPAY_PAYMENT_TYPE: Payment type (default: USDT-TRC20)
//! - SYSTEM_URL: Public URL of this server (default: http://localhost:3000)
//! - PORT: Server port (default: 3000)

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use upay_rs::client::GatewayConfig;
use upay_rs::hosts::whmcs::{WhmcsAdapter, WhmcsConfig};
use upay_rs::hosts::{Invoice, InvoiceStore, MemoryInvoiceStore, PaymentGatewayAdapter};

const MODULE: &str = "upay_usdt_trc20";

struct AppState {
    adapter: WhmcsAdapter,
    store: MemoryInvoiceStore,
}

/// Creates an upstream order and redirects the payer to the checkout page.
async fn pay_handler(
    State(state): State<Arc<AppState>>,
    Path(invoice_id): Path<String>,
) -> Response {
    let invoice = match state.store.find_invoice(&invoice_id).await {
        Ok(Some(invoice)) => invoice,
        Ok(None) => return (StatusCode::NOT_FOUND, "Invoice not found").into_response(),
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    match state.adapter.create_order(&invoice).await {
        Ok(redirect) => Redirect::to(redirect.url()).into_response(),
        Err(e) => (StatusCode::BAD_GATEWAY, e.user_message()).into_response(),
    }
}

/// Receives the upstream's payment callback.
async fn callback_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let reply = state
        .adapter
        .handle_callback(&body, content_type, &state.store)
        .await;

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_REQUEST);
    (status, reply.body).into_response()
}

/// Shows what has been credited to an invoice.
async fn invoice_handler(
    State(state): State<Arc<AppState>>,
    Path(invoice_id): Path<String>,
) -> impl IntoResponse {
    let credits: Vec<_> = state
        .store
        .credits_for(&invoice_id)
        .await
        .into_iter()
        .map(|c| {
            json!({
                "txn_id": c.txn_id,
                "amount": c.amount,
                "credited_at": c.credited_at.to_rfc3339(),
            })
        })
        .collect();

    Json(json!({
        "invoice_id": invoice_id,
        "amount_paid": state.store.amount_paid(&invoice_id).await,
        "credits": credits,
    }))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({"status": "healthy"}))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let gateway = GatewayConfig::from_env()?;
    let system_url =
        std::env::var("SYSTEM_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()?;

    let config = WhmcsConfig {
        api_url: gateway.api_url.clone(),
        api_key: gateway.secret_key.clone(),
        payment_type: gateway.payment_type.clone(),
    };
    let adapter = WhmcsAdapter::new(MODULE, system_url, &config).with_gateway(gateway);

    let store = MemoryInvoiceStore::new();
    store.insert(Invoice::new("1", 10.0)).await;
    store.insert(Invoice::new("2", 25.5)).await;

    let callback_path = format!("/modules/gateways/callback/{}.php", MODULE);
    println!("🔧 UPAY callback server");
    println!("   Notify URL: {}", adapter.notify_url());

    let state = Arc::new(AppState { adapter, store });
    let app = Router::new()
        .route("/pay/:invoice_id", get(pay_handler))
        .route("/invoices/:invoice_id", get(invoice_handler))
        .route(&callback_path, post(callback_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("✅ Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET    http://localhost:{}/pay/1", port);
    println!("  GET    http://localhost:{}/invoices/1", port);
    println!("  POST   http://localhost:{}{}", port, callback_path);
    println!();

    axum::serve(listener, app).await?;

    Ok(())
}
