/// Tradepost - storefront backend
///
/// A small e-commerce API: OTP-verified accounts, product catalog,
/// order placement with stock management, and Stripe checkout.
mod api;
mod auth;
mod catalog;
mod config;
mod context;
mod db;
mod error;
mod inventory;
mod mailer;
mod orders;
mod otp;
mod payments;
mod server;
mod users;

use config::AppConfig;
use context::AppContext;
use error::ApiResult;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ApiResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradepost=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::from_env()?;

    // Create application context
    let ctx = AppContext::new(config).await?;

    // Start server
    server::serve(ctx).await?;

    Ok(())
}
