//! Smoke test for payment gateway credentials: creates a 1.00 remote order
//! with the configured keys and prints its reference.

use anyhow::{Context, Result};
use bookbazaar_orderservice::{
    api::{PaymentGateway, RazorpayGateway},
    bootstrap, config,
};
use tracing::{error, info};

const CHECK_AMOUNT: i64 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let config = config::load()?;
    let gateway = RazorpayGateway::new(&config.gateway)?;
    info!(
        key_id = %gateway.public_key_id(),
        base_url = %config.gateway.base_url,
        "Checking payment gateway credentials"
    );

    match gateway
        .create_remote_order(CHECK_AMOUNT, &config.gateway.currency, "gateway_check")
        .await
    {
        Ok(order) => {
            info!(gateway_order_ref = %order.id, amount = order.amount, "Gateway accepted test order");
            println!("{}", order.id);
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "Gateway check failed");
            Err(err).context("Payment gateway rejected the test order")
        }
    }
}
