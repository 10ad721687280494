use std::{sync::Arc, time::Duration};

use anyhow::Result;
use bookbazaar_orderservice::{
    api::RazorpayGateway,
    app_state::AppState,
    bootstrap,
    cart::CartStore,
    checkout::Checkout,
    config, db,
    ledger::PgOrderLedger,
    routes,
};
use diesel_migrations::{EmbeddedMigrations, embed_migrations};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

const CART_SWEEP_PERIOD: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let config = config::load()?;

    tracing::info!("Running migrations...");
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    tracing::info!("Bootstrapping...");
    let pool = db::connect(&config.database.url).await?;
    let carts = CartStore::with_idle_ttl(Duration::from_secs(config.cart.idle_ttl_secs));
    let _sweeper = carts.spawn_sweeper(CART_SWEEP_PERIOD);
    let checkout = Checkout::new(
        carts,
        Arc::new(PgOrderLedger::new(pool)),
        Arc::new(RazorpayGateway::new(&config.gateway)?),
        config.gateway.currency.clone(),
    );

    let app = routes::app(AppState::new(checkout));
    bootstrap::serve("OrderService", app, config.server.port).await
}
