//! Buidlland dApp backend entry point.
//!
//! Serves the crowdfunding and task-bounty pages as JSON, backed either by
//! the built-in fixture ledger (`DATA_SOURCE=demo`) or by a Move ledger node
//! and a wallet-adapter bridge (`DATA_SOURCE=live`).

mod address;
mod amount;
mod api;
mod cache;
mod config;
mod entry;
mod errors;
mod fixtures;
mod ledger;
mod model;
mod present;
mod service;
mod tx;
mod view;
mod wallet;

use std::sync::Arc;

use chrono::Utc;
use reqwest::Client;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{Config, DataSource};
use fixtures::FixtureLedger;
use ledger::{HttpLedger, Ledger};
use service::Dapp;
use wallet::{BridgeWallet, DemoWallet, Wallet};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    match config.data_source {
        DataSource::Demo => {
            info!("Serving fixture data (v{})", fixtures::FIXTURE_VERSION);
            let ledger = Arc::new(FixtureLedger::new(config.module.clone(), Utc::now()));
            if config.demo_stall_confirmations {
                warn!("Fixture confirmations are stalled; every action will time out");
                ledger.stall_confirmations(true);
            }
            let wallet = Arc::new(DemoWallet::new());
            if config.demo_decline_signatures {
                warn!("Demo wallet will decline every signature request");
                wallet.set_declining(true);
            }
            serve(&config, ledger, wallet, "demo").await
        }
        DataSource::Live => {
            // One HTTP client for the node and the wallet bridge.
            let client = Client::builder()
                .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
                .build()?;
            info!(
                "Using ledger node {} and module {}::{}",
                config.node_url, config.module.address, config.module.module
            );
            let ledger = Arc::new(HttpLedger::new(client.clone(), &config.node_url));
            let wallet = Arc::new(BridgeWallet::new(client, &config.wallet_url));
            serve(&config, ledger, wallet, "live").await
        }
    }
}

async fn serve<L: Ledger, W: Wallet>(
    config: &Config,
    ledger: Arc<L>,
    wallet: Arc<W>,
    data_source: &'static str,
) -> anyhow::Result<()> {
    let dapp = Dapp::bootstrap(ledger, wallet, config.module.clone(), config.dapp_settings())
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let shutdown = dapp.shutdown_token();

    let app = api::router(Arc::new(api::ApiState { dapp, data_source }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down; abandoning pending confirmations");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
