//! Depth feed handler binary
//!
//! Wires the feed session, the shared book and the HTTP surface together
//! and runs until interrupted.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use twentydepth_feed::book::DepthBook;
use twentydepth_feed::config::Config;
use twentydepth_feed::metrics::Metrics;
use twentydepth_feed::websocket::ConnectionManager;
use twentydepth_feed::{http, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("starting twentydepth feed handler");

    // Load configuration
    let config = Arc::new(Config::load()?);
    info!(
        feed_endpoint = %config.feed_endpoint,
        exchange_segment = %config.exchange_segment,
        security_id = %config.security_id,
        "configuration loaded"
    );

    let metrics = Arc::new(Metrics::new()?);
    let book = Arc::new(RwLock::new(DepthBook::new()));

    let (manager, session, depth_rx) =
        ConnectionManager::new(config.clone(), book.clone(), metrics.clone());

    let state = Arc::new(AppState {
        book,
        metrics,
        config: config.clone(),
        session: session.clone(),
    });

    // Health/depth/metrics HTTP surface
    let http_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = http::serve(http_state).await {
            warn!(error = %e, "http server error");
        }
    });

    // Periodic depth status summary for the logs
    let status_interval = Duration::from_secs(config.status_interval_secs);
    let status_rx = depth_rx;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(status_interval);
        loop {
            ticker.tick().await;
            let snapshot = status_rx.borrow().clone();
            if snapshot.bids.is_empty() && snapshot.offers.is_empty() {
                continue;
            }
            info!(
                bid_levels = snapshot.bids.len(),
                offer_levels = snapshot.offers.len(),
                total_bid_quantity = snapshot.total_bid_quantity(),
                total_offer_quantity = snapshot.total_offer_quantity(),
                best_bid = ?snapshot.best_bid(),
                best_offer = ?snapshot.best_offer(),
                "depth status"
            );
        }
    });

    // Run the feed session until interrupted
    let session_task = tokio::spawn(manager.run());

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    session.disconnect().await;
    session_task.await??;

    Ok(())
}
