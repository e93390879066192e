use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::fs;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use trackit::rate_limit::{QuotaLimiter, RateLimiter};
use trackit::{router, AppState, Config, Tracker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env();
    fs::create_dir_all(&config.data_dir).await?;
    info!("using data directory {}", config.data_dir.display());

    let limiter: Arc<dyn RateLimiter> = Arc::new(QuotaLimiter::new(
        config.rate_limit_max,
        config.rate_limit_window,
    ));
    tokio::spawn(evict_idle_identities(
        Arc::clone(&limiter),
        config.rate_limit_window.max(Duration::from_secs(1)),
    ));
    let state = AppState::new(Tracker::open(&config.data_dir), limiter);
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn evict_idle_identities(limiter: Arc<dyn RateLimiter>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        limiter.evict_stale();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
