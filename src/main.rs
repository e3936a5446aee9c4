use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use slotbook::config::{self, AppConfig};
use slotbook::engine::{BookingStore, Engine};
use slotbook::http;
use slotbook::notify::NotifyHub;
use slotbook::ratelimit::RateLimiter;
use slotbook::sweeper;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cfg = AppConfig::from_env();
    slotbook::observability::init(cfg.metrics_port);

    let store = BookingStore::new();
    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(store, notify, cfg.schedule.clone()));

    if let Some(seed) = &cfg.seed_path {
        let loaded = config::load_seed(Path::new(seed), &engine).await?;
        info!("seeded {loaded} consultants from {seed}");
    }

    let limiter = Arc::new(RateLimiter::new(cfg.rate.clone()));
    tokio::spawn(sweeper::run_sweeper(limiter.clone()));

    let schedule = engine.schedule();
    let addr = format!("{}:{}", cfg.bind, cfg.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("slotbook listening on {addr}");
    info!(
        "  slots: {}min + {}min buffer, bookable {} days ahead",
        schedule.slot_minutes, schedule.buffer_minutes, schedule.max_advance_days
    );
    info!(
        "  rate limits: {}/min read, {}/min write ({}s window)",
        cfg.rate.read_limit, cfg.rate.write_limit, cfg.rate.window_secs
    );
    info!(
        "  metrics: {}",
        cfg.metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let app = http::router(engine, limiter, cfg.proxy_header.clone());
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("slotbook stopped");
    Ok(())
}

/// Resolve on SIGTERM or ctrl-c so in-flight requests drain before exit.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
