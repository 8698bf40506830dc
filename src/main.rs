#![allow(dead_code)]

mod checks;
mod driver;
mod engine;
mod error;
mod monitor_config;
mod notify;
mod rate_limiters;
mod registry;
mod storage;
mod sweep;
mod types;
mod util;

use std::sync::Arc;

use mimalloc::MiMalloc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use checks::{CertificateChecker, Checker, ReachabilityChecker, RegistrationChecker};
use driver::MonitorDriver;
use engine::TransitionEngine;
use monitor_config::MonitorConfig;
use notify::LogNotifier;
use rate_limiters::RateLimiters;
use registry::TargetRegistry;
use storage::JsonFileStore;
use sweep::SweepCoordinator;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // reqwest and the certificate checker share one rustls backend; pin it
    // before any ClientConfig is built.
    tokio_rustls::rustls::crypto::ring::default_provider()
        .install_default()
        .expect("failed to install TLS crypto provider");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let config = MonitorConfig::load()?;
    tracing::info!(?config, "Configuration loaded");

    let registry = Arc::new(TargetRegistry::new(Box::new(JsonFileStore::new(
        &config.store_path,
    )))?);
    tracing::info!(targets = registry.len(), "Target registry loaded");

    let limiters = RateLimiters::new(config.whois_queries_per_minute);
    let checkers: Vec<Arc<dyn Checker>> = vec![
        Arc::new(ReachabilityChecker::new()?),
        Arc::new(CertificateChecker::new(config.cert_expiry_threshold_days)),
        Arc::new(RegistrationChecker::new(
            config.registration_expiry_threshold_days,
            limiters,
        )),
    ];

    let sweeper = SweepCoordinator::new(
        checkers,
        config.check_timeout(),
        config.max_concurrent_checks,
    );
    let engine = Arc::new(TransitionEngine::new(
        registry.clone(),
        Arc::new(LogNotifier),
    ));
    let driver = MonitorDriver::new(registry, sweeper, engine, config.sweep_interval());

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    driver.run(shutdown).await;
    tracing::info!("domainwatch stopped");

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }

    shutdown.cancel();
}
