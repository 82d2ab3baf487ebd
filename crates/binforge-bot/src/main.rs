//! # `binforge-bot` HTTP server
//!
//! Answers chat commands posted to `/v1/commands`.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin binforge-bot --release
//! ```

use binforge_bot::{
    config::{BotConfig, CliArgs},
    handler::Bot,
    server::router,
    store::JsonFileStore,
    telemetry::init_telemetry,
};
use clap::Parser;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = BotConfig::try_from(args)?;

    init_telemetry(config.log_json)?;

    let store = JsonFileStore::open(&config.data_dir)?;
    let bot = Bot::new(
        Arc::new(config.throttle()),
        config.synthesizer(),
        config.resolver()?,
        Arc::new(store),
    )
    .with_batch_size(config.batch_size);
    let bot = Arc::new(bot);

    let shutdown = CancellationToken::new();
    let sweeper = bot
        .throttle()
        .spawn_sweeper(config.sweep_interval, shutdown.clone());

    let listener = TcpListener::bind(config.listen_addr).await?;
    log_startup_info(&config);

    axum::serve(listener, router(bot))
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    if let Err(e) = sweeper.await {
        tracing::error!("Throttle sweeper failed: {e}");
    }

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &BotConfig) {
    if config.bintable_api_key.is_none() {
        tracing::warn!("BINTABLE_API_KEY is not set; fallback lookups will fail");
    }

    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting command service on {} with full config: {:#?}",
            config.listen_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting command service on {} (cooldown {:?}, batch {})",
            config.listen_addr,
            config.cooldown,
            config.batch_size
        );
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
    shutdown.cancel();
}
