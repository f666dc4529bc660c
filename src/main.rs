use anyhow::Context;
use clap::Parser;
use module_db::core::ConfigProvider;
use module_db::utils::{logger, validation::Validate};
use module_db::{router, AppState, CliConfig, LocalStorage, MemoryStore, SchemaRegistry, ServiceConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let config = match ServiceConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(2);
        }
    };

    logger::init_logger(config.verbose, config.json_logs);
    tracing::info!("Starting module-db");
    tracing::debug!("Effective config: {:?}", config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(2);
    }

    // Absolute or cwd-relative; LocalStorage joins it onto ".".
    let store = match config.snapshot_path() {
        Some(path) => MemoryStore::open(LocalStorage::new("."), path)
            .await
            .with_context(|| format!("loading snapshot {}", path))?,
        None => {
            tracing::warn!("No snapshot path configured, data lives in memory only");
            MemoryStore::new()
        }
    };

    let schemas = SchemaRegistry::embedded().context("compiling embedded schemas")?;
    let state = Arc::new(AppState::new(
        Arc::new(store),
        schemas,
        config.link_attempts(),
    ));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("binding {}", config.bind_address()))?;
    tracing::info!("🚀 Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("👋 module-db stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
