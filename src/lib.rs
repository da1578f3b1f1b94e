pub mod api;
pub mod authorization;
pub mod config;
pub mod core_state;
pub mod db;
pub mod medications;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod session;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub fn run() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build tokio runtime");
            return;
        }
    };

    runtime.block_on(serve());
}

async fn serve() {
    let core = match core_state::CoreState::from_env() {
        Ok(core) => Arc::new(core),
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialise core state");
            return;
        }
    };

    let bind_addr = config::ServerConfig::from_env().bind_addr;
    let mut server = match api::start_api_server(core.clone(), bind_addr).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start API server");
            core.shutdown();
            return;
        }
    };
    tracing::info!(addr = %server.addr(), "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }

    tracing::info!("Shutting down");
    server.shutdown();
    core.shutdown();
}
