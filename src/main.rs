use std::sync::Arc;
use ttlkv::config::Config;
use ttlkv::engine::Engine;
use ttlkv::server::Server;
use ttlkv::service::StoreService;
use tracing::{error, info};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Parse command line args
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::from_args(&args);

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.loglevel)),
        )
        .init();

    let engine = match Engine::from_config(&config).await {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to start storage: {e}");
            std::process::exit(1);
        }
    };

    let service = Arc::new(StoreService::new(engine.store()));
    let server = Server::bind(&config, service).await?;
    let served = server.run_until_ctrl_c().await;

    // The listener is closed by now, so the final backup sees no new clients.
    info!("Shutting down...");
    if let Err(e) = engine.shutdown().await {
        error!("Final backup failed: {e}");
        std::process::exit(1);
    }
    served
}
