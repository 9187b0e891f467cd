use std::sync::Arc;

use bucket_ranger::config::{AppState, Config};
use bucket_ranger::logger::Logger;
use bucket_ranger::server::{self, SignalHandler};
use bucket_ranger::storage;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional first argument: config file path without extension
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let cfg = Config::load_from(&config_path)?;

    // Create Tokio runtime, sized by the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let logger = Arc::new(Logger::from_config(&cfg.logging)?);
    let addr = cfg.get_socket_addr()?;

    let store = storage::open_store(&cfg.storage)
        .await
        .inspect_err(|e| logger.error(&format!("Cannot open storage: {e}")))?;

    let listener = server::create_reusable_listener(addr)?;
    let local_addr = listener.local_addr()?;
    logger.server_start(&local_addr, &cfg);

    let signals = Arc::new(SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals), Arc::clone(&logger))?;

    let state = Arc::new(AppState::new(cfg, store, logger));
    server::start_server_loop(listener, state, signals).await?;
    Ok(())
}
