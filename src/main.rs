use clap::Parser;
use std::sync::Arc;

use filesend::cli::Opt;
use filesend::config::{AppState, Config, TransferConfig};
use filesend::handler::TransferEngine;
use filesend::logger::{self, AccessLog};
use filesend::server::{self, SignalHandler};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opt = Opt::parse();
    let cfg = Config::load(&opt)?;
    logger::init(&cfg.logging)?;

    // Build Tokio runtime, thread count follows the workers setting
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let transfer = TransferConfig::from_files(&cfg.files)?;

    let mut engine = TransferEngine::new(transfer);
    if let Some(access_log) = AccessLog::from_config(&cfg.logging)? {
        engine = engine.with_observer(Arc::new(access_log));
    }

    let listener = server::create_reusable_listener(addr)?;
    let local_addr = listener.local_addr()?;
    logger::log_server_start(&local_addr, &cfg, engine.config().root());

    let signals = Arc::new(SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals))?;

    let state = Arc::new(AppState::new(cfg, engine));
    server::run(listener, state, signals).await;
    Ok(())
}
