use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use scopehttpd::config::{AppState, Settings, DEFAULT_SETTINGS_PATH};
use scopehttpd::server::{self, SignalHandler};
use scopehttpd::{logger, standard_pipeline};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string());
    let settings = Settings::load_from(&settings_path)?;

    // Worker count comes from settings, default is one per CPU core
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = settings.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(settings))
}

async fn async_main(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    logger::init(&settings)?;

    let pipeline = standard_pipeline(&settings);
    let startup = match pipeline.parser().parse_file(&settings.directive_file()) {
        Ok(startup) => startup,
        Err(e) => {
            logger::log_error(&e.to_string());
            return Err(e.into());
        }
    };
    if let Some(level) = startup.log_level {
        logger::set_level(level);
    }

    let addr = settings.get_socket_addr()?;
    let listener = server::create_reusable_listener(addr)?;
    logger::log_server_start(&addr, &settings, &startup);

    let state = Arc::new(AppState::new(settings, startup, pipeline));
    let signals = Arc::new(SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals))?;

    server::start_server_loop(listener, state, Arc::new(AtomicUsize::new(0)), signals).await
}
