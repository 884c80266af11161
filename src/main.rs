use std::sync::Arc;

use ical_proxy::config;
use ical_proxy::logger;
use ical_proxy::prelude::*;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logger::init_logger();

    info!("Starting iCal Proxy");

    let config = Config::load()?;
    let ttl = config.ttl()?;
    let addr = config::bind_address()?;
    info!("Cache TTL set to {}", humantime::format_duration(ttl));
    info!("Loaded {} alias mappings", config.mappings.len());

    let registry = Arc::new(AliasRegistry::new(config.mappings));
    let cache = Arc::new(TtlCache::new(ttl));
    let fetcher = Arc::new(HttpFetcher::new());

    let server = ProxyServer::new(addr, registry, cache, fetcher);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server failed: {}", e);
                return Err(e.into());
            }
        }
        _ = wait_for_shutdown() => {}
    }

    info!("Shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
