use tracing::info;
use tracing_subscriber::EnvFilter;

pub fn init_logger() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

pub fn log_request(remote: &str, path: &str, status: u16, duration: std::time::Duration) {
    info!(
        target: "request",
        remote = %remote,
        path = %path,
        status = %status,
        duration_ms = %duration.as_millis(),
        "Request completed"
    );
}
