use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the env filter from `RUST_LOG`, falling back to `default_level`.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialise structured JSON logging on stdout.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_telemetry() {
    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .json();

    let _ = tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(formatting_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_telemetry();
        init_telemetry();
        tracing::info!("telemetry initialised twice without panicking");
    }

    #[test]
    fn test_env_filter_fallback() {
        let filter = env_filter("debug");
        assert!(!filter.to_string().is_empty());
    }
}
