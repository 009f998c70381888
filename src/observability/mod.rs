//! Observability
//!
//! Structured logging through `tracing`. Libraries only emit events; binaries
//! call `init_tracing` once at startup.

pub mod config;

pub use config::{LogFormat, LoggingConfig};

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// Returns an error if a subscriber is already installed or the filter
/// directives do not parse.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_new(&config.filter)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_filter() {
        let config = LoggingConfig {
            filter: "[[not a directive".to_string(),
            ..LoggingConfig::test()
        };
        assert!(init_tracing(&config).is_err());
    }
}
