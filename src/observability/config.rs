//! Logging Configuration
//!
//! All settings come from environment variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | RUST_LOG | info | `EnvFilter` directives |
//! | LOG_FORMAT | text | `text` or `json` |
//! | LOG_TARGET | true | include the module path in each line |

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Logging configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `info,shard_translog::translog=debug`
    pub filter: String,
    pub format: LogFormat,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: "info".to_string(),
            format: LogFormat::Text,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = LoggingConfig::default();
        LoggingConfig {
            filter: lookup("RUST_LOG")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.filter),
            format: match lookup("LOG_FORMAT").as_deref().map(str::trim) {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            with_target: lookup("LOG_TARGET")
                .map(|v| !(v == "false" || v == "0"))
                .unwrap_or(defaults.with_target),
        }
    }

    /// Quiet setup for tests: warnings only
    pub fn test() -> Self {
        LoggingConfig {
            filter: "warn".to_string(),
            ..Default::default()
        }
    }
}
