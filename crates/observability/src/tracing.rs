//! Tracing/logging initialization.
//!
//! Filtering follows `RUST_LOG` (default `info`). Output is JSON lines unless
//! `LOTLEDGER_LOG_FORMAT=pretty` asks for human-readable text.

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_VAR: &str = "LOTLEDGER_LOG_FORMAT";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" | "text" => Some(Self::Pretty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservabilityConfig {
    pub format: LogFormat,
    /// A format value that was not understood; reported once logging is up.
    pub unrecognised_format: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(LOG_FORMAT_VAR).ok())
    }

    pub fn from_value(value: Option<String>) -> Self {
        match value {
            None => Self::default(),
            Some(raw) => match LogFormat::parse(&raw) {
                Some(format) => Self {
                    format,
                    unrecognised_format: None,
                },
                None => Self {
                    format: LogFormat::default(),
                    unrecognised_format: Some(raw),
                },
            },
        }
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
            .with_target(false)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .with_target(false)
            .try_init(),
    };

    if installed.is_ok() {
        if let Some(raw) = &config.unrecognised_format {
            ::tracing::warn!(var = LOG_FORMAT_VAR, value = %raw, "unknown log format; using json");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_json() {
        assert_eq!(ObservabilityConfig::from_value(None).format, LogFormat::Json);
    }

    #[test]
    fn reads_pretty_and_keeps_unknown_values() {
        let pretty = ObservabilityConfig::from_value(Some(" Pretty ".into()));
        assert_eq!(pretty.format, LogFormat::Pretty);
        assert_eq!(pretty.unrecognised_format, None);

        let odd = ObservabilityConfig::from_value(Some("xml".into()));
        assert_eq!(odd.format, LogFormat::Json);
        assert_eq!(odd.unrecognised_format.as_deref(), Some("xml"));
    }

    #[test]
    fn init_twice_is_harmless() {
        let config = ObservabilityConfig::default();
        init(&config);
        init(&config);
    }
}
