//! Tracing and logging setup shared by the binaries.

/// Tracing subscriber configuration and installation.
pub mod tracing;

pub use self::tracing::{LOG_FORMAT_VAR, LogFormat, ObservabilityConfig};

/// Initialize process-wide tracing from `config`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(config: &ObservabilityConfig) {
    self::tracing::init(config);
}
