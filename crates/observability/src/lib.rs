//! Tracing and logging (shared setup).

/// Initialize process-wide tracing/logging, format taken from `LOG_FORMAT`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Tracing configuration (filters, layers).
pub mod tracing;
