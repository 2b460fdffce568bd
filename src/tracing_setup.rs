//! Tracing initialization
//!
//! Console logging with `RUST_LOG`-style filtering. Embedders call this once
//! at startup; repeated calls are harmless.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize console tracing
///
/// Log level comes from `RUST_LOG` (default: info). Returns Ok even if a
/// global subscriber was already installed by the host application.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("tracing initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing();
        init_tracing(); // second call must not panic
    }
}
