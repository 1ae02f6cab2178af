use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,strata=debug";

/// Initialize the global tracing subscriber with an env-filter.
///
/// Respects `RUST_LOG` and falls back to [`DEFAULT_FILTER`]. Does nothing
/// if a global subscriber is already installed, so tests may call it
/// repeatedly.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
        tracing::debug!("subscriber installed");
    }
}
