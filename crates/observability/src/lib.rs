//! Tracing and error-reporting init for the runtimescope daemon binary.
//!
//! Respects `RUST_LOG`, defaulting to `warn`. Sentry reporting is a no-op
//! guard when `SENTRY_DSN` is unset — holding the guard keeps the client
//! alive for the process lifetime.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber. Call once at process start,
/// before spawning the transport server.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).compact().finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("global tracing subscriber already set");
    }
}

/// Initializes Sentry error reporting if `SENTRY_DSN` is set. The returned
/// guard must be held for the process lifetime; dropping it flushes
/// pending events.
pub fn init_error_reporting() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            traces_sample_rate: 0.1,
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_error_reporting_is_none_without_dsn() {
        std::env::remove_var("SENTRY_DSN");
        assert!(init_error_reporting().is_none());
    }
}
