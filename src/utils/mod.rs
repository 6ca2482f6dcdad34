use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INIT: Once = Once::new();

/// Directive used when neither `RUST_LOG` nor the config names one.
pub const DEFAULT_LOG_FILTER: &str = "tally=info";

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` wins over `directives`. Only the first call has any effect.
pub fn init_tracing(directives: &str) {
    TRACING_INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

        // Another subscriber may already be installed by the host application.
        let _ = fmt().with_env_filter(filter).try_init();
    });
}
