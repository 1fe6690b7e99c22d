//! Process bootstrap helpers for services that publish events.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Filter used when `EVENT_API_LOG` is unset or unparseable.
const DEFAULT_LOG_FILTER: &str = "info";

/// Initialize tracing with the EVENT_API_LOG environment variable.
///
/// Defaults to "info" level if EVENT_API_LOG is not set. Leaves an already
/// installed global subscriber in place, so host applications and tests
/// may call this freely.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
