//! Logging, error tracking and health reporting.

pub mod health;
pub mod sentry;

pub use health::{HealthCheck, HealthStatus};
pub use self::sentry::{capture_error, capture_message, init_sentry, SentryOptions};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_level`. Events are also forwarded to Sentry,
/// which ignores them until a client is bound.
pub fn init_logging(default_level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(sentry_tracing::layer())
        .try_init()
        .expect("Failed to set tracing subscriber");
}
