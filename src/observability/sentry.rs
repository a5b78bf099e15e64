//! Sentry error tracking.

use anyhow::{Context, Result};
use std::borrow::Cow;
use std::error::Error;
use tracing::{info, warn};

/// Settings for [`init_sentry`].
#[derive(Debug, Clone)]
pub struct SentryOptions {
    /// Sentry is left uninitialized without a DSN.
    pub dsn: Option<String>,
    pub environment: String,
    pub release: Option<String>,
    pub traces_sample_rate: f32,
}

impl SentryOptions {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            dsn: config.sentry.dsn.clone(),
            environment: config.sentry_environment().to_string(),
            release: Some(config.app.version.clone()),
            traces_sample_rate: config.sentry.traces_sample_rate,
        }
    }
}

/// Initialize the Sentry client.
///
/// Returns `Ok(None)` when no DSN is configured. The returned guard must be
/// kept alive for as long as events should be delivered.
pub fn init_sentry(options: SentryOptions) -> Result<Option<sentry::ClientInitGuard>> {
    let Some(raw_dsn) = options.dsn.filter(|d| !d.trim().is_empty()) else {
        warn!("Sentry DSN not provided. Sentry will not be initialized.");
        return Ok(None);
    };

    let dsn: sentry::types::Dsn = raw_dsn
        .trim()
        .parse()
        .context("Invalid Sentry DSN")?;

    let guard = sentry::init(sentry::ClientOptions {
        dsn: Some(dsn),
        environment: Some(Cow::Owned(options.environment.clone())),
        release: options.release.map(Cow::Owned),
        traces_sample_rate: options.traces_sample_rate,
        send_default_pii: false,
        attach_stacktrace: true,
        ..Default::default()
    });

    info!("Sentry initialized for environment: {}", options.environment);
    Ok(Some(guard))
}

/// Send an error to Sentry. A no-op when Sentry is not initialized.
pub fn capture_error<E: Error + ?Sized>(error: &E) {
    sentry::capture_error(error);
}

/// Send a message to Sentry at the given level.
pub fn capture_message(message: &str, level: sentry::Level) {
    sentry::capture_message(message, level);
}
