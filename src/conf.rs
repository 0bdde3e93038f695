//! Logging setup and environment-based client configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::client::{ClientBuilder, CloseOnError};
use crate::http::ReqwestConnector;

/// Environment variable holding the `env_logger` filter, e.g. `spacs=debug`.
pub const LOG_ENV: &str = "SPACS_LOG";
pub const BASE_URL_ENV: &str = "SPACS_BASE_URL";
pub const PATH_PREFIX_ENV: &str = "SPACS_PATH_PREFIX";
pub const CLOSE_ON_ERROR_ENV: &str = "SPACS_CLOSE_ON_ERROR";
pub const TIMEOUT_ENV: &str = "SPACS_TIMEOUT_SECS";

/// Installs `env_logger` with the filter from [`LOG_ENV`], defaulting to `warn`.
///
/// Per-request entries are emitted at debug level. Calling this more than
/// once, or after another logger was installed, has no effect.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().filter_or(LOG_ENV, "warn"))
        .try_init();
}

impl ClientBuilder {
    /// Builder preconfigured from `SPACS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builder preconfigured from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = ClientBuilder::default();

        if let Some(base_url) = lookup(BASE_URL_ENV) {
            builder = builder.base_url(base_url);
        }
        if let Some(prefix) = lookup(PATH_PREFIX_ENV) {
            builder = builder.path_prefix(prefix);
        }
        if let Some(policy) = lookup(CLOSE_ON_ERROR_ENV) {
            let policy = policy
                .parse::<CloseOnError>()
                .with_context(|| format!("Invalid {}", CLOSE_ON_ERROR_ENV))?;
            builder = builder.close_on_error(policy);
        }
        if let Some(timeout) = lookup(TIMEOUT_ENV) {
            let secs = timeout
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .with_context(|| format!("Invalid {}: {:?}", TIMEOUT_ENV, timeout))?;
            let timeout = Duration::try_from_secs_f64(secs)
                .with_context(|| format!("Invalid {}: {:?}", TIMEOUT_ENV, timeout))?;
            let connector = ReqwestConnector::new().timeout(timeout);
            builder = builder.connector(Arc::new(connector));
        }

        Ok(builder)
    }
}
