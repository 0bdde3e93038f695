//! Failure policies attached to a client.

use std::collections::BTreeSet;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use crate::error::RequestError;

/// Async callback that consumes failed statuses instead of propagating them.
pub type ErrorHandler = Arc<dyn Fn(RequestError) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wraps an async closure into an [`ErrorHandler`].
pub fn error_handler<F, Fut>(handler: F) -> ErrorHandler
where
    F: Fn(RequestError) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |error| handler(error).boxed())
}

/// When a failed status should also close the client's session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CloseOnError {
    #[default]
    Never,
    Always,
    /// Close only for these status codes.
    Statuses(BTreeSet<u16>),
}

impl CloseOnError {
    pub fn applies_to(&self, status: u16) -> bool {
        match self {
            CloseOnError::Never => false,
            CloseOnError::Always => true,
            CloseOnError::Statuses(statuses) => statuses.contains(&status),
        }
    }
}

impl From<bool> for CloseOnError {
    fn from(always: bool) -> Self {
        if always {
            CloseOnError::Always
        } else {
            CloseOnError::Never
        }
    }
}

impl FromIterator<u16> for CloseOnError {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        CloseOnError::Statuses(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[u16; N]> for CloseOnError {
    fn from(statuses: [u16; N]) -> Self {
        statuses.into_iter().collect()
    }
}

impl From<Vec<u16>> for CloseOnError {
    fn from(statuses: Vec<u16>) -> Self {
        statuses.into_iter().collect()
    }
}

impl FromStr for CloseOnError {
    type Err = anyhow::Error;

    /// Accepts `true`, `false` or a comma-separated list of status codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("true") {
            return Ok(CloseOnError::Always);
        }
        if s.eq_ignore_ascii_case("false") || s.is_empty() {
            return Ok(CloseOnError::Never);
        }

        s.split(',')
            .map(|code| {
                let code = code.trim();
                code.parse::<u16>()
                    .with_context(|| format!("Invalid status code: {:?}", code))
                    .and_then(|status| {
                        if (100..=599).contains(&status) {
                            Ok(status)
                        } else {
                            Err(anyhow!("Status code out of range: {}", status))
                        }
                    })
            })
            .collect()
    }
}
