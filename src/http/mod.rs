//! Transport seam between the pipeline and the HTTP stack.
//!
//! A [`Session`] is one open handle to the transport, bound to a base URL.
//! A [`Connector`] opens sessions; the client asks it for a new one whenever
//! the previous session was closed.

mod classify;
mod client;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::request::PreparedRequest;

pub use classify::{TransportError, classify_error};
pub use client::{ReqwestConnector, ReqwestSession};

/// Raw response as read off the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub reason: String,
    /// Value of the `Content-Type` header, if any.
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Session: Send + Sync {
    /// Sends a prepared request and reads the full response.
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError>;

    fn is_closed(&self) -> bool;

    /// Closes the session. Closing twice is a no-op.
    async fn close(&self);
}

/// Opens sessions bound to a base URL.
pub trait Connector: Send + Sync {
    fn open(&self, base_url: Option<&str>) -> Result<Arc<dyn Session>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_response_ok_range() {
        let mut raw = RawResponse {
            status: 200,
            reason: "OK".into(),
            content_type: None,
            body: Vec::new(),
        };
        assert!(raw.ok());
        raw.status = 299;
        assert!(raw.ok());
        raw.status = 300;
        assert!(!raw.ok());
        raw.status = 500;
        assert!(!raw.ok());
        raw.status = 199;
        assert!(!raw.ok());
    }
}
