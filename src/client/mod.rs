//! Session-owning HTTP client.
//!
//! A [`Client`] is a cheap, cloneable handle. All handles of one client share
//! the same session, which is opened lazily on first use and reopened after
//! it has been closed. Every live client is tracked in a process-wide
//! registry so [`Client::close_all`] can shut all sessions down at once.
//!
//! # Structure
//!
//! - `pipeline` - request normalization, dispatch and outcome classification
//! - `policy` - close-on-error policy and error handler callbacks
//! - `registry` - process-wide registry of live clients

mod pipeline;
mod policy;
mod registry;

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use serde::de::DeserializeOwned;

use crate::error::{Error, RequestError};
use crate::http::{Connector, ReqwestConnector, Session};
use crate::request::{Method, Request};
use crate::response::{Outcome, Response};

pub use policy::{CloseOnError, ErrorHandler, error_handler};

struct Shared {
    id: u64,
    base_url: Option<String>,
    path_prefix: String,
    error_handler: Option<ErrorHandler>,
    close_on_error: CloseOnError,
    connector: Arc<dyn Connector>,
    session: Mutex<Option<Arc<dyn Session>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        registry::deregister(self.id);
    }
}

/// HTTP client scoped to a base URL and path prefix.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Client without a base URL; request paths must then be absolute URLs.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::builder().base_url(base_url).build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn base_url(&self) -> Option<&str> {
        self.shared.base_url.as_deref()
    }

    pub fn path_prefix(&self) -> &str {
        &self.shared.path_prefix
    }

    pub fn close_on_error(&self) -> &CloseOnError {
        &self.shared.close_on_error
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<dyn Session>>> {
        self.shared
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the open session, opening a new one if there is none or the
    /// current one was closed.
    pub fn session(&self) -> Result<Arc<dyn Session>> {
        let mut slot = self.slot();
        if let Some(session) = slot.as_ref().filter(|s| !s.is_closed()) {
            return Ok(Arc::clone(session));
        }
        let session = self.shared.connector.open(self.base_url())?;
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    /// True if a session exists and has not been closed.
    pub fn is_open(&self) -> bool {
        self.slot().as_ref().is_some_and(|s| !s.is_closed())
    }

    /// Closes the current session. Logs a warning if there is nothing to close.
    pub async fn close(&self) {
        let session = {
            let mut slot = self.slot();
            if slot.as_ref().is_some_and(|s| !s.is_closed()) {
                slot.take()
            } else {
                None
            }
        };

        match session {
            Some(session) => session.close().await,
            None => tracing::warn!("No session to close"),
        }
    }

    /// Closes the session, if any, and releases this handle.
    ///
    /// The client leaves the registry only when its last handle is dropped.
    /// Other clones, including the one carried by a [`RequestError`], keep it
    /// registered after this returns.
    pub async fn dispose(self) {
        if self.is_open() {
            self.close().await;
        }
    }

    pub async fn get<M: DeserializeOwned>(
        &self,
        request: &Request<M>,
    ) -> Result<Outcome<Response<M>>, Error> {
        self.execute(Method::Get, request).await
    }

    pub async fn post<M: DeserializeOwned>(
        &self,
        request: &Request<M>,
    ) -> Result<Outcome<Response<M>>, Error> {
        self.execute(Method::Post, request).await
    }

    pub async fn put<M: DeserializeOwned>(
        &self,
        request: &Request<M>,
    ) -> Result<Outcome<Response<M>>, Error> {
        self.execute(Method::Put, request).await
    }

    pub async fn delete<M: DeserializeOwned>(
        &self,
        request: &Request<M>,
    ) -> Result<Outcome<Response<M>>, Error> {
        self.execute(Method::Delete, request).await
    }

    /// Closes the open session of every live client, one after another.
    pub async fn close_all() {
        for shared in registry::snapshot() {
            let client = Client { shared };
            if client.is_open() {
                client.close().await;
            }
        }
    }

    /// Whether this client is still listed in the process-wide registry.
    pub fn is_registered(&self) -> bool {
        registry::contains(self.shared.id)
    }

    /// Number of clients currently alive in this process.
    pub fn live_clients() -> usize {
        registry::len()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Client {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.shared.id)
            .field("base_url", &self.shared.base_url)
            .field("path_prefix", &self.shared.path_prefix)
            .field("close_on_error", &self.shared.close_on_error)
            .field("has_error_handler", &self.shared.error_handler.is_some())
            .field("is_open", &self.is_open())
            .finish()
    }
}

/// Construction options for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    base_url: Option<String>,
    path_prefix: String,
    error_handler: Option<ErrorHandler>,
    close_on_error: CloseOnError,
    connector: Option<Arc<dyn Connector>>,
}

impl ClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Path prepended to every request path. Surrounding slashes are ignored.
    pub fn path_prefix(mut self, path_prefix: impl Into<String>) -> Self {
        self.path_prefix = path_prefix.into();
        self
    }

    /// Handles failed statuses instead of returning them as errors.
    pub fn error_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(RequestError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.error_handler = Some(error_handler(handler));
        self
    }

    pub fn shared_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn close_on_error(mut self, policy: impl Into<CloseOnError>) -> Self {
        self.close_on_error = policy.into();
        self
    }

    /// Replaces the default reqwest connector.
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Builds the client and registers it in the process-wide registry.
    pub fn build(self) -> Client {
        let shared = Arc::new(Shared {
            id: registry::next_id(),
            base_url: self.base_url.filter(|url| !url.is_empty()),
            path_prefix: self.path_prefix.trim_matches('/').to_string(),
            error_handler: self.error_handler,
            close_on_error: self.close_on_error,
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(ReqwestConnector::new())),
            session: Mutex::new(None),
        });
        registry::register(&shared);
        Client { shared }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeConnector, LogCapture, json_response};
    use super::*;

    fn client_with(connector: &Arc<FakeConnector>) -> Client {
        Client::builder()
            .base_url("http://127.0.0.1")
            .connector(Arc::clone(connector) as Arc<dyn Connector>)
            .build()
    }

    #[test]
    fn test_builder_strips_path_prefix() {
        let client = Client::builder().path_prefix("/api/v1/").build();
        assert_eq!(client.path_prefix(), "api/v1");
        assert_eq!(client.base_url(), None);
    }

    #[test]
    fn test_empty_base_url_is_none() {
        let client = Client::builder().base_url("").build();
        assert_eq!(client.base_url(), None);
    }

    #[test]
    fn test_not_open_until_session_access() {
        let connector = Arc::new(FakeConnector::default());
        let client = client_with(&connector);
        assert!(!client.is_open());
        assert_eq!(connector.opens(), 0);

        client.session().unwrap();
        assert!(client.is_open());
        assert_eq!(connector.opens(), 1);
        assert_eq!(
            connector.base_urls.lock().unwrap().clone(),
            vec![Some("http://127.0.0.1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_open_after_first_request() {
        let connector = Arc::new(FakeConnector::default());
        connector.queue(Ok(json_response(200, "{}")));
        let client = client_with(&connector);
        assert!(!client.is_open());

        client.get(&Request::new("/test")).await.unwrap();
        assert!(client.is_open());
    }

    #[test]
    fn test_session_is_reused() {
        let connector = Arc::new(FakeConnector::default());
        let client = client_with(&connector);

        let first = client.session().unwrap();
        let second = client.session().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.opens(), 1);
    }

    #[tokio::test]
    async fn test_close_then_reopen() {
        let connector = Arc::new(FakeConnector::default());
        let client = client_with(&connector);

        client.session().unwrap();
        client.close().await;
        assert!(!client.is_open());
        assert!(connector.last().is_closed());

        client.session().unwrap();
        assert!(client.is_open());
        assert_eq!(connector.opens(), 2);
    }

    #[tokio::test]
    async fn test_close_without_session_is_noop() {
        let logs = LogCapture::default();
        let _guard = logs.install();
        let connector = Arc::new(FakeConnector::default());
        let client = client_with(&connector);

        client.close().await;
        client.close().await;
        assert!(!client.is_open());
        assert_eq!(connector.opens(), 0);

        let warnings: Vec<_> = logs
            .lines()
            .into_iter()
            .filter(|line| line.contains("No session to close"))
            .collect();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|line| line.trim_start().starts_with("WARN")));
    }

    #[tokio::test]
    async fn test_closed_session_is_replaced_on_access() {
        let connector = Arc::new(FakeConnector::default());
        let client = client_with(&connector);

        let session = client.session().unwrap();
        session.close().await;
        assert!(!client.is_open());

        // Closing a client whose session was closed elsewhere only warns.
        client.close().await;

        let fresh = client.session().unwrap();
        assert!(!fresh.is_closed());
        assert_eq!(connector.opens(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_session_access_opens_once() {
        let connector = Arc::new(FakeConnector::default());
        let client = client_with(&connector);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let client = client.clone();
                tokio::spawn(async move { client.session().map(|_| ()) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(connector.opens(), 1);
    }

    #[test]
    fn test_registry_tracks_lifetime() {
        let client = Client::new();
        let id = client.id();
        assert!(client.is_registered());

        let clone = client.clone();
        drop(client);
        assert!(clone.is_registered());

        drop(clone);
        assert!(!registry::contains(id));
    }

    #[tokio::test]
    async fn test_dispose_closes_and_deregisters() {
        let connector = Arc::new(FakeConnector::default());
        let client = client_with(&connector);
        let id = client.id();
        client.session().unwrap();

        client.dispose().await;
        assert!(connector.last().is_closed());
        assert!(!registry::contains(id));
    }

    #[tokio::test]
    async fn test_dispose_with_outstanding_clone_stays_registered() {
        let connector = Arc::new(FakeConnector::default());
        let client = client_with(&connector);
        let held = client.clone();
        client.session().unwrap();

        client.dispose().await;
        assert!(!held.is_open());
        assert!(held.is_registered());

        let id = held.id();
        drop(held);
        assert!(!registry::contains(id));
    }

    #[test]
    fn test_clones_are_equal() {
        let client = Client::new();
        assert_eq!(client, client.clone());
        assert_ne!(client, Client::new());
    }

    #[test]
    fn test_debug_output() {
        let client = Client::builder()
            .base_url("http://127.0.0.1")
            .close_on_error([500])
            .build();
        let debug = format!("{:?}", client);
        assert!(debug.contains("http://127.0.0.1"));
        assert!(debug.contains("500"));
    }
}
