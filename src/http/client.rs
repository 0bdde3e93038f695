//! Session and connector backed by reqwest.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;

use super::classify::TransportError;
use super::{Connector, RawResponse, Session};
use crate::content::Content;
use crate::request::{Method, PreparedRequest};

/// Opens [`ReqwestSession`]s with a shared client configuration.
#[derive(Debug, Clone, Default)]
pub struct ReqwestConnector {
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ReqwestConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total timeout applied to every request of the sessions this connector opens.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

impl Connector for ReqwestConnector {
    fn open(&self, base_url: Option<&str>) -> Result<Arc<dyn Session>> {
        let mut builder = Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().context("Failed to build HTTP client")?;
        debug!("Opened session for {:?}", base_url);
        Ok(Arc::new(ReqwestSession::new(client, base_url)))
    }
}

/// A reqwest client bound to a base URL.
///
/// Dropping the last reference releases the connection pool. `close` marks the
/// session unusable so callers can tell it apart from a live one.
pub struct ReqwestSession {
    client: Client,
    base_url: Option<String>,
    closed: AtomicBool,
}

impl ReqwestSession {
    pub fn new(client: Client, base_url: Option<&str>) -> Self {
        Self {
            client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Resolves a request path against the base URL.
    fn url(&self, path: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{}{}", base, path),
            None => path.to_string(),
        }
    }

    fn builder(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
            Method::Delete => self.client.delete(url),
        }
    }
}

#[async_trait]
impl Session for ReqwestSession {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut url = self.url(&request.path);
        if let Content::Bytes(raw_query) = &request.params {
            let raw_query = String::from_utf8_lossy(raw_query);
            let separator = if url.contains('?') { '&' } else { '?' };
            url = format!("{}{}{}", url, separator, raw_query.trim_start_matches('?'));
        }

        let mut builder = self.builder(request.method, &url);

        let query = request.params.to_pairs();
        if !query.is_empty() {
            builder = builder.query(&query);
        }

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        builder = match &request.body {
            Content::Absent => builder,
            Content::Bytes(payload) => builder.body(payload.clone()),
            structured => builder.form(&structured.to_pairs()),
        };

        let response = builder.send().await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(RawResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            content_type,
            body: body.to_vec(),
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Closed session for {:?}", self.base_url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Fields;
    use crate::request::ContentType;
    use mockito::Matcher;
    use std::collections::HashMap;

    fn prepared(method: Method, path: &str) -> PreparedRequest {
        PreparedRequest {
            method,
            path: path.to_string(),
            params: Content::Absent,
            body: Content::Absent,
            headers: HashMap::new(),
            content_type: ContentType::Json,
        }
    }

    fn open(base_url: &str) -> Arc<dyn Session> {
        ReqwestConnector::new().open(Some(base_url)).unwrap()
    }

    #[tokio::test]
    async fn test_send_get_success() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"foo": "bar"}"#)
            .create_async()
            .await;

        let session = open(&server.url());
        let raw = session.send(&prepared(Method::Get, "/test")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(raw.status, 200);
        assert_eq!(raw.reason, "OK");
        assert_eq!(raw.content_type.as_deref(), Some("application/json"));
        assert_eq!(raw.body, br#"{"foo": "bar"}"#.to_vec());
    }

    #[tokio::test]
    async fn test_send_query_and_headers() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/items")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("open".into(), "True".into()),
            ]))
            .match_header("x-trace", "abc")
            .with_status(200)
            .create_async()
            .await;

        let mut request = prepared(Method::Get, "/items");
        request.params = Content::from(Fields::new().with("page", 2).with("open", "True"));
        request.headers.insert("X-Trace".into(), "abc".into());

        let session = open(&server.url());
        session.send(&request).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_raw_query_bytes() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("q".into(), "rust".into()))
            .with_status(200)
            .create_async()
            .await;

        let mut request = prepared(Method::Get, "/search");
        request.params = Content::bytes("q=rust");

        let session = open(&server.url());
        session.send(&request).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_bytes_body() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("POST", "/test")
            .match_body(r#"{"name": "James"}"#)
            .with_status(201)
            .create_async()
            .await;

        let mut request = prepared(Method::Post, "/test");
        request.body = Content::bytes(r#"{"name": "James"}"#);

        let session = open(&server.url());
        let raw = session.send(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(raw.status, 201);
    }

    #[tokio::test]
    async fn test_send_form_body() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("PUT", "/form")
            .match_body("name=James&age=25")
            .with_status(204)
            .create_async()
            .await;

        let mut request = prepared(Method::Put, "/form");
        request.body = Content::from(Fields::new().with("name", "James").with("age", 25));

        let session = open(&server.url());
        let raw = session.send(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(raw.status, 204);
        assert!(raw.body.is_empty());
    }

    #[tokio::test]
    async fn test_send_error_status_is_not_a_transport_error() {
        let mut server = mockito::Server::new_async().await;

        let _m = server
            .mock("DELETE", "/gone")
            .with_status(404)
            .create_async()
            .await;

        let session = open(&server.url());
        let raw = session.send(&prepared(Method::Delete, "/gone")).await.unwrap();

        assert_eq!(raw.status, 404);
        assert_eq!(raw.reason, "Not Found");
        assert!(!raw.ok());
    }

    #[tokio::test]
    async fn test_send_without_base_url_uses_path_as_url() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/absolute")
            .with_status(200)
            .create_async()
            .await;

        let session = ReqwestConnector::new().open(None).unwrap();
        let url = format!("{}/absolute", server.url());
        session.send(&prepared(Method::Get, &url)).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_connection_refused() {
        let session = open("http://127.0.0.1:1");
        let err = session
            .send(&prepared(Method::Get, "/test"))
            .await
            .unwrap_err();
        assert!(err.is_connect());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_blocks_sends() {
        let session = open("http://127.0.0.1");
        assert!(!session.is_closed());

        session.close().await;
        session.close().await;
        assert!(session.is_closed());

        let err = session
            .send(&prepared(Method::Get, "/test"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let session = ReqwestSession::new(Client::new(), Some("http://127.0.0.1/"));
        assert_eq!(session.base_url(), Some("http://127.0.0.1"));
        assert_eq!(session.url("/test"), "http://127.0.0.1/test");
    }

    #[test]
    fn test_connector_applies_options() {
        let connector = ReqwestConnector::new()
            .timeout(Duration::from_secs(5))
            .user_agent("spacs-test");
        assert_eq!(connector.timeout, Some(Duration::from_secs(5)));
        assert!(connector.open(None).is_ok());
    }
}
