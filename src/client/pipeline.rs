//! Request execution: normalize, dispatch, classify, decode.

use std::time::Instant;

use anyhow::Result;
use log::error;
use serde::de::DeserializeOwned;

use super::Client;
use crate::content::{Content, to_json_bytes};
use crate::error::{Error, RequestError};
use crate::request::{ContentType, Method, PreparedRequest, Request};
use crate::response::{Outcome, Response, decode};

const CONTENT_TYPE: &str = "Content-Type";

impl Client {
    /// Joins the path prefix and a request path.
    ///
    /// Without a base URL the path is used as a URL on its own, so no leading
    /// slash is added.
    pub(crate) fn build_path(&self, path: &str) -> String {
        let slash = if self.base_url().is_some() { "/" } else { "" };
        let path = path.trim_matches('/');
        let prefix = self.path_prefix();
        if prefix.is_empty() {
            format!("{}{}", slash, path)
        } else {
            format!("{}{}/{}", slash, prefix, path)
        }
    }

    /// Builds the request that is actually sent. The caller's request is left untouched.
    pub(crate) fn prepare<M>(&self, method: Method, request: &Request<M>) -> Result<PreparedRequest> {
        let request = request.clone();

        let mut headers = request.headers;
        headers.retain(|name, _| !name.eq_ignore_ascii_case(CONTENT_TYPE));
        headers.insert(
            CONTENT_TYPE.to_string(),
            request.content_type.as_str().to_string(),
        );

        let params = request.params.serialize();
        let mut body = request.body.serialize();
        if request.content_type == ContentType::Json {
            if let Some(json) = body.to_json()? {
                body = Content::Bytes(to_json_bytes(&json)?);
            }
        }

        Ok(PreparedRequest {
            method,
            path: self.build_path(&request.path),
            params,
            body,
            headers,
            content_type: request.content_type,
        })
    }

    /// Runs one request and applies the client's failure policies.
    pub(crate) async fn execute<M: DeserializeOwned>(
        &self,
        method: Method,
        request: &Request<M>,
    ) -> Result<Outcome<Response<M>>, Error> {
        match self.dispatch(method, request).await {
            Ok(response) => Ok(Outcome::Success(response)),
            Err(Error::Connection(e)) => {
                error!("Failed to connect to server.");
                Err(Error::Connection(e))
            }
            Err(Error::Request(err)) => {
                self.log_failure(method, &err.request.path, &err);

                if self.close_on_error().applies_to(err.status) {
                    self.close().await;
                }

                match &self.shared.error_handler {
                    Some(handler) => {
                        handler(err).await;
                        Ok(Outcome::Handled)
                    }
                    None => Err(Error::Request(err)),
                }
            }
            Err(other) => {
                let path = self.build_path(&request.path);
                self.log_failure(method, &path, &other);
                Err(other)
            }
        }
    }

    async fn dispatch<M: DeserializeOwned>(
        &self,
        method: Method,
        request: &Request<M>,
    ) -> Result<Response<M>, Error> {
        let prepared = self.prepare(method, request)?;
        let session = self.session()?;

        let started = Instant::now();
        let raw = session.send(&prepared).await?;
        let duration = started.elapsed();

        tracing::debug!(
            method = %method,
            base_url = self.base_url().unwrap_or_default(),
            path = %prepared.path,
            status = raw.status,
            duration = ?duration,
            "Request completed"
        );

        if !raw.ok() {
            return Err(Error::Request(RequestError {
                status: raw.status,
                reason: raw.reason,
                client: self.clone(),
                request: prepared,
            }));
        }

        Ok(decode(&raw, request.is_typed())?)
    }

    fn log_failure(&self, method: Method, path: &str, error: &dyn std::fmt::Display) {
        tracing::error!(
            method = %method,
            base_url = self.base_url().unwrap_or_default(),
            path = %path,
            error = %error,
            "Request error"
        );
    }
}
