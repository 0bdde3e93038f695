//! Response decoding and call outcomes.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::http::RawResponse;
use crate::request::ContentType;

/// Decoded body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response<M = serde_json::Value> {
    /// HTML responses are returned as text.
    Text(String),
    /// JSON content when no model was requested, or when the body is empty.
    Json(serde_json::Value),
    Model(M),
    /// A JSON array decoded element-wise into the model.
    Models(Vec<M>),
}

impl<M> Response<M> {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Response::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Response::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_model(self) -> Option<M> {
        match self {
            Response::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn into_models(self) -> Option<Vec<M>> {
        match self {
            Response::Models(models) => Some(models),
            _ => None,
        }
    }
}

/// Result of a call that did not propagate an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    /// The client's error handler consumed a failed status.
    Handled,
}

impl<T> Outcome<T> {
    pub fn is_handled(&self) -> bool {
        matches!(self, Outcome::Handled)
    }

    /// The successful value, or `None` when the failure was handled.
    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Handled => None,
        }
    }
}

/// Decodes a 2xx response according to its content type and the requested model.
pub(crate) fn decode<M: DeserializeOwned>(raw: &RawResponse, typed: bool) -> Result<Response<M>> {
    let is_html = raw
        .content_type
        .as_deref()
        .and_then(|ct| ct.parse::<ContentType>().ok())
        == Some(ContentType::Html);

    if is_html {
        let text = String::from_utf8_lossy(&raw.body).into_owned();
        return Ok(Response::Text(text));
    }

    let content: serde_json::Value = if raw.body.iter().all(u8::is_ascii_whitespace) {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&raw.body).context("Failed to parse JSON response")?
    };

    // Plain strings are returned as-is even when a model was requested.
    if !typed || content.is_null() || content.is_string() {
        return Ok(Response::Json(content));
    }

    match content {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).context("Failed to map item into response model"))
            .collect::<Result<Vec<M>>>()
            .map(Response::Models),
        other => serde_json::from_value(other)
            .map(Response::Model)
            .context("Failed to map response into response model"),
    }
}
