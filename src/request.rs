//! Request descriptors.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use anyhow::anyhow;
use serde::de::DeserializeOwned;

use crate::content::Content;

/// Media types understood by the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ContentType {
    #[default]
    Json,
    Form,
    Html,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Form => "application/x-www-form-urlencoded",
            ContentType::Html => "text/html",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = anyhow::Error;

    /// Parses a MIME string, ignoring parameters such as `charset`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let essence = s.split(';').next().unwrap_or_default().trim();
        [ContentType::Json, ContentType::Form, ContentType::Html]
            .into_iter()
            .find(|ct| ct.as_str().eq_ignore_ascii_case(essence))
            .ok_or_else(|| anyhow!("Unsupported content type: {}", s))
    }
}

/// HTTP methods exposed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes a single call: where it goes, what it carries and how the
/// response should be decoded.
///
/// `M` is the response model. Requests built with [`Request::new`] decode to
/// plain JSON; [`Request::response_model`] switches decoding to a typed model.
pub struct Request<M = serde_json::Value> {
    pub path: String,
    pub params: Content,
    pub body: Content,
    pub headers: HashMap<String, String>,
    pub content_type: ContentType,
    typed: bool,
    model: PhantomData<fn() -> M>,
}

impl Request {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Content::Absent,
            body: Content::Absent,
            headers: HashMap::new(),
            content_type: ContentType::default(),
            typed: false,
            model: PhantomData,
        }
    }
}

impl<M> Request<M> {
    pub fn params(mut self, params: impl Into<Content>) -> Self {
        self.params = params.into();
        self
    }

    pub fn body(mut self, body: impl Into<Content>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Decodes successful responses into `T` (or `Vec<T>` for JSON arrays).
    pub fn response_model<T: DeserializeOwned>(self) -> Request<T> {
        Request {
            path: self.path,
            params: self.params,
            body: self.body,
            headers: self.headers,
            content_type: self.content_type,
            typed: true,
            model: PhantomData,
        }
    }

    /// Whether a response model was set.
    pub fn is_typed(&self) -> bool {
        self.typed
    }
}

impl<M> Clone for Request<M> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            params: self.params.clone(),
            body: self.body.clone(),
            headers: self.headers.clone(),
            content_type: self.content_type,
            typed: self.typed,
            model: PhantomData,
        }
    }
}

impl<M> fmt::Debug for Request<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("path", &self.path)
            .field("params", &self.params)
            .field("body", &self.body)
            .field("headers", &self.headers)
            .field("content_type", &self.content_type)
            .field(
                "response_model",
                &self.typed.then(std::any::type_name::<M>),
            )
            .finish()
    }
}

/// A request after normalization, as handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    pub path: String,
    pub params: Content,
    pub body: Content,
    pub headers: HashMap<String, String>,
    pub content_type: ContentType,
}
