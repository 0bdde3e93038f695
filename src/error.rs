//! Error types returned by client calls.

use crate::client::Client;
use crate::http::TransportError;
use crate::request::PreparedRequest;

/// A response with a non-2xx status.
#[derive(Debug, Clone)]
pub struct RequestError {
    pub status: u16,
    pub reason: String,
    /// Client that issued the request.
    pub client: Client,
    /// The request exactly as it was sent.
    pub request: PreparedRequest,
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} failed with status {}",
            self.request.method, self.request.path, self.status
        )?;
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for RequestError {}

/// Failures propagated to the caller.
#[derive(Debug)]
pub enum Error {
    /// The remote host could not be reached. Never passed to the error handler.
    Connection(TransportError),
    /// The server answered with a non-2xx status and no handler consumed it.
    Request(RequestError),
    /// Anything else raised while preparing, sending or decoding.
    Unexpected(anyhow::Error),
}

impl Error {
    /// HTTP status of a [`Error::Request`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Request(err) => Some(err.status),
            _ => None,
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Failed to connect to server: {}", e),
            Error::Request(e) => write!(f, "Request error: {}", e),
            Error::Unexpected(e) => write!(f, "Unexpected error: {:#}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => Some(e),
            Error::Request(e) => Some(e),
            Error::Unexpected(e) => Some(&**e),
        }
    }
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        if error.is_connect() {
            Error::Connection(error)
        } else {
            Error::Unexpected(anyhow::Error::from(error))
        }
    }
}

impl From<RequestError> for Error {
    fn from(error: RequestError) -> Self {
        Error::Request(error)
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Error::Unexpected(error)
    }
}
