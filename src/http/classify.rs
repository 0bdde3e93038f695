//! Classification of transport failures.

/// Errors raised below the HTTP status layer.
#[derive(Debug)]
pub enum TransportError {
    /// The remote host could not be reached.
    Connect(String),
    /// The session was closed before the request was sent.
    Closed,
    /// Anything else the transport reported (timeouts, body reads, bad URLs).
    Other(anyhow::Error),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Connect(msg) => write!(f, "Connection failed: {}", msg),
            TransportError::Closed => write!(f, "Session is closed"),
            TransportError::Other(e) => write!(f, "Transport error: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}

impl TransportError {
    pub fn is_connect(&self) -> bool {
        matches!(self, TransportError::Connect(_))
    }
}

/// Splits reqwest errors into connection failures and everything else.
pub fn classify_error(error: reqwest::Error) -> TransportError {
    if error.is_connect() {
        return TransportError::Connect(error.to_string());
    }
    TransportError::Other(anyhow::Error::from(error))
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        classify_error(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Connect("refused".to_string());
        assert!(err.to_string().contains("Connection failed"));
        assert!(err.to_string().contains("refused"));

        assert!(TransportError::Closed.to_string().contains("closed"));

        let err = TransportError::Other(anyhow::anyhow!("timed out"));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_classify_error_connection_refused() {
        // Port 1 is reserved and nothing listens on it in test environments.
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:1/")
            .send()
            .await
            .unwrap_err();

        assert!(classify_error(err).is_connect());
    }

    #[tokio::test]
    async fn test_classify_error_invalid_url_is_other() {
        let err = reqwest::Client::new()
            .get("not a url")
            .send()
            .await
            .unwrap_err();

        assert!(matches!(classify_error(err), TransportError::Other(_)));
    }
}
