//! Catalog API error types
//!
//! Maps HTTP status codes to specific error variants so the client can
//! decide what to retry.

/// SoundCloud API error types
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Unauthorized: access token missing or expired")]
    Unauthorized,

    #[error("Rate limited: try again after backoff")]
    RateLimited,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({0}): {1}")]
    Server(u16, String),

    #[error("Request timeout")]
    Timeout,

    #[error("Request error: {0}")]
    Request(String),

    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl CatalogError {
    /// Whether this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::RateLimited
                | CatalogError::Timeout
                | CatalogError::Network(_)
                | CatalogError::Server(_, _)
        )
    }

    /// Create a CatalogError from an HTTP status code and response body
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => CatalogError::Unauthorized,
            403 => CatalogError::Forbidden(body.to_string()),
            404 => CatalogError::NotFound(body.to_string()),
            408 => CatalogError::Timeout,
            429 => CatalogError::RateLimited,
            500..=599 => CatalogError::Server(status, body.to_string()),
            _ => CatalogError::Request(format!("HTTP {}: {}", status, body)),
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CatalogError::Timeout
        } else if err.is_decode() {
            CatalogError::Decode(err.to_string())
        } else if err.is_connect() || err.is_request() {
            CatalogError::Network(err.to_string())
        } else {
            CatalogError::Request(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(CatalogError::from_status(401, ""), CatalogError::Unauthorized));
        assert!(matches!(CatalogError::from_status(404, "gone"), CatalogError::NotFound(b) if b == "gone"));
        assert!(matches!(CatalogError::from_status(429, ""), CatalogError::RateLimited));
        assert!(matches!(CatalogError::from_status(503, ""), CatalogError::Server(503, _)));
        assert!(matches!(CatalogError::from_status(418, "teapot"), CatalogError::Request(_)));
    }

    #[test]
    fn test_retryable() {
        assert!(CatalogError::from_status(429, "").is_retryable());
        assert!(CatalogError::from_status(502, "").is_retryable());
        assert!(!CatalogError::from_status(401, "").is_retryable());
        assert!(!CatalogError::from_status(404, "").is_retryable());
    }
}
