//! Navigation error types
//!
//! Every failure a navigation request can end in. Remote and cache failures
//! are wrapped so the host sees a single error type.

use crate::cache::CacheError;
use crate::catalog::CatalogError;

/// Result alias for navigation operations
pub type Result<T> = std::result::Result<T, NavError>;

/// Errors surfaced by routing, handlers and the collection transformer
#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error("No route matches path '{0}'")]
    RouteNotFound(String),

    #[error("Missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("Remote lookup failed: {0}")]
    RemoteLookupFailure(String),

    #[error("Unknown item kind '{0}'")]
    UnknownItemKind(String),

    #[error("Invalid route pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Catalog error: {0}")]
    Remote(#[from] CatalogError),
}

impl NavError {
    /// Whether the failure happened before any remote call was attempted
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            NavError::RouteNotFound(_) | NavError::MissingParameter(_)
        )
    }
}
