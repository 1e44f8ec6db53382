//! Remote call caching layer
//!
//! Memoizes catalog responses on disk so they survive process restarts,
//! with an in-memory Moka layer in front for repeated lookups in one run.

pub mod function_cache;
pub mod store;

pub use function_cache::FunctionCache;

use std::path::PathBuf;

/// Freshness windows used by callers
pub mod ttl {
    use std::time::Duration;

    /// Volatile results such as search listings
    pub const ONE_MINUTE: Duration = Duration::from_secs(60);
    /// Trending and genre listings
    pub const ONE_HOUR: Duration = Duration::from_secs(60 * 60);
    /// Near-static taxonomy data
    pub const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);
}

/// Cache failures. These are always propagated to the caller.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to persist cache entry: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
