//! Request logging errors

use crate::store::StoreError;
use reqtrail_cache::CacheError;

/// Failure while logging a request or response.
///
/// None of these are swallowed: the middleware turns them into
/// [`reqtrail_core::Error::Internal`] for the host.
#[derive(Debug, thiserror::Error)]
pub enum RequestLogError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Audit store error: {0}")]
    Store(#[from] StoreError),

    #[error("Prune gate cache error: {0}")]
    Cache(#[from] CacheError),
}

impl From<RequestLogError> for reqtrail_core::Error {
    fn from(err: RequestLogError) -> Self {
        reqtrail_core::Error::Internal(err.to_string())
    }
}
