use async_trait::async_trait;

use super::normalize::RemoteMatch;
use crate::error::FetchError;

/// Trait that every remote match source must implement.
#[async_trait]
pub trait MatchProvider: Send + Sync {
    /// Fetch the raw match records of the current window.
    async fn fetch_matches(&self) -> Result<Vec<RemoteMatch>, FetchError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
