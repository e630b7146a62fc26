use async_trait::async_trait;

use crate::Result;

/// Append-only log of forwarded channel posts.
///
/// Implementations return the index the store assigned to the new entry, or
/// `Error::Persistence` when the write did not happen.
#[async_trait]
pub trait ChannelLog: Send + Sync {
    async fn append(&self, message: &str) -> Result<i64>;
}
