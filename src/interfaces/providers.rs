use async_trait::async_trait;

use crate::error::Result;

/// A chat-completion backend that turns one prompt into one reply.
///
/// Implementations make a single attempt per call; failures of any kind are
/// reported as [`crate::error::TodoAnalyticsError::Upstream`].
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
