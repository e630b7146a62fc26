use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{ChatAdministrator, OutboundMessage},
    Result,
};

/// Outbound side of the chat platform.
///
/// Telegram is the only implementation; tests use in-process fakes.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_message(&self, msg: &OutboundMessage) -> Result<MessageRef>;

    async fn chat_administrators(&self, chat_id: ChatId) -> Result<Vec<ChatAdministrator>>;
}
