use crate::domain::{ChatId, MessageId, UserId};

/// Kind of chat an update arrived in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Channel,
}

/// Cross-messenger incoming update model.
///
/// Telegram-specific fields should live in the Telegram adapter.
#[derive(Clone, Debug)]
pub struct Update {
    pub message_id: MessageId,
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    pub chat_username: Option<String>,
    pub sender_id: Option<UserId>,
    pub sender_username: Option<String>,
    pub text: String,
    /// Message this one replies to, if any.
    pub reply_to: Option<MessageId>,
    /// Normalized command name (no slash, no `@bot` suffix, lower-case).
    pub command: Option<String>,
    /// Bot named by a `/cmd@botname` suffix, without the `@`.
    pub command_target: Option<String>,
}

/// How the platform should render an outgoing body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    #[default]
    Plain,
    /// Telegram MarkdownV2; the body must already be escaped.
    Markdown,
}

/// A composed reply or notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub reply_to: Option<MessageId>,
    pub mode: RenderMode,
}

impl OutboundMessage {
    pub fn plain(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to: None,
            mode: RenderMode::Plain,
        }
    }

    pub fn replying_to(mut self, message_id: MessageId) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }
}

/// One entry of a chat's administrator list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatAdministrator {
    pub user_id: UserId,
    pub display_name: String,
}
