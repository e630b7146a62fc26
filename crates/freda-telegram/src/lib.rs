//! Telegram adapter (teloxide).
//!
//! This crate implements the `freda-core` MessagingPort over Telegram Bot API.

use async_trait::async_trait;

use teloxide::{prelude::*, types::ParseMode};

use tokio::time::sleep;

pub mod convert;
pub mod router;

use freda_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAdministrator, OutboundMessage, RenderMode},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Platform(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_message(&self, msg: &OutboundMessage) -> Result<MessageRef> {
        let sent = self
            .with_retry(|| {
                // Replies may point at a message from another chat (admin
                // acknowledgements); fall back to a plain message then.
                let mut req = self
                    .bot
                    .send_message(Self::tg_chat(msg.chat_id), msg.text.clone())
                    .allow_sending_without_reply(true);
                if let Some(reply_to) = msg.reply_to {
                    req = req.reply_to_message_id(Self::tg_msg_id(reply_to));
                }
                if msg.mode == RenderMode::Markdown {
                    req = req.parse_mode(ParseMode::MarkdownV2);
                }
                req
            })
            .await?;

        Ok(MessageRef {
            chat_id: msg.chat_id,
            message_id: MessageId(sent.id.0),
        })
    }

    async fn chat_administrators(&self, chat_id: ChatId) -> Result<Vec<ChatAdministrator>> {
        let members = self
            .with_retry(|| self.bot.get_chat_administrators(Self::tg_chat(chat_id)))
            .await?;

        Ok(members
            .into_iter()
            .map(|m| ChatAdministrator {
                user_id: UserId(m.user.id.0 as i64),
                display_name: m.user.first_name,
            })
            .collect())
    }
}
