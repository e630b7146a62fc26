//! teloxide message -> core `Update`.

use teloxide::types::Message;

use freda_core::{
    commands::{command_target, parse_command},
    domain::{ChatId, MessageId, UserId},
    messaging::types::{ChatKind, Update},
};

pub fn chat_kind(msg: &Message) -> ChatKind {
    if msg.chat.is_private() {
        ChatKind::Private
    } else if msg.chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    }
}

/// Flatten a teloxide message into the fields the dispatcher routes on.
///
/// Media posts carry their text in the caption; only real text can be a command.
pub fn to_update(msg: &Message) -> Update {
    let text = msg.text().or_else(|| msg.caption()).unwrap_or_default();
    let command = msg.text().and_then(parse_command);
    let command_target = msg.text().and_then(command_target);
    let sender = msg.from();

    Update {
        message_id: MessageId(msg.id.0),
        chat_id: ChatId(msg.chat.id.0),
        chat_kind: chat_kind(msg),
        chat_username: msg.chat.username().map(str::to_string),
        sender_id: sender.map(|u| UserId(u.id.0 as i64)),
        sender_username: sender.and_then(|u| u.username.clone()),
        text: text.to_string(),
        reply_to: msg.reply_to_message().map(|m| MessageId(m.id.0)),
        command,
        command_target,
    }
}
