//! Telegram MarkdownV2 helpers.

use crate::messaging::types::ChatAdministrator;

/// Characters MarkdownV2 treats as markup outside code entities.
const RESERVED: &str = "_*[]()~`>#+-=|{}.!\\";

/// Escape text for use inside a MarkdownV2 body or link label.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Inline mention of a user that notifies them even without a username.
pub fn user_mention(user_id: i64, name: &str) -> String {
    let label = if name.trim().is_empty() {
        user_id.to_string()
    } else {
        escape_markdown(name)
    };
    format!("[{label}](tg://user?id={user_id})")
}

/// Space-separated mentions of every administrator.
pub fn mention_list(admins: &[ChatAdministrator]) -> String {
    admins
        .iter()
        .map(|a| user_mention(a.user_id.0, &a.display_name))
        .collect::<Vec<_>>()
        .join(" ")
}
