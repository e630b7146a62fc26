//! Chat command syntax.

/// Parse a group command name out of message text.
///
/// Telegram may send `/cmd@botname arg1 ...`; the name comes back without the
/// slash or bot suffix, lower-cased. Returns `None` for non-command text.
pub fn parse_command(text: &str) -> Option<String> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?.split('@').next().unwrap_or("");
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase())
}

/// The bot a command is addressed to (`/cmd@botname`), without the `@`.
pub fn command_target(text: &str) -> Option<String> {
    let first = text.split_whitespace().next()?;
    let (_, target) = first.strip_prefix('/')?.split_once('@')?;
    if target.is_empty() {
        return None;
    }
    Some(target.to_string())
}

/// A command understood in one-to-one chats.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrivateCommand {
    ToggleIgnore,
    /// `/repeat <arg>`; the argument is validated separately.
    Repeat(String),
}

/// Recognize private-chat commands by exact whitespace-separated tokens.
pub fn parse_private_command(text: &str) -> Option<PrivateCommand> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.as_slice() {
        ["/toggleIgnore"] => Some(PrivateCommand::ToggleIgnore),
        ["/repeat", arg] => Some(PrivateCommand::Repeat((*arg).to_string())),
        _ => None,
    }
}

/// Validate a `/repeat` count: a positive integer no larger than `max`.
pub fn parse_repeat_count(arg: &str, max: u32) -> Option<u32> {
    match arg.parse::<i64>() {
        Ok(n) if n >= 1 && n <= i64::from(max) => u32::try_from(n).ok(),
        _ => None,
    }
}
