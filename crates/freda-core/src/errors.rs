/// Placeholder used when a persistence failure carries no description.
pub const UNKNOWN_ERROR_DETAIL: &str = "no error description was available";

/// Core error type for the bot.
///
/// Adapter crates should map their specific errors into this type so the
/// dispatcher can report failures consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("persistence error: {}", .0.as_deref().unwrap_or(UNKNOWN_ERROR_DETAIL))]
    Persistence(Option<String>),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Description suitable for embedding in a chat message.
    pub fn detail(&self) -> String {
        match self {
            Error::Persistence(Some(detail)) if !detail.trim().is_empty() => detail.clone(),
            Error::Persistence(_) => UNKNOWN_ERROR_DETAIL.to_string(),
            Error::Platform(detail) | Error::Config(detail) | Error::External(detail) => {
                detail.clone()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
