use std::{env, fs, path::Path};

use crate::{domain::ChatId, errors::Error, Result};

/// Connection settings for the channel-message database.
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
}

/// Typed configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub admin_chat_id: ChatId,
    /// Public username of the monitored discussion chat, without `@`.
    pub target_chat_username: String,

    // Storage
    pub database: DatabaseConfig,

    // Runtime
    pub worker_count: usize,
    pub update_queue_size: usize,
    pub max_repeats: u32,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup instead of the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        // Required
        let telegram_bot_token = get("FREDA_API_TOKEN_ID").ok_or_else(|| {
            Error::Config("FREDA_API_TOKEN_ID environment variable is required".to_string())
        })?;

        let admin_raw = get("ADMIN_CHAT_ID").ok_or_else(|| {
            Error::Config("ADMIN_CHAT_ID environment variable is required".to_string())
        })?;
        let admin_chat_id = admin_raw.trim().parse::<i64>().map(ChatId).map_err(|_| {
            Error::Config(format!("ADMIN_CHAT_ID is not a chat id: {admin_raw:?}"))
        })?;

        let target_chat_username = get("TARGET_CHAT_USERNAME")
            .map(|s| s.trim().trim_start_matches('@').to_string())
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("TARGET_CHAT_USERNAME environment variable is required".to_string())
            })?;

        let db_name = get("FREDA_DB_NAME").ok_or_else(|| {
            Error::Config("FREDA_DB_NAME environment variable is required".to_string())
        })?;

        // Database (host/port/user default to a local postgres)
        let database = DatabaseConfig {
            host: get("POSTGRES_HOST").unwrap_or_else(|| "localhost".to_string()),
            port: parse_or("POSTGRES_PORT", get("POSTGRES_PORT"), 5432u16)?,
            user: get("POSTGRES_USER").unwrap_or_else(|| "postgres".to_string()),
            password: lookup("POSTGRES_PASSWORD").unwrap_or_default(),
            name: db_name,
            max_connections: parse_or(
                "FREDA_DB_MAX_CONNECTIONS",
                get("FREDA_DB_MAX_CONNECTIONS"),
                2u32,
            )?
            .max(1),
        };

        let worker_count = parse_or("FREDA_WORKERS", get("FREDA_WORKERS"), 5usize)?.max(1);
        let update_queue_size =
            parse_or("FREDA_UPDATE_QUEUE", get("FREDA_UPDATE_QUEUE"), 100usize)?.max(1);
        let max_repeats = parse_or("FREDA_MAX_REPEATS", get("FREDA_MAX_REPEATS"), 50u32)?.max(1);

        Ok(Self {
            telegram_bot_token,
            admin_chat_id,
            target_chat_username,
            database,
            worker_count,
            update_queue_size,
            max_repeats,
        })
    }

    /// Whether `username` names the monitored discussion chat.
    pub fn is_target_chat(&self, username: Option<&str>) -> bool {
        username
            .map(|u| u.trim_start_matches('@'))
            .is_some_and(|u| u.eq_ignore_ascii_case(&self.target_chat_username))
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: {s:?}"))),
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
