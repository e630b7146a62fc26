//! PostgreSQL adapter (sqlx).
//!
//! Implements the `freda-core` ChannelLog port over a `channel_messages` table.

use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode},
    Row,
};

use freda_core::{config::DatabaseConfig, errors::Error, storage::ChannelLog, Result};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS channel_messages (
    "index" SERIAL PRIMARY KEY,
    message TEXT NOT NULL
)"#;

const INSERT_MESSAGE: &str = r#"
INSERT INTO channel_messages (message)
VALUES ($1)
RETURNING "index"::bigint AS "index""#;

/// `channel_messages`-backed implementation of `ChannelLog`.
#[derive(Clone)]
pub struct PgChannelLog {
    pool: PgPool,
}

impl PgChannelLog {
    /// Build a lazily connecting pool; nothing touches the network until the
    /// first query.
    pub fn connect_lazy(cfg: &DatabaseConfig) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect_lazy_with(connect_options(cfg));
        Self { pool }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        tracing::debug!("channel_messages table ready");
        Ok(())
    }
}

#[async_trait]
impl ChannelLog for PgChannelLog {
    async fn append(&self, message: &str) -> Result<i64> {
        let row = sqlx::query(INSERT_MESSAGE)
            .bind(message)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;

        // No row back means the insert did not report an index.
        let Some(row) = row else {
            return Err(Error::Persistence(None));
        };
        // Older tables may use BIGSERIAL; the cast keeps the decode width fixed.
        let index: i64 = row.try_get("index").map_err(map_err)?;
        tracing::debug!(index, "channel message stored");
        Ok(index)
    }
}

pub fn connect_options(cfg: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.name)
        .ssl_mode(PgSslMode::Disable)
}

fn map_err(e: sqlx::Error) -> Error {
    let detail = e.to_string();
    Error::Persistence(if detail.trim().is_empty() {
        None
    } else {
        Some(detail)
    })
}
