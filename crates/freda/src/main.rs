use std::sync::Arc;

use freda_core::{config::Config, storage::ChannelLog};
use freda_postgres::PgChannelLog;

#[tokio::main]
async fn main() -> Result<(), freda_core::Error> {
    freda_core::logging::init("freda")?;

    let cfg = Arc::new(Config::load()?);

    let channel_log = PgChannelLog::connect_lazy(&cfg.database);
    // Not fatal: a missing database shows up as failed saves reported to the admin.
    if let Err(e) = channel_log.ensure_schema().await {
        tracing::warn!(error = %e, "could not ensure channel_messages table");
    }
    let channel_log: Arc<dyn ChannelLog> = Arc::new(channel_log);

    freda_telegram::router::run_polling(cfg, channel_log)
        .await
        .map_err(|e| freda_core::Error::External(format!("telegram bot failed: {e:#}")))?;

    Ok(())
}
