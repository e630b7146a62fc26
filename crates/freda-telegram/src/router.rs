use std::sync::Arc;

use anyhow::Context;
use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio::sync::mpsc;

use freda_core::{
    config::Config,
    dispatcher::Dispatcher as UpdateRouter,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
        types::Update as InboundUpdate,
    },
    state::{IgnoreFlag, RepeatStore},
    storage::ChannelLog,
};

use crate::{convert::to_update, TelegramMessenger};

pub async fn run_polling(cfg: Arc<Config>, channel_log: Arc<dyn ChannelLog>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // An invalid token is fatal; there is nothing useful to do without it.
    let me = bot
        .get_me()
        .await
        .context("telegram rejected the bot token")?;
    tracing::info!(username = me.username(), "Hello, I am {}", me.user.first_name);
    tracing::info!(
        admin_chat = cfg.admin_chat_id.0,
        target_chat = %cfg.target_chat_username,
        workers = cfg.worker_count,
        "relaying forwarded posts"
    );

    // Wrap the raw Telegram messenger with a throttling decorator; `/repeat` fans out
    // quickly. We still keep a 429 RetryAfter retry at the Telegram adapter layer.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let router = Arc::new(
        UpdateRouter::new(
            cfg.clone(),
            messenger,
            channel_log,
            Arc::new(RepeatStore::new()),
            Arc::new(IgnoreFlag::new()),
        )
        .with_bot_username(me.username()),
    );

    let (tx, rx) = mpsc::channel::<InboundUpdate>(cfg.update_queue_size);
    let workers = tokio::spawn(router.run(rx, cfg.worker_count));

    let handler = dptree::entry().branch(Update::filter_message().endpoint(enqueue_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![tx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // Polling stopped and the sender was dropped with the dispatcher: let the
    // workers drain what is queued and flush replies.
    tracing::info!("polling stopped, draining queued updates");
    workers.await.context("update workers panicked")?;

    Ok(())
}

async fn enqueue_message(msg: Message, tx: mpsc::Sender<InboundUpdate>) -> ResponseResult<()> {
    if tx.send(to_update(&msg)).await.is_err() {
        tracing::warn!(chat_id = msg.chat.id.0, "update queue closed, dropping message");
    }
    Ok(())
}
