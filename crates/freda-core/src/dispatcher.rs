//! Routes each inbound update to exactly one handling path.
//!
//! Priority order:
//! 1. replicated posts from the monitored channel are persisted (unless the
//!    admin asked to skip the next one) and acknowledged to the admin;
//! 2. private chats get `/toggleIgnore` (admin only), `/repeat N` and echo;
//! 3. other chats get `/report` and an "unknown command" fallback;
//! 4. everything else is ignored.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::task::TaskTracker;

use crate::{
    commands::{parse_private_command, parse_repeat_count, PrivateCommand},
    config::Config,
    domain::CHANNEL_REPLICATION_USER,
    errors::Error,
    formatting::mention_list,
    messaging::{
        port::MessagingPort,
        types::{ChatKind, OutboundMessage, RenderMode, Update},
    },
    notifier::Notifier,
    state::{ChatLocks, IgnoreFlag, RepeatDirective, RepeatStore},
    storage::ChannelLog,
};

pub const SAVED_ACK: &str =
    "My Lord, I have added message successfully to database, I hope I am serving you well.";
pub const SAVE_FAILED_ALERT: &str = "Something failed, sending details. If you don't get the details in a message immediately after this one, It might be something very bad.";
pub const TOGGLED_ON_ACK: &str = "Toggled Ignore. The next forwarded post will be skipped.";
pub const TOGGLED_OFF_ACK: &str = "Toggled Ignore. Forwarded posts will be saved.";
pub const BAD_REPEAT_COUNT: &str = "Oopsie Whoopsie, could not parse your numbersie";
pub const REPORT_NEEDS_REPLY: &str =
    "Please reply to the message you wish to report with this command.";
pub const REPORT_NO_ADMINS: &str = "I could not find any administrators to notify.";
pub const UNKNOWN_COMMAND: &str = "Sorry, I don't recognize that command.";

pub fn save_failed_detail(err: &Error) -> String {
    format!(
        "My Lord, I have failed in adding the message database, the error I encountered is: {} I am sorry to have disappointed you.",
        err.detail()
    )
}

pub fn report_failed_detail(err: &Error) -> String {
    format!(
        "My Lord, there was an error while reporting: {} I am sorry to have disappointed you.",
        err.detail()
    )
}

/// Which branch handled an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Forwarded post skipped because the ignore flag was set.
    Suppressed,
    Persisted { index: i64 },
    PersistFailed,
    IgnoreToggled { now_ignoring: bool },
    RepeatArmed { times: u32 },
    RepeatRejected,
    Echoed { times: u32 },
    ReportSent { admins: usize },
    ReportNeedsReply,
    /// The chat reported no administrators to mention.
    ReportNoAdmins,
    ReportFailed,
    UnknownCommand,
    NoAction,
}

pub struct Dispatcher {
    cfg: Arc<Config>,
    messenger: Arc<dyn MessagingPort>,
    channel_log: Arc<dyn ChannelLog>,
    repeats: Arc<RepeatStore>,
    ignore_next: Arc<IgnoreFlag>,
    chat_locks: ChatLocks,
    notifier: Notifier,
    handlers: TaskTracker,
    /// Our own `@username`; `/cmd@other_bot` is left for that bot.
    bot_username: Option<String>,
}

impl Dispatcher {
    pub fn new(
        cfg: Arc<Config>,
        messenger: Arc<dyn MessagingPort>,
        channel_log: Arc<dyn ChannelLog>,
        repeats: Arc<RepeatStore>,
        ignore_next: Arc<IgnoreFlag>,
    ) -> Self {
        Self {
            cfg,
            notifier: Notifier::new(messenger.clone()),
            messenger,
            channel_log,
            repeats,
            ignore_next,
            chat_locks: ChatLocks::default(),
            handlers: TaskTracker::new(),
            bot_username: None,
        }
    }

    pub fn with_bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into());
        self
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Drain `updates` with `workers` consumers, handling each update on its
    /// own task. Returns once the queue is closed and all work has finished,
    /// including pending notifications.
    pub async fn run(self: Arc<Self>, updates: mpsc::Receiver<Update>, workers: usize) {
        let updates = Arc::new(Mutex::new(updates));
        let mut pool = JoinSet::new();

        for worker in 0..workers.max(1) {
            let this = self.clone();
            let updates = updates.clone();
            pool.spawn(async move {
                loop {
                    let next = { updates.lock().await.recv().await };
                    let Some(update) = next else {
                        break;
                    };
                    let handler = this.clone();
                    this.handlers.spawn(async move {
                        handler.handle(update).await;
                    });
                }
                tracing::debug!(worker, "update worker stopped");
            });
        }

        while let Some(res) = pool.join_next().await {
            if let Err(e) = res {
                tracing::warn!(error = %e, "update worker failed");
            }
        }

        self.handlers.close();
        self.handlers.wait().await;
        self.notifier.wait_idle().await;
    }

    /// Handle one update to completion. Replies are queued on the notifier and
    /// may still be in flight when this returns.
    pub async fn handle(&self, update: Update) -> Outcome {
        let outcome = self.route(&update).await;
        tracing::debug!(
            chat_id = update.chat_id.0,
            chat_kind = ?update.chat_kind,
            message_id = update.message_id.0,
            ?outcome,
            "update handled"
        );
        outcome
    }

    async fn route(&self, update: &Update) -> Outcome {
        if update.sender_id == Some(CHANNEL_REPLICATION_USER)
            && self.cfg.is_target_chat(update.chat_username.as_deref())
        {
            return self.handle_channel_post(update).await;
        }

        if update.chat_kind == ChatKind::Private {
            // Serialize per chat: the repeat directive is read, acted on and
            // reset without another update from this chat in between.
            let _guard = self.chat_locks.lock_chat(update.chat_id).await;
            return self.handle_private(update).await;
        }

        if let Some(target) = update.command_target.as_deref() {
            let ours = self
                .bot_username
                .as_deref()
                .is_some_and(|me| me.eq_ignore_ascii_case(target));
            if !ours {
                return Outcome::NoAction;
            }
        }

        match update.command.as_deref() {
            Some("report") => self.handle_report(update).await,
            Some(_) => {
                self.notifier.send(
                    OutboundMessage::plain(update.chat_id, UNKNOWN_COMMAND)
                        .replying_to(update.message_id),
                );
                Outcome::UnknownCommand
            }
            None => Outcome::NoAction,
        }
    }

    async fn handle_channel_post(&self, update: &Update) -> Outcome {
        if self.ignore_next.take() {
            tracing::info!(message_id = update.message_id.0, "forwarded post skipped");
            return Outcome::Suppressed;
        }

        let admin = self.cfg.admin_chat_id;
        match self.channel_log.append(&update.text).await {
            Ok(index) => {
                tracing::info!(index, "forwarded post saved");
                self.notifier.send(
                    OutboundMessage::plain(admin, SAVED_ACK).replying_to(update.message_id),
                );
                Outcome::Persisted { index }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to save forwarded post");
                self.notifier.send_in_order(vec![
                    OutboundMessage::plain(admin, SAVE_FAILED_ALERT),
                    OutboundMessage::plain(admin, save_failed_detail(&e)),
                ]);
                Outcome::PersistFailed
            }
        }
    }

    async fn handle_private(&self, update: &Update) -> Outcome {
        match parse_private_command(&update.text) {
            Some(PrivateCommand::ToggleIgnore) if update.chat_id == self.cfg.admin_chat_id => {
                let now_ignoring = self.ignore_next.toggle();
                tracing::info!(now_ignoring, "ignore flag toggled");
                let ack = if now_ignoring {
                    TOGGLED_ON_ACK
                } else {
                    TOGGLED_OFF_ACK
                };
                self.notifier
                    .send(OutboundMessage::plain(self.cfg.admin_chat_id, ack));
                return Outcome::IgnoreToggled { now_ignoring };
            }
            Some(PrivateCommand::Repeat(arg)) => {
                return match parse_repeat_count(&arg, self.cfg.max_repeats) {
                    Some(times) => {
                        self.repeats
                            .set(update.chat_id, RepeatDirective::armed(times))
                            .await;
                        Outcome::RepeatArmed { times }
                    }
                    None => {
                        self.notifier.send(
                            OutboundMessage::plain(update.chat_id, BAD_REPEAT_COUNT)
                                .replying_to(update.message_id),
                        );
                        Outcome::RepeatRejected
                    }
                };
            }
            // Non-admin `/toggleIgnore` is just text to echo.
            Some(PrivateCommand::ToggleIgnore) | None => {}
        }

        if update.text.trim().is_empty() {
            return Outcome::NoAction;
        }

        let directive = self.repeats.consume(update.chat_id).await;
        if directive.active {
            for _ in 0..directive.remaining_repeats {
                self.notifier
                    .send(OutboundMessage::plain(update.chat_id, update.text.clone()));
            }
            return Outcome::Echoed {
                times: directive.remaining_repeats,
            };
        }

        self.notifier.send(
            OutboundMessage::plain(update.chat_id, update.text.clone())
                .replying_to(update.message_id),
        );
        Outcome::Echoed { times: 1 }
    }

    async fn handle_report(&self, update: &Update) -> Outcome {
        let Some(reported) = update.reply_to else {
            self.notifier.send(
                OutboundMessage::plain(update.chat_id, REPORT_NEEDS_REPLY)
                    .replying_to(update.message_id),
            );
            return Outcome::ReportNeedsReply;
        };

        let admins = match self.messenger.chat_administrators(update.chat_id).await {
            Ok(admins) => admins,
            Err(e) => {
                tracing::warn!(chat_id = update.chat_id.0, error = %e, "failed to list administrators");
                self.notifier.send(OutboundMessage::plain(
                    self.cfg.admin_chat_id,
                    report_failed_detail(&e),
                ));
                return Outcome::ReportFailed;
            }
        };

        // An empty body would be rejected by the platform.
        if admins.is_empty() {
            self.notifier.send(
                OutboundMessage::plain(update.chat_id, REPORT_NO_ADMINS)
                    .replying_to(update.message_id),
            );
            return Outcome::ReportNoAdmins;
        }

        self.notifier.send(
            OutboundMessage::plain(update.chat_id, mention_list(&admins))
                .replying_to(reported)
                .with_mode(RenderMode::Markdown),
        );
        Outcome::ReportSent {
            admins: admins.len(),
        }
    }
}
