use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{ChatAdministrator, OutboundMessage},
    },
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* Telegram API calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat (Telegram 1 msg/sec style limits).
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// MessagingPort decorator that rate-limits outbound calls.
///
/// `/repeat` can fan one update out into dozens of sends to the same chat; spacing
/// them keeps the bot under Telegram's flood limits instead of collecting 429s.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<i64, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: i64) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        if !map.contains_key(&chat_id) {
            // A limiter whose slot is already in the past behaves like a fresh one.
            let now = Instant::now();
            map.retain(|_, lim| {
                Arc::strong_count(lim) > 1 || lim.try_lock().map_or(true, |l| l.next > now)
            });
        }
        map.entry(chat_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat_id: i64) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }

    async fn throttle_global(&self) {
        let wait = { self.global.lock().await.reserve() };
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    async fn send_message(&self, msg: &OutboundMessage) -> Result<MessageRef> {
        self.throttle_chat(msg.chat_id.0).await;
        self.inner.send_message(msg).await
    }

    async fn chat_administrators(&self, chat_id: ChatId) -> Result<Vec<ChatAdministrator>> {
        // Read-only lookup; only the global budget applies.
        self.throttle_global().await;
        self.inner.chat_administrators(chat_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::MessageId;

    #[derive(Default)]
    struct StampingMessenger {
        sent_at: StdMutex<Vec<(i64, Instant)>>,
    }

    #[async_trait]
    impl MessagingPort for StampingMessenger {
        async fn send_message(&self, msg: &OutboundMessage) -> Result<MessageRef> {
            self.sent_at
                .lock()
                .unwrap()
                .push((msg.chat_id.0, Instant::now()));
            Ok(MessageRef {
                chat_id: msg.chat_id,
                message_id: MessageId(1),
            })
        }

        async fn chat_administrators(&self, _chat_id: ChatId) -> Result<Vec<ChatAdministrator>> {
            Ok(vec![])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn spaces_sends_to_the_same_chat() {
        let inner = Arc::new(StampingMessenger::default());
        let throttled = ThrottledMessenger::new(
            inner.clone(),
            ThrottleConfig {
                global_min_interval: Duration::from_millis(10),
                per_chat_min_interval: Duration::from_millis(500),
            },
        );

        for _ in 0..3 {
            throttled
                .send_message(&OutboundMessage::plain(ChatId(7), "hi"))
                .await
                .unwrap();
        }
        throttled
            .send_message(&OutboundMessage::plain(ChatId(8), "other chat"))
            .await
            .unwrap();

        let stamps = inner.sent_at.lock().unwrap().clone();
        assert_eq!(stamps.len(), 4);
        assert!(stamps[1].1 - stamps[0].1 >= Duration::from_millis(500));
        assert!(stamps[2].1 - stamps[1].1 >= Duration::from_millis(500));
        // A different chat only waits on the global interval.
        assert!(stamps[3].1 - stamps[2].1 < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_chat_limiters_are_dropped() {
        let inner = Arc::new(StampingMessenger::default());
        let throttled = ThrottledMessenger::new(
            inner,
            ThrottleConfig {
                global_min_interval: Duration::from_millis(1),
                per_chat_min_interval: Duration::from_millis(100),
            },
        );

        for chat in 0..20 {
            throttled
                .send_message(&OutboundMessage::plain(ChatId(chat), "hi"))
                .await
                .unwrap();
        }
        assert!(throttled.per_chat.lock().await.len() > 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        throttled
            .send_message(&OutboundMessage::plain(ChatId(999), "hi"))
            .await
            .unwrap();
        assert_eq!(throttled.per_chat.lock().await.len(), 1);
    }
}
