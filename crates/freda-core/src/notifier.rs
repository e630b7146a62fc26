use std::sync::Arc;

use tokio_util::task::TaskTracker;

use crate::messaging::{port::MessagingPort, types::OutboundMessage};

/// Best-effort, fire-and-forget delivery of outbound messages.
///
/// Every send runs on its own task; failures are logged and dropped, never
/// retried or reported back to the caller.
#[derive(Clone)]
pub struct Notifier {
    messenger: Arc<dyn MessagingPort>,
    tasks: TaskTracker,
}

impl Notifier {
    pub fn new(messenger: Arc<dyn MessagingPort>) -> Self {
        Self {
            messenger,
            tasks: TaskTracker::new(),
        }
    }

    pub fn send(&self, msg: OutboundMessage) {
        let messenger = self.messenger.clone();
        self.tasks.spawn(async move {
            deliver(messenger.as_ref(), &msg).await;
        });
    }

    /// Deliver `msgs` one after another on a single background task.
    pub fn send_in_order(&self, msgs: Vec<OutboundMessage>) {
        let messenger = self.messenger.clone();
        self.tasks.spawn(async move {
            for msg in &msgs {
                deliver(messenger.as_ref(), msg).await;
            }
        });
    }

    /// Wait until every send spawned so far has finished.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}

async fn deliver(messenger: &dyn MessagingPort, msg: &OutboundMessage) {
    if let Err(e) = messenger.send_message(msg).await {
        tracing::debug!(chat_id = msg.chat_id.0, error = %e, "outbound message dropped");
    }
}
