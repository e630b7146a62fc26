//! Process-wide mutable state shared by concurrently handled updates.
//!
//! Nothing here survives a restart.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex,
    },
};

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::ChatId;

/// Pending `/repeat` instruction for one chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepeatDirective {
    pub remaining_repeats: u32,
    pub active: bool,
}

impl RepeatDirective {
    pub fn armed(times: u32) -> Self {
        Self {
            remaining_repeats: times.max(1),
            active: true,
        }
    }
}

impl Default for RepeatDirective {
    fn default() -> Self {
        Self {
            remaining_repeats: 1,
            active: false,
        }
    }
}

/// Per-chat repeat directives.
///
/// Chats that never issued `/repeat` have no entry and read as the default.
#[derive(Debug, Default)]
pub struct RepeatStore {
    inner: Mutex<HashMap<ChatId, RepeatDirective>>,
}

impl RepeatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, chat_id: ChatId) -> RepeatDirective {
        self.inner
            .lock()
            .await
            .get(&chat_id)
            .copied()
            .unwrap_or_default()
    }

    pub async fn set(&self, chat_id: ChatId, directive: RepeatDirective) {
        self.inner.lock().await.insert(chat_id, directive);
    }

    /// Read the chat's directive and reset it to the default in one step.
    ///
    /// An active directive is observed by exactly one caller.
    pub async fn consume(&self, chat_id: ChatId) -> RepeatDirective {
        let mut map = self.inner.lock().await;
        match map.get_mut(&chat_id) {
            Some(slot) => std::mem::take(slot),
            None => RepeatDirective::default(),
        }
    }
}

/// Admin switch: when set, the next forwarded post is not persisted.
#[derive(Debug, Default)]
pub struct IgnoreFlag {
    inner: AtomicBool,
}

impl IgnoreFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }

    /// Flip the flag, returning the new value.
    pub fn toggle(&self) -> bool {
        !self.inner.fetch_xor(true, Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.inner.swap(false, Ordering::SeqCst)
    }
}

/// One async lock per chat, so updates from the same chat never interleave
/// their read-decide-reset sequences.
///
/// A chat's entry is dropped once nobody holds or waits for its lock.
#[derive(Debug, Default)]
pub struct ChatLocks {
    // Never held across an await.
    inner: StdMutex<HashMap<ChatId, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: ChatId) -> ChatGuard<'_> {
        let lock = {
            let mut map = self.map();
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        ChatGuard {
            locks: self,
            chat_id,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of chats with a live lock entry.
    pub fn tracked_chats(&self) -> usize {
        self.map().len()
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<ChatId, Arc<Mutex<()>>>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn release(&self, chat_id: ChatId) {
        let mut map = self.map();
        // Waiters clone the Arc under this same map lock, so a count of one
        // means only the map still refers to it.
        if map
            .get(&chat_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&chat_id);
        }
    }
}

/// Held while a chat's update is being handled.
pub struct ChatGuard<'a> {
    locks: &'a ChatLocks,
    chat_id: ChatId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ChatGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(self.chat_id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn unknown_chats_read_as_default() {
        let store = RepeatStore::new();
        for id in [0, 1, -100_123, i64::MAX] {
            assert_eq!(store.get(ChatId(id)).await, RepeatDirective::default());
        }
        assert_eq!(
            RepeatDirective::default(),
            RepeatDirective {
                remaining_repeats: 1,
                active: false
            }
        );
    }

    #[tokio::test]
    async fn consume_returns_directive_then_resets() {
        let store = RepeatStore::new();
        let chat = ChatId(5);
        store.set(chat, RepeatDirective::armed(4)).await;

        assert_eq!(store.consume(chat).await, RepeatDirective::armed(4));
        assert_eq!(store.get(chat).await, RepeatDirective::default());
        assert_eq!(store.consume(chat).await, RepeatDirective::default());
    }

    #[tokio::test]
    async fn set_overwrites_previous_directive() {
        let store = RepeatStore::new();
        let chat = ChatId(5);
        store.set(chat, RepeatDirective::armed(4)).await;
        store.set(chat, RepeatDirective::armed(2)).await;
        assert_eq!(store.get(chat).await, RepeatDirective::armed(2));
        // Other chats are unaffected.
        assert_eq!(store.get(ChatId(6)).await, RepeatDirective::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumers_see_an_active_directive_once() {
        let store = Arc::new(RepeatStore::new());
        let chat = ChatId(9);

        for _ in 0..50 {
            store.set(chat, RepeatDirective::armed(3)).await;

            let mut handles = Vec::new();
            for _ in 0..8 {
                let store = store.clone();
                handles.push(tokio::spawn(async move { store.consume(chat).await }));
            }

            let mut active = 0;
            for h in handles {
                if h.await.unwrap().active {
                    active += 1;
                }
            }
            assert_eq!(active, 1);
        }
    }

    #[test]
    fn ignore_flag_toggles_and_takes() {
        let flag = IgnoreFlag::new();
        assert!(!flag.is_set());
        assert!(flag.toggle());
        assert!(flag.is_set());
        assert!(!flag.toggle());
        assert!(!flag.is_set());

        flag.toggle();
        assert!(flag.take());
        assert!(!flag.take());
        assert!(!flag.is_set());
    }

    #[tokio::test]
    async fn chat_lock_serializes_same_chat_only() {
        let locks = Arc::new(ChatLocks::default());
        let held = locks.lock_chat(ChatId(1)).await;

        // A different chat is not blocked.
        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(ChatId(2)))
            .await;
        assert!(other.is_ok());

        // The same chat waits until the guard is dropped.
        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(ChatId(1)))
            .await;
        assert!(same.is_err());

        drop(held);
        let again = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(ChatId(1)))
            .await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn idle_chat_locks_are_forgotten() {
        let locks = Arc::new(ChatLocks::default());

        for id in 0..100 {
            let _guard = locks.lock_chat(ChatId(id)).await;
        }
        assert_eq!(locks.tracked_chats(), 0);

        // An entry with a waiter survives the holder's release.
        let held = locks.lock_chat(ChatId(1)).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock_chat(ChatId(1)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert!(locks.tracked_chats() <= 1);

        waiter.await.unwrap();
        assert_eq!(locks.tracked_chats(), 0);
    }
}
