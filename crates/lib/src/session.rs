//! Conversation context store: conversation key -> remote thread.
//!
//! Threads live on the AI backend; this store only remembers their ids for the life of
//! the process. Each thread is created lazily, at most once per key, and carries a turn
//! lock so only one run touches it at a time.
//!
//! Entries are never evicted: the store holds one small entry (a thread id and a lock) per
//! distinct chat until the process exits. Dropping an entry would start that chat over on a
//! fresh thread, so growth is bounded by the number of chats the channel serves.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OnceCell, RwLock};

use crate::llm::{AssistantBackend, AssistantsError};

/// One conversation: its backend thread (once created) and the lock serializing turns on it.
#[derive(Default)]
pub struct Conversation {
    thread_id: OnceCell<String>,
    turn: Mutex<()>,
}

impl Conversation {
    /// Thread id if it has been created.
    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.get().map(String::as_str)
    }

    /// Return the thread id, creating the thread on first use.
    /// Concurrent callers wait on one creation; a failed creation is retried by the next caller.
    pub async fn thread(&self, backend: &dyn AssistantBackend) -> Result<&str, AssistantsError> {
        let id = self
            .thread_id
            .get_or_try_init(|| async {
                let id = backend.create_thread().await?;
                log::info!("created conversation thread {}", id);
                Ok::<_, AssistantsError>(id)
            })
            .await?;
        Ok(id.as_str())
    }

    /// Hold for the whole append -> run -> read sequence.
    pub async fn lock_turn(&self) -> MutexGuard<'_, ()> {
        self.turn.lock().await
    }
}

/// In-memory map of conversation keys to conversations.
pub struct ConversationStore {
    inner: Arc<RwLock<HashMap<String, Arc<Conversation>>>>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get the conversation for a key, inserting an empty one if absent.
    pub async fn get_or_create(&self, key: &str) -> Arc<Conversation> {
        if let Some(c) = self.inner.read().await.get(key) {
            return c.clone();
        }
        self.inner
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Thread id for a key, creating the conversation and its thread as needed.
    pub async fn thread_for(
        &self,
        backend: &dyn AssistantBackend,
        key: &str,
    ) -> Result<String, AssistantsError> {
        let conversation = self.get_or_create(key).await;
        conversation.thread(backend).await.map(str::to_string)
    }

    /// Number of conversations seen (including any whose thread creation has not succeeded yet).
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    #[tokio::test]
    async fn thread_is_created_once_per_key() {
        let backend = FakeBackend::default();
        let store = ConversationStore::new();

        let a1 = store.thread_for(&backend, "chat:U1").await.unwrap();
        let a2 = store.thread_for(&backend, "chat:U1").await.unwrap();
        let b = store.thread_for(&backend, "chat:U2").await.unwrap();

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
        assert_eq!(backend.threads_created(), 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn concurrent_first_messages_share_one_thread() {
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(ConversationStore::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let backend = backend.clone();
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.thread_for(backend.as_ref(), "shared").await.unwrap()
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(backend.threads_created(), 1);
    }

    #[tokio::test]
    async fn failed_creation_is_retried() {
        let backend = FakeBackend::default();
        backend.fail_next_thread_creation();
        let store = ConversationStore::new();

        assert!(store.thread_for(&backend, "chat:U1").await.is_err());
        let conversation = store.get_or_create("chat:U1").await;
        assert!(conversation.thread_id().is_none());

        let id = store.thread_for(&backend, "chat:U1").await.unwrap();
        assert_eq!(conversation.thread_id(), Some(id.as_str()));
    }
}
