//! In-SDK caches consumed by the pipeline.
//!
//! The conversation cache is maintained by the conversation subsystem; the
//! pipeline only reads it (for the unread watermark). Metadata lookups may
//! fall back to a remote fetch, so that trait is async.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::conversation::LocalConversation;
use crate::error::Result;

/// Read-through cache of conversation rows.
///
/// Missing entries read as a zero-value conversation, matching a store miss.
#[derive(Default)]
pub struct ConversationCache {
    inner: RwLock<HashMap<String, LocalConversation>>,
}

impl ConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one conversation; zero-value when absent.
    pub fn get(&self, conversation_id: &str) -> LocalConversation {
        let guard = match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.get(conversation_id).cloned().unwrap_or_else(|| {
            LocalConversation {
                conversation_id: conversation_id.to_string(),
                ..Default::default()
            }
        })
    }

    /// Replace one cached row. Called by the owning conversation subsystem,
    /// never by the pipeline.
    pub fn update(&self, conversation: LocalConversation) {
        let mut guard = match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(conversation.conversation_id.clone(), conversation);
    }

    /// Replace the whole cache from a fresh store read.
    pub fn replace_all(&self, conversations: Vec<LocalConversation>) {
        let mut guard = match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clear();
        for c in conversations {
            guard.insert(c.conversation_id.clone(), c);
        }
    }
}

/// Display snapshot of a user.
#[derive(Debug, Clone, Default)]
pub struct UserSnapshot {
    pub name: String,
    pub face_url: String,
}

/// Display snapshot of a group, including which group flavour it is.
#[derive(Debug, Clone, Default)]
pub struct GroupSnapshot {
    pub group_id: String,
    pub name: String,
    pub face_url: String,
    pub session_type: i32,
}

/// User/group metadata, read through the SDK cache with remote fall-back.
#[async_trait]
pub trait MetadataCache: Send + Sync {
    async fn user_snapshot(&self, user_id: &str) -> Result<UserSnapshot>;
    async fn group_snapshot(&self, group_id: &str) -> Result<GroupSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_conversation_reads_zero() {
        let cache = ConversationCache::new();
        let c = cache.get("single_u1");
        assert_eq!(c.conversation_id, "single_u1");
        assert_eq!(c.update_unread_count_time, 0);
    }

    #[test]
    fn test_update_then_get() {
        let cache = ConversationCache::new();
        cache.update(LocalConversation {
            conversation_id: "c1".to_string(),
            update_unread_count_time: 500,
            ..Default::default()
        });
        assert_eq!(cache.get("c1").update_unread_count_time, 500);
    }
}
