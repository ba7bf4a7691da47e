//! Per-batch conversation aggregation.
//!
//! The batch folds into in-memory maps first; the store is touched once per
//! batch, not once per message. The fold is insertion-order independent with
//! respect to which message wins "latest" (strict greater-than, first winner
//! holds on ties).

use std::collections::HashMap;

use tracing::warn;

use crate::constant;
use crate::conversation::LocalConversation;
use crate::error::Result;
use crate::message::Message;

use super::MessagePipeline;

/// Fold one generated conversation into the per-batch set.
pub(crate) fn fold_conversation(
    lc: LocalConversation,
    set: &mut HashMap<String, LocalConversation>,
) {
    match set.get_mut(&lc.conversation_id) {
        None => {
            set.insert(lc.conversation_id.clone(), lc);
        }
        Some(old) => {
            old.unread_count += lc.unread_count;
            if lc.latest_msg_send_time > old.latest_msg_send_time {
                old.latest_msg = lc.latest_msg;
                old.latest_msg_send_time = lc.latest_msg_send_time;
            }
        }
    }
}

/// Derive the group @-state a message implies for its conversation.
pub(crate) fn group_at_annotation(msg: &Message, login_user_id: &str) -> i32 {
    if msg.content_type != constant::AT_TEXT {
        return constant::AT_NORMAL;
    }
    let Some(at) = &msg.at_elem else {
        return constant::AT_NORMAL;
    };
    let tag_me = at.at_user_list.iter().any(|u| u == login_user_id);
    let tag_all = at.at_user_list.iter().any(|u| u == constant::AT_ALL_STRING);
    if tag_all && tag_me {
        constant::AT_ALL_AT_ME
    } else if tag_all {
        constant::AT_ALL
    } else if tag_me {
        constant::AT_ME
    } else {
        constant::AT_NORMAL
    }
}

/// Overlay user-hidden conversations onto the new set: a hidden conversation
/// re-created by this batch keeps its user-configured flags and is treated as
/// changed, not new.
pub(crate) fn apply_hidden_overlay(
    hidden: &[LocalConversation],
    new_set: &mut HashMap<String, LocalConversation>,
) -> HashMap<String, LocalConversation> {
    let mut changed = HashMap::new();
    for h in hidden {
        if let Some(mut nc) = new_set.remove(&h.conversation_id) {
            nc.recv_msg_opt = h.recv_msg_opt;
            nc.group_at_type = h.group_at_type;
            nc.is_pinned = h.is_pinned;
            nc.is_private_chat = h.is_private_chat;
            if nc.is_private_chat {
                nc.burn_duration = h.burn_duration;
            }
            nc.is_not_in_group = h.is_not_in_group;
            nc.attached_info = h.attached_info.clone();
            nc.ex = h.ex.clone();
            changed.insert(h.conversation_id.clone(), nc);
        }
    }
    changed
}

/// Sorted list form of a conversation map, for stable batch writes and JSON
/// payloads.
pub(crate) fn map_conversations_to_list(
    set: &HashMap<String, LocalConversation>,
) -> Vec<LocalConversation> {
    let mut list: Vec<LocalConversation> = set.values().cloned().collect();
    list.sort_by(|a, b| a.conversation_id.cmp(&b.conversation_id));
    list
}

impl MessagePipeline {
    /// Split the generated set against the local store: conversations that
    /// exist merge into the changed set, the rest become new rows with their
    /// display metadata filled from the cache.
    pub(crate) async fn diff_against_store(
        &self,
        generated: HashMap<String, LocalConversation>,
    ) -> (
        HashMap<String, LocalConversation>,
        HashMap<String, LocalConversation>,
    ) {
        let local_list = match self.db.get_all_conversation_list() {
            Ok(list) => list,
            Err(e) => {
                tracing::error!(error = %e, "failed to load conversation list");
                Vec::new()
            }
        };
        let local: HashMap<String, LocalConversation> = local_list
            .into_iter()
            .map(|c| (c.conversation_id.clone(), c))
            .collect();

        let mut changed = HashMap::new();
        let mut fresh = HashMap::new();
        for (id, v) in generated {
            match local.get(&id) {
                Some(existing) => {
                    let mut c = existing.clone();
                    c.unread_count += v.unread_count;
                    if v.latest_msg_send_time > c.latest_msg_send_time {
                        c.latest_msg = v.latest_msg;
                        c.latest_msg_send_time = v.latest_msg_send_time;
                    }
                    changed.insert(id, c);
                }
                None => {
                    let mut v = v;
                    if let Err(e) = self.add_face_url_and_name(&mut v).await {
                        warn!(
                            conversation_id = %v.conversation_id,
                            error = %e,
                            "failed to resolve display metadata"
                        );
                    }
                    fresh.insert(id, v);
                }
            }
        }
        (changed, fresh)
    }

    /// Fill show-name and face-url for a brand new conversation.
    async fn add_face_url_and_name(&self, lc: &mut LocalConversation) -> Result<()> {
        match lc.conversation_type {
            constant::SINGLE_CHAT_TYPE | constant::NOTIFICATION_CHAT_TYPE => {
                let user = self.metadata_cache.user_snapshot(&lc.user_id).await?;
                lc.show_name = user.name;
                lc.face_url = user.face_url;
            }
            constant::GROUP_CHAT_TYPE | constant::SUPER_GROUP_CHAT_TYPE => {
                let group = self.metadata_cache.group_snapshot(&lc.group_id).await?;
                lc.show_name = group.name;
                lc.face_url = group.face_url;
            }
            _ => {}
        }
        Ok(())
    }
}
