//! Conversation aggregate model.
//!
//! One row per chat thread, derived entirely from the message log. The
//! pipeline creates conversations on first qualifying inbound message and
//! updates them on every qualifying batch; it never deletes them.

use serde::{Deserialize, Serialize};

use crate::constant;

/// Derive the deterministic conversation id for a peer or group.
pub fn conversation_id_by_session_type(source_id: &str, session_type: i32) -> String {
    match session_type {
        constant::GROUP_CHAT_TYPE => format!("group_{}", source_id),
        constant::SUPER_GROUP_CHAT_TYPE => format!("super_group_{}", source_id),
        constant::NOTIFICATION_CHAT_TYPE => format!("notification_{}", source_id),
        _ => format!("single_{}", source_id),
    }
}

/// The derived conversation row.
///
/// A conversation with `latest_msg_send_time == 0` is *hidden*: suppressed
/// from the active list while retaining its user-configured flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalConversation {
    pub conversation_id: String,
    pub conversation_type: i32,
    /// Peer user id for 1-to-1 and notification conversations.
    pub user_id: String,
    /// Group id for group-typed conversations.
    pub group_id: String,
    pub show_name: String,
    pub face_url: String,
    pub recv_msg_opt: i32,
    pub unread_count: i32,
    pub group_at_type: i32,
    /// JSON snapshot of the latest visible message.
    pub latest_msg: String,
    pub latest_msg_send_time: i64,
    pub draft_text: String,
    pub draft_text_time: i64,
    pub is_pinned: bool,
    pub is_private_chat: bool,
    pub burn_duration: i32,
    pub is_not_in_group: bool,
    /// Read watermark: a message with `send_time <=` this can never
    /// increment the unread count.
    pub update_unread_count_time: i64,
    pub attached_info: String,
    pub ex: String,
}

impl LocalConversation {
    /// Whether this row is user-hidden.
    pub fn is_hidden(&self) -> bool {
        self.latest_msg_send_time == 0
    }
}

/// One row per message that actually contributed an unread increment.
/// Invalidated as a contiguous prefix when the read watermark advances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationUnreadMessage {
    pub conversation_id: String,
    pub client_msg_id: String,
    pub send_time: i64,
}
