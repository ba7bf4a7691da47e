//! Server wire structures.
//!
//! Inbound message batches arrive protobuf-framed from the long-lived
//! connection manager or the history syncer; the structs here mirror the
//! server schema field-for-field. Everything downstream of the decoder works
//! on [`crate::message::Message`] instead.

use std::collections::HashMap;

/// One server message as pushed or synced.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MsgData {
    /// Sender user id.
    #[prost(string, tag = "1")]
    pub send_id: String,
    /// Receiver user id; for group-typed sessions this is unused and
    /// `group_id` is authoritative.
    #[prost(string, tag = "2")]
    pub recv_id: String,
    /// Group id for group-typed sessions.
    #[prost(string, tag = "3")]
    pub group_id: String,
    /// Client-generated globally unique id; the canonical dedupe key.
    #[prost(string, tag = "4")]
    pub client_msg_id: String,
    /// Server id assigned on accept.
    #[prost(string, tag = "5")]
    pub server_msg_id: String,
    #[prost(int32, tag = "6")]
    pub sender_platform_id: i32,
    #[prost(string, tag = "7")]
    pub sender_nickname: String,
    #[prost(string, tag = "8")]
    pub sender_face_url: String,
    #[prost(int32, tag = "9")]
    pub session_type: i32,
    #[prost(int32, tag = "10")]
    pub msg_from: i32,
    #[prost(int32, tag = "11")]
    pub content_type: i32,
    /// Type-specific body: JSON for chat elements, TipsComm bytes for the
    /// notification range.
    #[prost(bytes = "vec", tag = "12")]
    pub content: Vec<u8>,
    /// Per-conversation monotone sequence number; 0 means accepted but not
    /// yet sequenced.
    #[prost(int64, tag = "14")]
    pub seq: i64,
    /// Server-stamped send time, milliseconds.
    #[prost(int64, tag = "15")]
    pub send_time: i64,
    #[prost(int64, tag = "16")]
    pub create_time: i64,
    #[prost(int32, tag = "17")]
    pub status: i32,
    /// Behaviour switches; an absent key counts as on.
    #[prost(map = "string, bool", tag = "18")]
    pub options: HashMap<String, bool>,
    #[prost(message, optional, tag = "19")]
    pub offline_push_info: Option<OfflinePushInfo>,
    /// JSON blob of receipts, reactions and encryption flags.
    #[prost(string, tag = "21")]
    pub attached_info: String,
    #[prost(string, tag = "22")]
    pub ex: String,
}

/// Offline push presentation hints attached by the sender.
#[derive(Clone, PartialEq, prost::Message)]
pub struct OfflinePushInfo {
    #[prost(string, tag = "1")]
    pub title: String,
    #[prost(string, tag = "2")]
    pub desc: String,
    #[prost(string, tag = "3")]
    pub ex: String,
    #[prost(string, tag = "4")]
    pub ios_push_sound: String,
    #[prost(bool, tag = "5")]
    pub ios_badge_count: bool,
}

/// Body of every notification-range message. The subsystem-specific payload
/// rides in `detail`; `json_detail` is its JSON rendering for listeners.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TipsComm {
    #[prost(bytes = "vec", tag = "1")]
    pub detail: Vec<u8>,
    /// Fallback text for clients that cannot render `json_detail`.
    #[prost(string, tag = "2")]
    pub default_tips: String,
    #[prost(string, tag = "3")]
    pub json_detail: String,
}

/// Body of a `CONVERSATION_UNREAD_NOTIFICATION`: the server-side read
/// watermark advanced for the listed conversations.
#[derive(Clone, PartialEq, prost::Message)]
pub struct ConversationUpdateTips {
    #[prost(string, repeated, tag = "1")]
    pub conversation_id_list: Vec<String>,
    #[prost(int64, tag = "2")]
    pub update_unread_count_time: i64,
}

/// Read an option switch. Servers omit switches that are on, so a missing
/// key reads as true.
pub fn option_switch(options: &HashMap<String, bool>, key: &str) -> bool {
    options.get(key).copied().unwrap_or(true)
}
