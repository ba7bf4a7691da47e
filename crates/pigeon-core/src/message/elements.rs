//! Typed content elements and embedded JSON payloads.
//!
//! Every chat content type maps to one element struct; the decoder fills
//! exactly one of them. Field names follow the wire JSON (camelCase).

use serde::{Deserialize, Serialize};

use super::Message;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PictureBaseInfo {
    pub uuid: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: i64,
    pub width: i32,
    pub height: i32,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PictureElem {
    pub source_path: String,
    pub source_picture: PictureBaseInfo,
    pub big_picture: PictureBaseInfo,
    pub snapshot_picture: PictureBaseInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoundElem {
    pub uuid: String,
    pub sound_path: String,
    pub source_url: String,
    pub data_size: i64,
    pub duration: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoElem {
    pub video_path: String,
    pub video_uuid: String,
    pub video_url: String,
    pub video_type: String,
    pub video_size: i64,
    pub duration: i64,
    pub snapshot_path: String,
    pub snapshot_uuid: String,
    pub snapshot_size: i64,
    pub snapshot_url: String,
    pub snapshot_width: i32,
    pub snapshot_height: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileElem {
    pub file_path: String,
    pub uuid: String,
    pub source_url: String,
    pub file_name: String,
    pub file_size: i64,
}

/// `@`-mention text. `is_at_self` is derived locally, never sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AtElem {
    pub text: String,
    pub at_user_list: Vec<String>,
    pub is_at_self: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationElem {
    pub description: String,
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomElem {
    pub data: String,
    pub description: String,
    pub extension: String,
}

/// Quoted reply. The quoted message is a full message snapshot; revocation of
/// the target rewrites it in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteElem {
    pub text: String,
    pub quote_message: Option<Box<Message>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MergeElem {
    pub title: String,
    pub abstract_list: Vec<String>,
    pub multi_message: Vec<Message>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FaceElem {
    pub index: i32,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: i32,
    pub length: i32,
    pub url: String,
    pub ex: String,
}

/// Rich text with inline entities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageEntityElem {
    pub text: String,
    pub message_entity_list: Vec<MessageEntity>,
}

/// Decoded notification-range body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationElem {
    pub detail: String,
    pub default_tips: String,
}

/// Group read-receipt aggregate kept on the message row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupHasReadInfo {
    pub has_read_user_id_list: Vec<String>,
    pub has_read_count: i32,
}

/// One reaction extension entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyValue {
    pub type_key: String,
    pub value: String,
    pub latest_update_time: i64,
}

/// The message-level attached-info blob (stored as JSON on the row).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttachedInfo {
    pub group_has_read_info: GroupHasReadInfo,
    pub is_private_chat: bool,
    pub burn_duration: i32,
    pub has_read_time: i64,
    pub not_sender_notification_push: bool,
    pub is_encryption: bool,
    pub in_encrypt_status: bool,
    pub reaction_extension_list: Vec<KeyValue>,
}

/// Body of an `ADVANCED_REVOKE` message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageRevoked {
    pub revoker_id: String,
    pub revoker_role: i32,
    pub client_msg_id: String,
    pub revoker_nickname: String,
    pub revoke_time: i64,
    pub source_message_send_time: i64,
    pub source_message_send_id: String,
    pub source_message_sender_nickname: String,
    pub session_type: i32,
    pub seq: i64,
}

/// Consolidated read receipt surfaced to listeners.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageReceipt {
    pub user_id: String,
    pub group_id: String,
    pub msg_id_list: Vec<String>,
    pub read_time: i64,
    pub msg_from: i32,
    pub content_type: i32,
    pub session_type: i32,
}

/// Body of a `REACTION_MESSAGE_MODIFIER` message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReactionMessageModifierNotification {
    pub client_msg_id: String,
    pub session_type: i32,
    pub source_id: String,
    pub operation: i32,
    pub success_reaction_extension_list: Vec<KeyValue>,
    pub is_external_extensions: bool,
    pub is_react: bool,
    pub msg_first_modify_time: i64,
}

/// Body of a `REACTION_MESSAGE_DELETER` message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReactionMessageDeleteNotification {
    pub client_msg_id: String,
    pub session_type: i32,
    pub source_id: String,
    pub success_reaction_extension_list: Vec<KeyValue>,
}
