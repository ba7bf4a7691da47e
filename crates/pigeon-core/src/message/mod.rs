//! Decoded message view.
//!
//! [`Message`] is the unit everything after the wire boundary works on: the
//! raw attributes of a [`crate::protocol::MsgData`] plus typed element fields
//! populated by the content decoder. Its JSON form is what conversation
//! snapshots and listener payloads carry.

mod decode;
mod elements;

pub use decode::ContentDecoder;
pub use elements::{
    AtElem, AttachedInfo, CustomElem, FaceElem, FileElem, GroupHasReadInfo, KeyValue,
    LocationElem, MergeElem, MessageEntity, MessageEntityElem, MessageReceipt, MessageRevoked,
    NotificationElem, PictureBaseInfo, PictureElem, QuoteElem,
    ReactionMessageDeleteNotification, ReactionMessageModifierNotification, SoundElem, VideoElem,
};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::MsgData;

/// Offline push hints in their JSON form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfflinePush {
    pub title: String,
    pub desc: String,
    pub ex: String,
    pub ios_push_sound: String,
    pub ios_badge_count: bool,
}

/// A fully decoded message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Message {
    pub client_msg_id: String,
    pub server_msg_id: String,
    pub create_time: i64,
    pub send_time: i64,
    pub session_type: i32,
    pub send_id: String,
    pub recv_id: String,
    pub msg_from: i32,
    pub content_type: i32,
    pub sender_platform_id: i32,
    pub sender_nickname: String,
    pub sender_face_url: String,
    pub group_id: String,
    /// Raw body as text. For the notification range the protobuf body stays
    /// on the wire struct; this holds a lossy text view only.
    pub content: String,
    pub seq: i64,
    pub is_read: bool,
    pub status: i32,
    pub offline_push: OfflinePush,
    /// JSON mirror of `attached_info_elem`; kept in sync via
    /// [`Message::sync_attached_info`].
    pub attached_info: String,
    pub ex: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture_elem: Option<PictureElem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_elem: Option<SoundElem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_elem: Option<VideoElem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_elem: Option<FileElem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_elem: Option<AtElem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_elem: Option<LocationElem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_elem: Option<CustomElem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_elem: Option<QuoteElem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_elem: Option<MergeElem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_elem: Option<FaceElem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_entity_elem: Option<MessageEntityElem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_elem: Option<NotificationElem>,

    pub attached_info_elem: AttachedInfo,
}

impl Message {
    /// Lift a wire message into the decoded view. Element fields stay empty
    /// until the content decoder runs.
    pub fn from_wire(v: &MsgData) -> Self {
        Self {
            client_msg_id: v.client_msg_id.clone(),
            server_msg_id: v.server_msg_id.clone(),
            create_time: v.create_time,
            send_time: v.send_time,
            session_type: v.session_type,
            send_id: v.send_id.clone(),
            recv_id: v.recv_id.clone(),
            msg_from: v.msg_from,
            content_type: v.content_type,
            sender_platform_id: v.sender_platform_id,
            sender_nickname: v.sender_nickname.clone(),
            sender_face_url: v.sender_face_url.clone(),
            group_id: v.group_id.clone(),
            content: String::from_utf8_lossy(&v.content).into_owned(),
            seq: v.seq,
            is_read: false,
            status: v.status,
            offline_push: v
                .offline_push_info
                .as_ref()
                .map(|p| OfflinePush {
                    title: p.title.clone(),
                    desc: p.desc.clone(),
                    ex: p.ex.clone(),
                    ios_push_sound: p.ios_push_sound.clone(),
                    ios_badge_count: p.ios_badge_count,
                })
                .unwrap_or_default(),
            attached_info: v.attached_info.clone(),
            ex: v.ex.clone(),
            ..Default::default()
        }
    }

    /// Re-serialize `attached_info_elem` into the `attached_info` string.
    pub fn sync_attached_info(&mut self) -> Result<()> {
        self.attached_info = serde_json::to_string(&self.attached_info_elem)?;
        Ok(())
    }

    /// JSON snapshot used for conversation latest-message fields and
    /// listener payloads.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
