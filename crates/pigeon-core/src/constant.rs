//! Protocol constants: session types, message statuses, content types and
//! option switches.
//!
//! Content types arrive as raw integers on the wire; the notification kinds
//! live in well-known contiguous ranges that drive per-subsystem dispatch.

// ---- session types ----

/// 1-to-1 chat.
pub const SINGLE_CHAT_TYPE: i32 = 1;
/// Ordinary group chat.
pub const GROUP_CHAT_TYPE: i32 = 2;
/// Super group chat (server-paged history, per-group sequence space).
pub const SUPER_GROUP_CHAT_TYPE: i32 = 3;
/// System notification pseudo-conversation.
pub const NOTIFICATION_CHAT_TYPE: i32 = 4;

// ---- message status ----

/// Message is being sent from this device.
pub const MSG_STATUS_SENDING: i32 = 1;
/// Message accepted by the server.
pub const MSG_STATUS_SEND_SUCCESS: i32 = 2;
/// Send failed permanently.
pub const MSG_STATUS_SEND_FAILED: i32 = 3;
/// Deleted on the server side; inserted verbatim, never aggregated.
pub const MSG_STATUS_HAS_DELETED: i32 = 4;
/// Stored but invisible to conversation aggregation and listeners.
pub const MSG_STATUS_FILTERED: i32 = 5;
/// Revoked by the sender.
pub const MSG_STATUS_REVOKED: i32 = 6;

// ---- chat content types ----

pub const TEXT: i32 = 101;
pub const PICTURE: i32 = 102;
pub const VOICE: i32 = 103;
pub const VIDEO: i32 = 104;
pub const FILE: i32 = 105;
pub const AT_TEXT: i32 = 106;
pub const MERGER: i32 = 107;
pub const CARD: i32 = 108;
pub const LOCATION: i32 = 109;
pub const CUSTOM: i32 = 110;
/// Legacy revocation: content is the target client msg id as a bare string.
pub const REVOKE: i32 = 111;
/// 1-to-1 read receipt: content is a JSON array of client msg ids.
pub const HAS_READ_RECEIPT: i32 = 112;
pub const TYPING: i32 = 113;
pub const QUOTE: i32 = 114;
pub const FACE: i32 = 115;
pub const ADVANCED_TEXT: i32 = 117;
/// Modern revocation: content is a JSON `MessageRevoked`.
pub const ADVANCED_REVOKE: i32 = 118;
pub const CUSTOM_MSG_NOT_TRIGGER_CONVERSATION: i32 = 119;
pub const CUSTOM_MSG_ONLINE_ONLY: i32 = 120;
/// Group read receipt: content is a JSON array of client msg ids.
pub const GROUP_HAS_READ_RECEIPT: i32 = 121;
/// Reaction extension add/set notification.
pub const REACTION_MESSAGE_MODIFIER: i32 = 122;
/// Reaction extension delete notification.
pub const REACTION_MESSAGE_DELETER: i32 = 123;

// ---- notification content types ----
//
// Everything in [NOTIFICATION_BEGIN, NOTIFICATION_END] carries a TipsComm
// body. Subsystem ranges are open intervals: begin < t < end.

pub const NOTIFICATION_BEGIN: i32 = 1000;

pub const FRIEND_NOTIFICATION_BEGIN: i32 = 1200;
pub const FRIEND_NOTIFICATION_END: i32 = 1300;

pub const CONVERSATION_CHANGE_NOTIFICATION: i32 = 1300;

pub const USER_NOTIFICATION_BEGIN: i32 = 1301;
pub const USER_NOTIFICATION_END: i32 = 1400;

pub const OA_NOTIFICATION: i32 = 1400;

pub const GROUP_NOTIFICATION_BEGIN: i32 = 1500;
/// Delivered on the 1-to-1 session of the applicant, routed to the group
/// subsystem anyway.
pub const JOIN_GROUP_APPLICATION_NOTIFICATION: i32 = 1501;
pub const GROUP_APPLICATION_ACCEPTED_NOTIFICATION: i32 = 1505;
pub const GROUP_APPLICATION_REJECTED_NOTIFICATION: i32 = 1506;
pub const GROUP_NOTIFICATION_END: i32 = 1600;

pub const SIGNALING_NOTIFICATION_BEGIN: i32 = 1600;
pub const SIGNALING_NOTIFICATION_END: i32 = 1650;

pub const SUPER_GROUP_UPDATE_NOTIFICATION: i32 = 1700;
pub const CONVERSATION_PRIVATE_CHAT_NOTIFICATION: i32 = 1701;
pub const CONVERSATION_UNREAD_NOTIFICATION: i32 = 1702;
pub const MSG_DELETE_NOTIFICATION: i32 = 1703;

pub const WORK_MOMENT_NOTIFICATION: i32 = 1900;
pub const BUSINESS_NOTIFICATION: i32 = 2001;

pub const NOTIFICATION_END: i32 = 2100;

// ---- group @ state ----

pub const AT_NORMAL: i32 = 0;
pub const AT_ME: i32 = 1;
pub const AT_ALL: i32 = 2;
pub const AT_ALL_AT_ME: i32 = 3;

/// Reserved member id meaning "everyone" in an at-list.
pub const AT_ALL_STRING: &str = "AtAllTag";

// ---- reaction operations ----

pub const SET_MESSAGE_EXTENSIONS: i32 = 1;
pub const ADD_MESSAGE_EXTENSIONS: i32 = 2;

// ---- per-message option switches ----
//
// Absent switches default to on; see `protocol::option_switch`.

/// Persist the message into the local history.
pub const IS_HISTORY: &str = "history";
/// Allow the message to increment unread counters.
pub const IS_UNREAD_COUNT: &str = "unreadCount";
/// Allow the message to create or update its conversation.
pub const IS_CONVERSATION_UPDATE: &str = "conversationUpdate";
/// Allow a self-send echo to update the sender-side conversation.
pub const IS_SENDER_CONVERSATION_UPDATE: &str = "senderConversationUpdate";
/// Off means the message belongs to a private (burn-after-read) chat.
pub const IS_NOT_PRIVATE: &str = "notPrivate";
/// Off means the sender's other devices must not be push-notified.
pub const IS_SENDER_NOTIFICATION_PUSH: &str = "senderNotificationPush";

/// True when `t` lies in the notification content-type range.
pub fn is_notification(content_type: i32) -> bool {
    (NOTIFICATION_BEGIN..=NOTIFICATION_END).contains(&content_type)
}
