//! Classifier and deduper.
//!
//! One pass over the batch decides, per message, exactly one outcome:
//! new / update / special-update / duplicate / exception. Control messages
//! short-circuit into the notification router before classification.

use std::collections::HashMap;

use prost::Message as _;
use tracing::{debug, error, warn};

use crate::command::{ConversationCommand, MsgBatch};
use crate::constant;
use crate::conversation::{
    conversation_id_by_session_type, ConversationUnreadMessage, LocalConversation,
};
use crate::message::Message;
use crate::notification::RouteOutcome;
use crate::protocol::{option_switch, ConversationUpdateTips, MsgData, TipsComm};
use crate::storage::{ChatLog, ErrChatLog};

use super::aggregate::{fold_conversation, group_at_annotation};
use super::policy::PathPolicy;
use super::MessagePipeline;

/// Everything one classification pass produced, bucketed for the committer
/// and the post-commit dispatchers.
#[derive(Default)]
pub(crate) struct BatchBuckets {
    pub insert: Vec<ChatLog>,
    pub update: Vec<ChatLog>,
    pub special_update: Vec<ChatLog>,
    pub exception: Vec<ErrChatLog>,
    pub unread_rows: Vec<ConversationUnreadMessage>,
    pub new_messages: Vec<Message>,
    pub read_receipts: Vec<Message>,
    pub group_read_receipts: Vec<Message>,
    pub revoke_legacy: Vec<Message>,
    pub revoke_advanced: Vec<Message>,
    pub reaction_modifiers: Vec<Message>,
    pub reaction_deleters: Vec<Message>,
    /// Conversations generated from this batch, keyed by conversation id.
    pub generated: HashMap<String, LocalConversation>,
    /// Whether any message incremented an unread counter.
    pub unread_triggered: bool,
}

/// Per-message option switches, read once up front.
struct Switches {
    history: bool,
    unread_count: bool,
    conversation_update: bool,
    sender_conversation_update: bool,
    not_private: bool,
    sender_notification_push: bool,
}

impl Switches {
    fn of(v: &MsgData) -> Self {
        Self {
            history: option_switch(&v.options, constant::IS_HISTORY),
            unread_count: option_switch(&v.options, constant::IS_UNREAD_COUNT),
            conversation_update: option_switch(&v.options, constant::IS_CONVERSATION_UPDATE),
            sender_conversation_update: option_switch(
                &v.options,
                constant::IS_SENDER_CONVERSATION_UPDATE,
            ),
            not_private: option_switch(&v.options, constant::IS_NOT_PRIVATE),
            sender_notification_push: option_switch(
                &v.options,
                constant::IS_SENDER_NOTIFICATION_PUSH,
            ),
        }
    }
}

impl MessagePipeline {
    pub(crate) async fn classify_batch(
        &self,
        batches: &[MsgBatch],
        policy: &PathPolicy,
    ) -> BatchBuckets {
        let mut buckets = BatchBuckets::default();
        for batch in batches {
            for v in &batch.msgs {
                self.classify_message(v, policy, &mut buckets).await;
            }
        }
        buckets
    }

    async fn classify_message(&self, v: &MsgData, policy: &PathPolicy, buckets: &mut BatchBuckets) {
        let switches = Switches::of(v);
        let mut msg = Message::from_wire(v);

        // server-deleted rows are mirrored verbatim, nothing else happens
        if msg.status == constant::MSG_STATUS_HAS_DELETED {
            buckets.insert.push(ChatLog::from_message(&msg));
            return;
        }
        msg.status = constant::MSG_STATUS_SEND_SUCCESS;
        msg.is_read = false;

        if let Err(e) = self.decoder.decode(v, &mut msg) {
            error!(
                content_type = msg.content_type,
                client_msg_id = %msg.client_msg_id,
                error = %e,
                "failed to decode message body"
            );
            return;
        }

        if !switches.sender_notification_push {
            msg.attached_info_elem.not_sender_notification_push = true;
            if let Err(e) = msg.sync_attached_info() {
                warn!(error = %e, "failed to stamp attached info");
            }
        }
        if !switches.not_private {
            msg.attached_info_elem.is_private_chat = true;
            if let Err(e) = msg.sync_attached_info() {
                warn!(error = %e, "failed to stamp attached info");
            }
        }

        if msg.client_msg_id.is_empty() {
            buckets.exception.push(ErrChatLog::from_message(&msg));
            return;
        }

        // control short-circuits, before the sender/receiver split
        match v.content_type {
            constant::CONVERSATION_CHANGE_NOTIFICATION
            | constant::CONVERSATION_PRIVATE_CHAT_NOTIFICATION => {
                self.router.notify_conversation(v).await;
            }
            constant::MSG_DELETE_NOTIFICATION => {}
            constant::SUPER_GROUP_UPDATE_NOTIFICATION => {
                self.router.notify_super_group(v).await;
                return;
            }
            constant::CONVERSATION_UNREAD_NOTIFICATION => {
                self.apply_read_watermark(v).await;
                return;
            }
            constant::BUSINESS_NOTIFICATION => {
                self.router.notify_business(v).await;
                return;
            }
            _ => {}
        }

        if self.router.route_session(v).await == RouteOutcome::Consumed {
            return;
        }

        if msg.send_id == self.config.login_user_id {
            self.classify_own_echo(msg, &switches, policy, buckets);
        } else {
            self.classify_inbound(msg, &switches, policy, buckets);
        }
    }

    /// The server advanced the read watermark for some conversations: drop
    /// their unread rows and tell the conversation subsystem to zero the
    /// counters.
    async fn apply_read_watermark(&self, v: &MsgData) {
        let tips = match TipsComm::decode(v.content.as_slice())
            .and_then(|t| ConversationUpdateTips::decode(t.detail.as_slice()))
        {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "malformed conversation unread notification");
                return;
            }
        };
        for conversation_id in &tips.conversation_id_list {
            self.send_conversation_command(ConversationCommand::UnreadCountSetZero {
                conversation_id: conversation_id.clone(),
            })
            .await;
            if let Err(e) = self
                .db
                .delete_conversation_unread_message_list(conversation_id, tips.update_unread_count_time)
            {
                error!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "failed to drop unread rows below watermark"
                );
            }
        }
        self.send_conversation_command(ConversationCommand::ConChange {
            conversation_ids: tips.conversation_id_list.clone(),
        })
        .await;
    }

    /// Echo of a message this user sent, usually from another device.
    fn classify_own_echo(
        &self,
        mut msg: Message,
        switches: &Switches,
        policy: &PathPolicy,
        buckets: &mut BatchBuckets,
    ) {
        match self.db.get_message_controller(&msg) {
            Ok(Some(local)) => {
                debug!(
                    client_msg_id = %msg.client_msg_id,
                    local_seq = local.seq,
                    seq = msg.seq,
                    "echo for stored message"
                );
                if local.seq == 0 {
                    if policy.allow_special_update && local.create_time == 0 {
                        // server-synced stub: rewrite create time and status together
                        buckets.special_update.push(ChatLog::from_message(&msg));
                    } else {
                        if !switches.conversation_update {
                            msg.status = constant::MSG_STATUS_FILTERED;
                        }
                        buckets.update.push(ChatLog::from_message(&msg));
                    }
                } else {
                    buckets.exception.push(ErrChatLog::from_message(&msg));
                }
                self.temp_messages.remove(&msg.client_msg_id);
            }
            Ok(None) => {
                // sent from another device of this user
                let lc = match self.provisional_conversation(&msg, true) {
                    Ok(lc) => lc,
                    Err(e) => {
                        error!(error = %e, "failed to snapshot conversation");
                        return;
                    }
                };
                if switches.conversation_update {
                    if switches.sender_conversation_update {
                        fold_conversation(lc, &mut buckets.generated);
                    }
                    buckets.new_messages.push(msg.clone());
                } else {
                    msg.status = constant::MSG_STATUS_FILTERED;
                }
                if switches.history {
                    buckets.insert.push(ChatLog::from_message(&msg));
                }
                match msg.content_type {
                    constant::REVOKE => buckets.revoke_legacy.push(msg),
                    constant::HAS_READ_RECEIPT => buckets.read_receipts.push(msg),
                    constant::GROUP_HAS_READ_RECEIPT => buckets.group_read_receipts.push(msg),
                    constant::ADVANCED_REVOKE => {
                        buckets
                            .new_messages
                            .retain(|m| m.client_msg_id != msg.client_msg_id);
                        buckets.revoke_advanced.push(msg);
                    }
                    constant::REACTION_MESSAGE_MODIFIER => buckets.reaction_modifiers.push(msg),
                    constant::REACTION_MESSAGE_DELETER => buckets.reaction_deleters.push(msg),
                    _ => {}
                }
            }
            Err(e) => {
                error!(client_msg_id = %msg.client_msg_id, error = %e, "echo lookup failed");
                buckets.exception.push(ErrChatLog::from_message(&msg));
            }
        }
    }

    /// Message sent by someone else.
    fn classify_inbound(
        &self,
        mut msg: Message,
        switches: &Switches,
        policy: &PathPolicy,
        buckets: &mut BatchBuckets,
    ) {
        match self.db.get_message_controller(&msg) {
            Ok(Some(local)) => {
                if policy.allow_special_update && local.seq == 0 {
                    buckets.special_update.push(ChatLog::from_message(&msg));
                } else {
                    warn!(
                        client_msg_id = %msg.client_msg_id,
                        seq = msg.seq,
                        "duplicate arrival"
                    );
                    buckets.exception.push(ErrChatLog::from_message(&msg));
                }
            }
            Ok(None) => {
                let mut lc = match self.provisional_conversation(&msg, false) {
                    Ok(lc) => lc,
                    Err(e) => {
                        error!(error = %e, "failed to snapshot conversation");
                        return;
                    }
                };
                if msg.session_type == constant::GROUP_CHAT_TYPE
                    || msg.session_type == constant::SUPER_GROUP_CHAT_TYPE
                {
                    lc.group_at_type = group_at_annotation(&msg, &self.config.login_user_id);
                }
                if switches.unread_count {
                    let cached = self.conversation_cache.get(&lc.conversation_id);
                    if msg.send_time > cached.update_unread_count_time {
                        buckets.unread_triggered = true;
                        lc.unread_count = 1;
                        buckets.unread_rows.push(ConversationUnreadMessage {
                            conversation_id: lc.conversation_id.clone(),
                            client_msg_id: msg.client_msg_id.clone(),
                            send_time: msg.send_time,
                        });
                    }
                }
                if switches.conversation_update {
                    fold_conversation(lc, &mut buckets.generated);
                    buckets.new_messages.push(msg.clone());
                } else {
                    msg.status = constant::MSG_STATUS_FILTERED;
                }
                if switches.history {
                    buckets.insert.push(ChatLog::from_message(&msg));
                }
                match msg.content_type {
                    constant::REVOKE => buckets.revoke_legacy.push(msg),
                    constant::HAS_READ_RECEIPT => buckets.read_receipts.push(msg),
                    constant::GROUP_HAS_READ_RECEIPT => buckets.group_read_receipts.push(msg),
                    constant::TYPING => {
                        if policy.allow_typing_relay {
                            buckets.new_messages.push(msg);
                        }
                    }
                    constant::CUSTOM_MSG_ONLINE_ONLY
                    | constant::CUSTOM_MSG_NOT_TRIGGER_CONVERSATION => {
                        buckets.new_messages.push(msg);
                    }
                    constant::OA_NOTIFICATION => {
                        if !switches.conversation_update {
                            buckets.new_messages.push(msg);
                        }
                    }
                    constant::ADVANCED_REVOKE => {
                        buckets
                            .new_messages
                            .retain(|m| m.client_msg_id != msg.client_msg_id);
                        buckets.revoke_advanced.push(msg);
                    }
                    constant::REACTION_MESSAGE_MODIFIER => buckets.reaction_modifiers.push(msg),
                    constant::REACTION_MESSAGE_DELETER => buckets.reaction_deleters.push(msg),
                    _ => {}
                }
            }
            Err(e) => {
                error!(client_msg_id = %msg.client_msg_id, error = %e, "dedupe lookup failed");
                buckets.exception.push(ErrChatLog::from_message(&msg));
            }
        }
    }

    /// Build the conversation row a message implies, before the diff against
    /// the local store.
    fn provisional_conversation(
        &self,
        msg: &Message,
        from_sender: bool,
    ) -> crate::error::Result<LocalConversation> {
        let mut lc = LocalConversation {
            conversation_type: msg.session_type,
            latest_msg: msg.to_json()?,
            latest_msg_send_time: msg.send_time,
            ..Default::default()
        };
        match msg.session_type {
            constant::GROUP_CHAT_TYPE | constant::SUPER_GROUP_CHAT_TYPE => {
                lc.group_id = msg.group_id.clone();
                lc.conversation_id =
                    conversation_id_by_session_type(&lc.group_id, msg.session_type);
            }
            _ => {
                let peer = if from_sender {
                    msg.recv_id.clone()
                } else {
                    msg.send_id.clone()
                };
                lc.conversation_id = conversation_id_by_session_type(&peer, msg.session_type);
                lc.user_id = peer;
                if !from_sender {
                    lc.show_name = msg.sender_nickname.clone();
                    lc.face_url = msg.sender_face_url.clone();
                }
            }
        }
        Ok(lc)
    }
}
