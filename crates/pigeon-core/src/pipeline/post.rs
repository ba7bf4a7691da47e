//! Post-commit dispatchers: read receipts, revocations, reactions and the
//! new-message broadcast. Everything here runs strictly after the batch's
//! persistence phases are durable.

use std::collections::HashMap;

use rand::RngCore;
use tracing::{error, info, warn};

use crate::command::ConversationCommand;
use crate::constant;
use crate::conversation::conversation_id_by_session_type;
use crate::error::Result;
use crate::message::{
    AttachedInfo, Message, MessageReceipt, MessageRevoked, QuoteElem,
    ReactionMessageDeleteNotification, ReactionMessageModifierNotification,
};
use crate::storage::{ChatLog, ChatLogUpdate, TempCacheChatLog};

use super::policy::PathPolicy;
use super::MessagePipeline;

fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

fn generate_msg_id() -> String {
    let mut id = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut id);
    format!(
        "{}-{}",
        chrono::Utc::now().timestamp_millis(),
        hex::encode(id)
    )
}

impl MessagePipeline {
    /// Apply 1-to-1 read receipts: mark each listed message read, stamp the
    /// read time, then surface one consolidated receipt set.
    pub(crate) async fn do_msg_read_state(&self, receipts: Vec<Message>) {
        let mut receipts_out: Vec<MessageReceipt> = Vec::new();
        let mut read_map: HashMap<String, Vec<String>> = HashMap::new();

        for rd in &receipts {
            let msg_ids: Vec<String> = match serde_json::from_str(&rd.content) {
                Ok(ids) => ids,
                Err(e) => {
                    error!(error = %e, "malformed read receipt body");
                    continue;
                }
            };
            let mut ok_ids = Vec::new();
            for id in &msg_ids {
                if let Err(e) = self.mark_message_read(id, rd.send_time) {
                    error!(client_msg_id = %id, error = %e, "failed to apply read receipt");
                    continue;
                }
                ok_ids.push(id.clone());
            }
            if ok_ids.is_empty() {
                continue;
            }
            receipts_out.push(MessageReceipt {
                user_id: rd.send_id.clone(),
                msg_id_list: ok_ids.clone(),
                read_time: rd.send_time,
                msg_from: rd.msg_from,
                content_type: rd.content_type,
                session_type: constant::SINGLE_CHAT_TYPE,
                ..Default::default()
            });
            // receipts sent by this user (from another device) land on the
            // peer's conversation; receipts from the peer land on theirs
            let conversation_id = if rd.send_id == self.config.login_user_id {
                conversation_id_by_session_type(&rd.recv_id, constant::SINGLE_CHAT_TYPE)
            } else {
                conversation_id_by_session_type(&rd.send_id, constant::SINGLE_CHAT_TYPE)
            };
            read_map.entry(conversation_id).or_default().extend(ok_ids);
        }

        if !read_map.is_empty() {
            self.send_conversation_command(ConversationCommand::ConversationLatestMsgHasRead {
                read_map,
            })
            .await;
        }
        if !receipts_out.is_empty() {
            match serde_json::to_string(&receipts_out) {
                Ok(json) => self.with_msg_listener("OnRecvC2CReadReceipt", |l| {
                    l.on_recv_c2c_read_receipt(&json)
                }),
                Err(e) => error!(error = %e, "failed to serialize receipts"),
            }
        }
    }

    fn mark_message_read(&self, client_msg_id: &str, read_time: i64) -> Result<()> {
        let row = self
            .db
            .get_message(client_msg_id)?
            .ok_or_else(|| crate::error::Error::MissingTarget(client_msg_id.to_string()))?;
        let mut attached: AttachedInfo = serde_json::from_str(&row.attached_info).unwrap_or_default();
        attached.has_read_time = read_time;
        let mut update = ChatLogUpdate::new(client_msg_id);
        update.is_read = Some(true);
        update.attached_info = Some(serde_json::to_string(&attached)?);
        self.db.update_message_controller(&update)
    }

    /// Apply group read receipts, bucketed by (reader, group) with msg ids
    /// deduplicated.
    pub(crate) async fn do_group_msg_read_state(&self, receipts: Vec<Message>) {
        let mut by_reader_group: HashMap<(String, String), Vec<String>> = HashMap::new();
        for rd in &receipts {
            let ids: Vec<String> = match serde_json::from_str(&rd.content) {
                Ok(ids) => ids,
                Err(e) => {
                    error!(error = %e, "malformed group read receipt body");
                    continue;
                }
            };
            by_reader_group
                .entry((rd.send_id.clone(), rd.group_id.clone()))
                .or_default()
                .extend(ids);
        }

        let mut receipts_out: Vec<MessageReceipt> = Vec::new();
        let mut failed_messages: Vec<Message> = Vec::new();
        for ((user_id, group_id), ids) in by_reader_group {
            let ids = dedup_preserving_order(ids);
            let group = match self.metadata_cache.group_snapshot(&group_id).await {
                Ok(g) => g,
                Err(e) => {
                    error!(group_id = %group_id, error = %e, "group lookup failed");
                    continue;
                }
            };
            let messages = match self
                .db
                .get_multiple_message_controller(&ids, &group_id, group.session_type)
            {
                Ok(m) => m,
                Err(e) => {
                    error!(group_id = %group_id, error = %e, "receipt target lookup failed");
                    continue;
                }
            };

            let mut success: Vec<String> = Vec::new();
            for message in &messages {
                if let Err(e) = self.apply_group_receipt(message, &user_id) {
                    error!(
                        client_msg_id = %message.client_msg_id,
                        error = %e,
                        "failed to apply group read receipt"
                    );
                    continue;
                }
                success.push(message.client_msg_id.clone());
            }

            let failed: Vec<String> = ids
                .iter()
                .filter(|id| !success.contains(id))
                .cloned()
                .collect();
            if !success.is_empty() {
                receipts_out.push(MessageReceipt {
                    user_id: user_id.clone(),
                    group_id: group_id.clone(),
                    msg_id_list: success,
                    content_type: constant::GROUP_HAS_READ_RECEIPT,
                    session_type: group.session_type,
                    ..Default::default()
                });
            }
            if !failed.is_empty() {
                // park the unresolved subset for a later retry pass
                let synthetic = Message {
                    client_msg_id: generate_msg_id(),
                    send_id: user_id,
                    group_id,
                    session_type: group.session_type,
                    content_type: constant::GROUP_HAS_READ_RECEIPT,
                    content: serde_json::to_string(&failed).unwrap_or_default(),
                    status: constant::MSG_STATUS_FILTERED,
                    ..Default::default()
                };
                failed_messages.push(synthetic);
            }
        }

        if !receipts_out.is_empty() {
            match serde_json::to_string(&receipts_out) {
                Ok(json) => {
                    info!(count = receipts_out.len(), "group read receipts applied");
                    self.with_msg_listener("OnRecvGroupReadReceipt", |l| {
                        l.on_recv_group_read_receipt(&json)
                    });
                }
                Err(e) => error!(error = %e, "failed to serialize group receipts"),
            }
        }
        if !failed_messages.is_empty() {
            self.temp_cache_chat_log(&failed_messages);
        }
    }

    fn apply_group_receipt(&self, message: &ChatLog, reader_id: &str) -> Result<()> {
        let mut update = ChatLogUpdate::new(&message.client_msg_id);
        let mut attached: AttachedInfo =
            serde_json::from_str(&message.attached_info).unwrap_or_default();
        let mut readers = attached.group_has_read_info.has_read_user_id_list.clone();
        readers.push(reader_id.to_string());
        let readers = dedup_preserving_order(readers);
        attached.group_has_read_info.has_read_count = readers.len() as i32;
        attached.group_has_read_info.has_read_user_id_list = readers;
        update.attached_info = Some(serde_json::to_string(&attached)?);
        if reader_id == self.config.login_user_id {
            update.is_read = Some(true);
        }
        self.db.update_message_controller(&update)
    }

    /// Legacy revocation path: the content *is* the target client msg id.
    /// Deprecated but still honoured for backward compatibility.
    pub(crate) async fn revoke_message_legacy(&self, revokes: Vec<Message>) {
        for w in &revokes {
            let mut update = ChatLogUpdate::new(&w.content);
            update.status = Some(constant::MSG_STATUS_REVOKED);
            match self.db.update_message_controller(&update) {
                Ok(()) => {
                    self.with_msg_listener("OnRecvMessageRevoked", |l| {
                        l.on_recv_message_revoked(&w.content)
                    });
                }
                Err(e) => {
                    error!(client_msg_id = %w.content, error = %e, "legacy revoke failed");
                }
            }
        }
    }

    /// Modern revocation path: revoke the target, rewrite the revocation
    /// message's send time, then fix up any quote that embeds the target.
    pub(crate) async fn new_revoke_message(&self, revokes: Vec<Message>, policy: &PathPolicy) {
        let mut failed: Vec<Message> = Vec::new();
        let mut revoked: Vec<MessageRevoked> = Vec::new();
        let mut super_group_revoked: Vec<MessageRevoked> = Vec::new();
        let mut super_group_ids: Vec<String> = Vec::new();

        for w in &revokes {
            let payload: MessageRevoked = match serde_json::from_str(&w.content) {
                Ok(p) => p,
                Err(e) => {
                    error!(error = %e, "malformed revoke payload");
                    continue;
                }
            };
            let mut update = ChatLogUpdate::new(&payload.client_msg_id);
            update.status = Some(constant::MSG_STATUS_REVOKED);
            match self.db.update_message_controller(&update) {
                Err(e) => {
                    error!(
                        client_msg_id = %payload.client_msg_id,
                        error = %e,
                        "revoke target missing"
                    );
                    failed.push(w.clone());
                    if policy.permit_hidden_revoke_preinsert
                        && payload.session_type == constant::SUPER_GROUP_CHAT_TYPE
                    {
                        // insert a revoked stub so a late-arriving target
                        // cannot resurrect the message
                        let stub = ChatLog {
                            client_msg_id: payload.client_msg_id.clone(),
                            recv_id: w.group_id.clone(),
                            session_type: payload.session_type,
                            status: constant::MSG_STATUS_REVOKED,
                            ..Default::default()
                        };
                        if let Err(e) = self.db.insert_message_controller(&stub) {
                            error!(
                                client_msg_id = %payload.client_msg_id,
                                error = %e,
                                "revoke stub insert failed"
                            );
                        }
                    }
                }
                Ok(()) => {
                    // keep ordering stable: the revocation marker takes the
                    // revoked message's place on the timeline
                    let mut marker = ChatLogUpdate::new(&w.client_msg_id);
                    marker.send_time = Some(payload.source_message_send_time);
                    if let Err(e) = self.db.update_message_controller(&marker) {
                        error!(
                            client_msg_id = %w.client_msg_id,
                            error = %e,
                            "failed to retime revocation marker"
                        );
                    }
                    self.with_msg_listener("OnNewRecvMessageRevoked", |l| {
                        l.on_new_recv_message_revoked(&w.content)
                    });
                    if payload.session_type == constant::SUPER_GROUP_CHAT_TYPE {
                        if !super_group_ids.contains(&w.group_id) {
                            super_group_ids.push(w.group_id.clone());
                        }
                        super_group_revoked.push(payload);
                    } else {
                        revoked.push(payload);
                    }
                }
            }
        }

        if !revoked.is_empty() {
            match self.db.search_all_message_by_content_type(constant::QUOTE) {
                Ok(rows) => {
                    for row in &rows {
                        self.quote_msg_revoke_fixup(row, &revoked);
                    }
                }
                Err(e) => error!(error = %e, "quote scan failed"),
            }
        }
        for group_id in &super_group_ids {
            match self
                .db
                .super_group_search_all_message_by_content_type(group_id, constant::QUOTE)
            {
                Ok(rows) => {
                    for row in &rows {
                        self.quote_msg_revoke_fixup(row, &super_group_revoked);
                    }
                }
                Err(e) => {
                    error!(group_id = %group_id, error = %e, "super group quote scan failed");
                }
            }
        }
        if !failed.is_empty() {
            self.temp_cache_chat_log(&failed);
        }
    }

    /// Rewrite a quote whose target was revoked: the inner snapshot becomes
    /// the revoke payload with content type `ADVANCED_REVOKE`.
    fn quote_msg_revoke_fixup(&self, row: &ChatLog, revoked: &[MessageRevoked]) {
        let mut quote: QuoteElem = match serde_json::from_str(&row.content) {
            Ok(q) => q,
            Err(e) => {
                error!(client_msg_id = %row.client_msg_id, error = %e, "malformed quote body");
                return;
            }
        };
        let Some(inner) = quote.quote_message.as_mut() else {
            return;
        };
        let Some(payload) = revoked
            .iter()
            .find(|r| r.client_msg_id == inner.client_msg_id)
        else {
            return;
        };
        inner.content = match serde_json::to_string(payload) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize revoke payload");
                return;
            }
        };
        inner.content_type = constant::ADVANCED_REVOKE;
        let content = match serde_json::to_string(&quote) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize quote");
                return;
            }
        };
        let mut update = ChatLogUpdate::new(&row.client_msg_id);
        update.content = Some(content);
        if let Err(e) = self.db.update_message_controller(&update) {
            error!(client_msg_id = %row.client_msg_id, error = %e, "quote fix-up failed");
        }
    }

    /// Reaction extension add/set notifications.
    pub(crate) async fn do_reaction_msg_modifier(&self, modifiers: Vec<Message>) {
        for m in &modifiers {
            let n: ReactionMessageModifierNotification = match serde_json::from_str(&m.content) {
                Ok(n) => n,
                Err(e) => {
                    error!(error = %e, "malformed reaction modifier body");
                    continue;
                }
            };
            // the device that performed the modification already rendered it
            let self_originated = m.send_id == self.config.login_user_id
                && m.sender_platform_id == self.config.platform_id;
            match n.operation {
                constant::ADD_MESSAGE_EXTENSIONS => {
                    if !self_originated {
                        if let Ok(json) =
                            serde_json::to_string(&n.success_reaction_extension_list)
                        {
                            self.with_msg_listener("OnRecvMessageExtensionsAdded", |l| {
                                l.on_recv_message_extensions_added(&n.client_msg_id, &json)
                            });
                        }
                    }
                }
                constant::SET_MESSAGE_EXTENSIONS => {
                    if let Err(e) = self.db.get_and_update_message_reaction_extension(
                        &n.client_msg_id,
                        &n.success_reaction_extension_list,
                    ) {
                        error!(
                            client_msg_id = %n.client_msg_id,
                            error = %e,
                            "reaction set failed"
                        );
                        continue;
                    }
                    if !self_originated {
                        if let Ok(json) =
                            serde_json::to_string(&n.success_reaction_extension_list)
                        {
                            self.with_msg_listener("OnRecvMessageExtensionsChanged", |l| {
                                l.on_recv_message_extensions_changed(&n.client_msg_id, &json)
                            });
                        }
                    }
                }
                op => {
                    warn!(operation = op, "unknown reaction operation");
                    continue;
                }
            }
            let mut update = ChatLogUpdate::new(&n.client_msg_id);
            update.is_react = Some(n.is_react);
            update.is_external_extensions = Some(n.is_external_extensions);
            update.msg_first_modify_time = Some(n.msg_first_modify_time);
            if let Err(e) = self.db.update_message_controller(&update) {
                error!(
                    client_msg_id = %n.client_msg_id,
                    error = %e,
                    "reaction flag update failed"
                );
            }
        }
    }

    /// Reaction extension delete notifications.
    pub(crate) async fn do_reaction_msg_deleter(&self, deleters: Vec<Message>) {
        for m in &deleters {
            let n: ReactionMessageDeleteNotification = match serde_json::from_str(&m.content) {
                Ok(n) => n,
                Err(e) => {
                    error!(error = %e, "malformed reaction deleter body");
                    continue;
                }
            };
            if let Err(e) = self.db.delete_and_update_message_reaction_extension(
                &n.client_msg_id,
                &n.success_reaction_extension_list,
            ) {
                error!(
                    client_msg_id = %n.client_msg_id,
                    error = %e,
                    "reaction delete failed"
                );
                continue;
            }
            let deleted_keys: Vec<String> = n
                .success_reaction_extension_list
                .iter()
                .map(|kv| kv.type_key.clone())
                .collect();
            if let Ok(json) = serde_json::to_string(&deleted_keys) {
                self.with_msg_listener("OnRecvMessageExtensionsDeleted", |l| {
                    l.on_recv_message_extensions_deleted(&n.client_msg_id, &json)
                });
            }
        }
    }

    /// Broadcast new messages sorted by send time: one batched call when a
    /// batch listener is set, per-message otherwise, always mirrored to the
    /// service listener.
    pub(crate) fn dispatch_new_messages(&self, mut messages: Vec<Message>) {
        messages.sort_by_key(|m| m.send_time);
        let listeners = self.listeners_snapshot();

        if let Some(batch) = &listeners.batch {
            if !messages.is_empty() {
                match serde_json::to_string(&messages) {
                    Ok(json) => batch.on_recv_new_messages(&json),
                    Err(e) => error!(error = %e, "failed to serialize message batch"),
                }
            }
        } else {
            for w in &messages {
                match w.to_json() {
                    Ok(json) => match &listeners.msg {
                        Some(l) => l.on_recv_new_message(&json),
                        None => warn!(callback = "OnRecvNewMessage", "listener not set"),
                    },
                    Err(e) => error!(error = %e, "failed to serialize message"),
                }
            }
        }
        if let Some(service) = &listeners.service {
            for w in &messages {
                if let Ok(json) = w.to_json() {
                    service.on_recv_new_message(&json);
                }
            }
        }
    }

    /// Park payloads whose post-commit mutation failed.
    pub(crate) fn temp_cache_chat_log(&self, messages: &[Message]) {
        let rows: Vec<TempCacheChatLog> =
            messages.iter().map(TempCacheChatLog::from_message).collect();
        if let Err(e) = self.db.batch_insert_temp_cache_message_list(&rows) {
            error!(error = %e, count = rows.len(), "temp cache batch insert failed");
            for row in &rows {
                if let Err(e) = self.db.insert_temp_cache_message(row) {
                    warn!(
                        client_msg_id = %row.client_msg_id,
                        error = %e,
                        "temp cache row insert failed"
                    );
                }
            }
        }
    }
}
