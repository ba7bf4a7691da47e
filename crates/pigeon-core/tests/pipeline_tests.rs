//! End-to-end tests for the message processing pipeline.
//!
//! Tests cover:
//! - Echo reconciliation of own sends from other devices (seq 0 -> seq)
//! - Duplicate delivery routed to the exception table
//! - Unread gating against the per-conversation read watermark
//! - Hidden-conversation re-creation preserving user flags
//! - Revocation with quoted-message fix-up and marker retiming
//! - Latest-message selection across an out-of-order batch
//! - Idempotence of reprocessing an identical batch
//! - Read-watermark notifications clearing unread rows
//! - 1-to-1 and group read receipts
//! - Reaction extension set/delete notifications
//! - Super-group special update and revoke stub pre-insert
//! - Typing relay and batch-listener delivery

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prost::Message as _;
use tokio::sync::mpsc;

use pigeon_core::cache::{ConversationCache, GroupSnapshot, MetadataCache, UserSnapshot};
use pigeon_core::command::{BatchContext, ConversationCommand, IngestCommand, MsgBatch};
use pigeon_core::config::SdkConfig;
use pigeon_core::constant;
use pigeon_core::conversation::LocalConversation;
use pigeon_core::error::Result;
use pigeon_core::listener::{BatchMsgListener, MsgListener};
use pigeon_core::message::{
    AttachedInfo, KeyValue, Message, MessageRevoked, QuoteElem,
    ReactionMessageDeleteNotification, ReactionMessageModifierNotification,
};
use pigeon_core::notification::NotificationRouter;
use pigeon_core::pipeline::MessagePipeline;
use pigeon_core::protocol::{ConversationUpdateTips, MsgData, TipsComm};
use pigeon_core::storage::{ChatLog, Database, DatabaseConfig};

// ========================================
// Test Helpers
// ========================================

/// Listener that records every callback payload.
#[derive(Default)]
struct RecordingListener {
    new_messages: Mutex<Vec<String>>,
    revoked: Mutex<Vec<String>>,
    new_revoked: Mutex<Vec<String>>,
    c2c_receipts: Mutex<Vec<String>>,
    group_receipts: Mutex<Vec<String>>,
    extensions_added: Mutex<Vec<(String, String)>>,
    extensions_changed: Mutex<Vec<(String, String)>>,
    extensions_deleted: Mutex<Vec<(String, String)>>,
}

impl MsgListener for RecordingListener {
    fn on_recv_new_message(&self, msg_json: &str) {
        self.new_messages
            .lock()
            .expect("lock")
            .push(msg_json.to_string());
    }
    fn on_recv_message_revoked(&self, client_msg_id: &str) {
        self.revoked
            .lock()
            .expect("lock")
            .push(client_msg_id.to_string());
    }
    fn on_new_recv_message_revoked(&self, revoked_json: &str) {
        self.new_revoked
            .lock()
            .expect("lock")
            .push(revoked_json.to_string());
    }
    fn on_recv_c2c_read_receipt(&self, receipts_json: &str) {
        self.c2c_receipts
            .lock()
            .expect("lock")
            .push(receipts_json.to_string());
    }
    fn on_recv_group_read_receipt(&self, receipts_json: &str) {
        self.group_receipts
            .lock()
            .expect("lock")
            .push(receipts_json.to_string());
    }
    fn on_recv_message_extensions_added(&self, client_msg_id: &str, extensions_json: &str) {
        self.extensions_added
            .lock()
            .expect("lock")
            .push((client_msg_id.to_string(), extensions_json.to_string()));
    }
    fn on_recv_message_extensions_changed(&self, client_msg_id: &str, extensions_json: &str) {
        self.extensions_changed
            .lock()
            .expect("lock")
            .push((client_msg_id.to_string(), extensions_json.to_string()));
    }
    fn on_recv_message_extensions_deleted(&self, client_msg_id: &str, keys_json: &str) {
        self.extensions_deleted
            .lock()
            .expect("lock")
            .push((client_msg_id.to_string(), keys_json.to_string()));
    }
}

#[derive(Default)]
struct RecordingBatchListener {
    batches: Mutex<Vec<String>>,
}

impl BatchMsgListener for RecordingBatchListener {
    fn on_recv_new_messages(&self, msgs_json: &str) {
        self.batches
            .lock()
            .expect("lock")
            .push(msgs_json.to_string());
    }
}

/// Metadata cache with deterministic fake lookups. Group ids starting with
/// "sg" resolve as super groups.
struct StaticMetadata;

#[async_trait]
impl MetadataCache for StaticMetadata {
    async fn user_snapshot(&self, user_id: &str) -> Result<UserSnapshot> {
        Ok(UserSnapshot {
            name: format!("user-{}", user_id),
            face_url: format!("https://faces.test/{}", user_id),
        })
    }
    async fn group_snapshot(&self, group_id: &str) -> Result<GroupSnapshot> {
        let session_type = if group_id.starts_with("sg") {
            constant::SUPER_GROUP_CHAT_TYPE
        } else {
            constant::GROUP_CHAT_TYPE
        };
        Ok(GroupSnapshot {
            group_id: group_id.to_string(),
            name: format!("group-{}", group_id),
            face_url: format!("https://faces.test/g/{}", group_id),
            session_type,
        })
    }
}

struct Harness {
    pipeline: Arc<MessagePipeline>,
    db: Arc<Database>,
    cache: Arc<ConversationCache>,
    listener: Arc<RecordingListener>,
    conversation_rx: mpsc::Receiver<ConversationCommand>,
}

fn harness() -> Harness {
    let db = Arc::new(
        Database::open(&DatabaseConfig {
            path: String::new(),
            in_memory: true,
        })
        .expect("should open in-memory db"),
    );
    let cache = Arc::new(ConversationCache::new());
    let (tx, rx) = mpsc::channel(128);
    let config = SdkConfig {
        login_user_id: "me".to_string(),
        platform_id: 1,
        ..Default::default()
    };
    let pipeline = Arc::new(MessagePipeline::new(
        config,
        db.clone(),
        cache.clone(),
        Arc::new(StaticMetadata),
        NotificationRouter::default(),
        tx,
    ));
    let listener = Arc::new(RecordingListener::default());
    pipeline.set_msg_listener(listener.clone());
    Harness {
        pipeline,
        db,
        cache,
        listener,
        conversation_rx: rx,
    }
}

impl Harness {
    async fn ingest(&self, msgs: Vec<MsgData>) {
        self.pipeline
            .process(IngestCommand::NewMessages {
                ctx: BatchContext::new("test"),
                msgs: vec![MsgBatch { msgs }],
            })
            .await;
    }

    async fn ingest_super(&self, msgs: Vec<MsgData>) {
        self.pipeline
            .process(IngestCommand::NewSuperGroupMessages {
                ctx: BatchContext::new("test-sg"),
                msgs: vec![MsgBatch { msgs }],
            })
            .await;
    }

    fn drain_commands(&mut self) -> Vec<ConversationCommand> {
        let mut out = Vec::new();
        while let Ok(cmd) = self.conversation_rx.try_recv() {
            out.push(cmd);
        }
        out
    }
}

fn text_msg(cmid: &str, send_id: &str, recv_id: &str, seq: i64, send_time: i64) -> MsgData {
    MsgData {
        send_id: send_id.to_string(),
        recv_id: recv_id.to_string(),
        client_msg_id: cmid.to_string(),
        session_type: constant::SINGLE_CHAT_TYPE,
        content_type: constant::TEXT,
        content: b"hello".to_vec(),
        seq,
        send_time,
        create_time: send_time,
        status: constant::MSG_STATUS_SEND_SUCCESS,
        ..Default::default()
    }
}

fn group_text_msg(cmid: &str, send_id: &str, group_id: &str, send_time: i64) -> MsgData {
    MsgData {
        send_id: send_id.to_string(),
        group_id: group_id.to_string(),
        client_msg_id: cmid.to_string(),
        session_type: constant::GROUP_CHAT_TYPE,
        content_type: constant::TEXT,
        content: b"hello group".to_vec(),
        seq: 1,
        send_time,
        create_time: send_time,
        status: constant::MSG_STATUS_SEND_SUCCESS,
        ..Default::default()
    }
}

fn with_option(mut m: MsgData, key: &str, value: bool) -> MsgData {
    m.options.insert(key.to_string(), value);
    m
}

fn stored_text_row(cmid: &str, send_id: &str, recv_id: &str, seq: i64, send_time: i64) -> ChatLog {
    ChatLog {
        client_msg_id: cmid.to_string(),
        send_id: send_id.to_string(),
        recv_id: recv_id.to_string(),
        session_type: constant::SINGLE_CHAT_TYPE,
        content_type: constant::TEXT,
        content: "hello".to_string(),
        status: constant::MSG_STATUS_SEND_SUCCESS,
        seq,
        send_time,
        create_time: send_time,
        ..Default::default()
    }
}

// ========================================
// Scenarios
// ========================================

#[tokio::test]
async fn s1_echo_from_other_device_reconciles_seq() {
    let mut h = harness();
    let mut stub = stored_text_row("A", "me", "peer", 0, 100);
    stub.status = constant::MSG_STATUS_SENDING;
    h.db.insert_message_controller(&stub).expect("should insert");

    h.ingest(vec![text_msg("A", "me", "peer", 42, 200)]).await;

    let row = h
        .db
        .get_message("A")
        .expect("should query")
        .expect("should exist");
    assert_eq!(row.seq, 42);
    assert_eq!(row.send_time, 200);
    // no conversation is created and no listener fires for a pure echo
    assert!(h
        .db
        .get_conversation("single_peer")
        .expect("should query")
        .is_none());
    assert!(h.listener.new_messages.lock().expect("lock").is_empty());
    assert!(h
        .drain_commands()
        .iter()
        .all(|c| !matches!(c, ConversationCommand::TotalUnreadMessageChanged)));
}

#[tokio::test]
async fn s2_duplicate_delivery_goes_to_exception_table() {
    let h = harness();
    h.db.insert_message_controller(&stored_text_row("B", "peer", "me", 7, 100))
        .expect("should insert");

    h.ingest(vec![text_msg("B", "peer", "me", 7, 100)]).await;

    let row = h
        .db
        .get_message("B")
        .expect("should query")
        .expect("should exist");
    assert_eq!(row.seq, 7);
    assert_eq!(row.send_time, 100);
    assert_eq!(h.db.exception_msg_count("B").expect("should count"), 1);
    assert!(h.listener.new_messages.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn s3_unread_gating_by_watermark() {
    let mut h = harness();
    h.cache.update(LocalConversation {
        conversation_id: "single_peer".to_string(),
        update_unread_count_time: 500,
        ..Default::default()
    });

    h.ingest(vec![
        text_msg("m400", "peer", "me", 1, 400),
        text_msg("m600", "peer", "me", 2, 600),
    ])
    .await;

    let conv = h
        .db
        .get_conversation("single_peer")
        .expect("should query")
        .expect("should exist");
    assert_eq!(conv.unread_count, 1);
    assert_eq!(conv.latest_msg_send_time, 600);

    let unread = h
        .db
        .get_conversation_unread_message_list("single_peer")
        .expect("should list");
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].client_msg_id, "m600");

    assert!(h
        .drain_commands()
        .iter()
        .any(|c| matches!(c, ConversationCommand::TotalUnreadMessageChanged)));
}

#[tokio::test]
async fn s4_hidden_conversation_recreation_preserves_flags() {
    let mut h = harness();
    let hidden = LocalConversation {
        conversation_id: "single_peer".to_string(),
        conversation_type: constant::SINGLE_CHAT_TYPE,
        user_id: "peer".to_string(),
        is_pinned: true,
        is_private_chat: true,
        burn_duration: 30,
        ..Default::default()
    };
    h.db.batch_insert_conversation_list(&[hidden])
        .expect("should insert");

    h.ingest(vec![text_msg("m1", "peer", "me", 1, 700)]).await;

    let conv = h
        .db
        .get_conversation("single_peer")
        .expect("should query")
        .expect("should exist");
    assert!(conv.is_pinned);
    assert!(conv.is_private_chat);
    assert_eq!(conv.burn_duration, 30);
    assert_eq!(conv.latest_msg_send_time, 700);
    assert_eq!(conv.unread_count, 1);

    let commands = h.drain_commands();
    let new_jsons: Vec<&String> = commands
        .iter()
        .filter_map(|c| match c {
            ConversationCommand::NewConDirect { conversations_json } => Some(conversations_json),
            _ => None,
        })
        .collect();
    assert!(new_jsons.is_empty(), "hidden re-creation must not emit as new");
    let changed: Vec<&String> = commands
        .iter()
        .filter_map(|c| match c {
            ConversationCommand::ConChangeDirect { conversations_json } => {
                Some(conversations_json)
            }
            _ => None,
        })
        .collect();
    assert_eq!(changed.len(), 1);
    assert!(changed[0].contains("single_peer"));
}

#[tokio::test]
async fn s5_revoke_rewrites_quotes() {
    let h = harness();
    h.db.insert_message_controller(&stored_text_row("X", "peer", "me", 3, 150))
        .expect("should insert");

    let quoted = Message {
        client_msg_id: "X".to_string(),
        content_type: constant::TEXT,
        content: "hello".to_string(),
        ..Default::default()
    };
    let quote = QuoteElem {
        text: "replying".to_string(),
        quote_message: Some(Box::new(quoted)),
    };
    let mut quote_row = stored_text_row("Y", "peer", "me", 4, 160);
    quote_row.content_type = constant::QUOTE;
    quote_row.content = serde_json::to_string(&quote).expect("should serialize");
    h.db.insert_message_controller(&quote_row)
        .expect("should insert");

    let payload = MessageRevoked {
        revoker_id: "peer".to_string(),
        client_msg_id: "X".to_string(),
        source_message_send_time: 150,
        session_type: constant::SINGLE_CHAT_TYPE,
        ..Default::default()
    };
    let mut revoke = text_msg("R1", "peer", "me", 5, 900);
    revoke.content_type = constant::ADVANCED_REVOKE;
    revoke.content = serde_json::to_string(&payload)
        .expect("should serialize")
        .into_bytes();

    h.ingest(vec![revoke]).await;

    let x = h
        .db
        .get_message("X")
        .expect("should query")
        .expect("should exist");
    assert_eq!(x.status, constant::MSG_STATUS_REVOKED);

    // the revocation marker takes the revoked message's timeline slot
    let marker = h
        .db
        .get_message("R1")
        .expect("should query")
        .expect("should exist");
    assert_eq!(marker.send_time, 150);

    let y = h
        .db
        .get_message("Y")
        .expect("should query")
        .expect("should exist");
    let fixed: QuoteElem = serde_json::from_str(&y.content).expect("should parse");
    let inner = fixed.quote_message.expect("should keep inner message");
    assert_eq!(inner.content_type, constant::ADVANCED_REVOKE);
    let inner_payload: MessageRevoked =
        serde_json::from_str(&inner.content).expect("should parse");
    assert_eq!(inner_payload.client_msg_id, "X");

    assert_eq!(h.listener.new_revoked.lock().expect("lock").len(), 1);
    // the revocation itself is not delivered as a new message
    assert!(h.listener.new_messages.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn s6_mixed_batch_ordering_latest_wins() {
    let h = harness();
    h.ingest(vec![
        group_text_msg("g300", "peer", "g1", 300),
        group_text_msg("g100", "peer2", "g1", 100),
        group_text_msg("g500", "peer", "g1", 500),
    ])
    .await;

    let conv = h
        .db
        .get_conversation("group_g1")
        .expect("should query")
        .expect("should exist");
    assert_eq!(conv.latest_msg_send_time, 500);
    let latest: Message = serde_json::from_str(&conv.latest_msg).expect("should parse");
    assert_eq!(latest.client_msg_id, "g500");
    assert_eq!(conv.unread_count, 3);
}

// ========================================
// Universal properties
// ========================================

#[tokio::test]
async fn processing_same_batch_twice_is_idempotent() {
    let h = harness();
    let batch = vec![text_msg("m1", "peer", "me", 1, 400)];
    h.ingest(batch.clone()).await;

    let row_before = h
        .db
        .get_message("m1")
        .expect("should query")
        .expect("should exist");
    let conv_before = h
        .db
        .get_conversation("single_peer")
        .expect("should query")
        .expect("should exist");

    h.ingest(batch).await;

    let row_after = h
        .db
        .get_message("m1")
        .expect("should query")
        .expect("should exist");
    let conv_after = h
        .db
        .get_conversation("single_peer")
        .expect("should query")
        .expect("should exist");

    assert_eq!(row_before.seq, row_after.seq);
    assert_eq!(row_before.send_time, row_after.send_time);
    assert_eq!(row_before.status, row_after.status);
    assert_eq!(conv_before.unread_count, conv_after.unread_count);
    assert_eq!(conv_before.latest_msg_send_time, conv_after.latest_msg_send_time);
    assert_eq!(
        h.db.get_conversation_unread_message_list("single_peer")
            .expect("should list")
            .len(),
        1
    );
}

#[tokio::test]
async fn read_watermark_notification_clears_unread_rows() {
    let mut h = harness();
    h.ingest(vec![
        text_msg("m400", "peer", "me", 1, 400),
        text_msg("m600", "peer", "me", 2, 600),
    ])
    .await;
    h.drain_commands();

    let tips = ConversationUpdateTips {
        conversation_id_list: vec!["single_peer".to_string()],
        update_unread_count_time: 500,
    };
    let body = TipsComm {
        detail: tips.encode_to_vec(),
        default_tips: "read".to_string(),
        json_detail: String::new(),
    };
    let mut notification = text_msg("n1", "server", "me", 0, 700);
    notification.content_type = constant::CONVERSATION_UNREAD_NOTIFICATION;
    notification.content = body.encode_to_vec();

    h.ingest(vec![notification]).await;

    let unread = h
        .db
        .get_conversation_unread_message_list("single_peer")
        .expect("should list");
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].client_msg_id, "m600");

    let commands = h.drain_commands();
    assert!(commands.iter().any(|c| matches!(
        c,
        ConversationCommand::UnreadCountSetZero { conversation_id } if conversation_id == "single_peer"
    )));
    assert!(commands.iter().any(|c| matches!(
        c,
        ConversationCommand::ConChange { conversation_ids } if conversation_ids == &vec!["single_peer".to_string()]
    )));
}

#[tokio::test]
async fn c2c_read_receipt_marks_messages_read() {
    let mut h = harness();
    let mut sent = stored_text_row("m1", "me", "peer", 5, 100);
    sent.is_read = false;
    h.db.insert_message_controller(&sent).expect("should insert");

    let mut receipt = text_msg("r1", "peer", "me", 6, 900);
    receipt.content_type = constant::HAS_READ_RECEIPT;
    receipt.content = br#"["m1"]"#.to_vec();
    h.ingest(vec![receipt]).await;

    let row = h
        .db
        .get_message("m1")
        .expect("should query")
        .expect("should exist");
    assert!(row.is_read);
    let attached: AttachedInfo = serde_json::from_str(&row.attached_info).expect("should parse");
    assert_eq!(attached.has_read_time, 900);

    assert_eq!(h.listener.c2c_receipts.lock().expect("lock").len(), 1);
    assert!(h.drain_commands().iter().any(|c| matches!(
        c,
        ConversationCommand::ConversationLatestMsgHasRead { read_map }
            if read_map.get("single_peer") == Some(&vec!["m1".to_string()])
    )));
}

#[tokio::test]
async fn group_read_receipt_merges_readers() {
    let h = harness();
    let mut group_row = stored_text_row("gm1", "me", "g1", 5, 100);
    group_row.session_type = constant::GROUP_CHAT_TYPE;
    h.db.insert_message_controller(&group_row)
        .expect("should insert");

    let mut receipt = group_text_msg("r1", "u9", "g1", 900);
    receipt.content_type = constant::GROUP_HAS_READ_RECEIPT;
    receipt.content = br#"["gm1","gm1"]"#.to_vec();
    h.ingest(vec![receipt]).await;

    let row = h
        .db
        .get_message("gm1")
        .expect("should query")
        .expect("should exist");
    let attached: AttachedInfo = serde_json::from_str(&row.attached_info).expect("should parse");
    assert_eq!(
        attached.group_has_read_info.has_read_user_id_list,
        vec!["u9".to_string()]
    );
    assert_eq!(attached.group_has_read_info.has_read_count, 1);
    // the reader is not this user, so the local read flag stays down
    assert!(!row.is_read);
    assert_eq!(h.listener.group_receipts.lock().expect("lock").len(), 1);
}

#[tokio::test]
async fn group_read_receipt_from_own_device_sets_read_flag() {
    let h = harness();
    let mut group_row = stored_text_row("gm1", "peer", "g1", 5, 100);
    group_row.session_type = constant::GROUP_CHAT_TYPE;
    h.db.insert_message_controller(&group_row)
        .expect("should insert");

    let mut receipt = group_text_msg("r1", "me", "g1", 900);
    receipt.content_type = constant::GROUP_HAS_READ_RECEIPT;
    receipt.content = br#"["gm1"]"#.to_vec();
    h.ingest(vec![receipt]).await;

    let row = h
        .db
        .get_message("gm1")
        .expect("should query")
        .expect("should exist");
    // the reader merge applies to every receipt, the read flag only to ours
    let attached: AttachedInfo = serde_json::from_str(&row.attached_info).expect("should parse");
    assert_eq!(
        attached.group_has_read_info.has_read_user_id_list,
        vec!["me".to_string()]
    );
    assert_eq!(attached.group_has_read_info.has_read_count, 1);
    assert!(row.is_read);
}

#[tokio::test]
async fn reaction_set_updates_extensions_and_notifies() {
    let h = harness();
    h.db.insert_message_controller(&stored_text_row("m1", "peer", "me", 5, 100))
        .expect("should insert");

    let notification = ReactionMessageModifierNotification {
        client_msg_id: "m1".to_string(),
        session_type: constant::SINGLE_CHAT_TYPE,
        operation: constant::SET_MESSAGE_EXTENSIONS,
        success_reaction_extension_list: vec![KeyValue {
            type_key: "like".to_string(),
            value: "1".to_string(),
            latest_update_time: 1,
        }],
        is_react: true,
        msg_first_modify_time: 123,
        ..Default::default()
    };
    let mut modifier = text_msg("rx1", "peer", "me", 6, 900);
    modifier.content_type = constant::REACTION_MESSAGE_MODIFIER;
    modifier.content = serde_json::to_string(&notification)
        .expect("should serialize")
        .into_bytes();
    h.ingest(vec![modifier]).await;

    let row = h
        .db
        .get_message("m1")
        .expect("should query")
        .expect("should exist");
    assert!(row.is_react);
    assert_eq!(row.msg_first_modify_time, 123);
    let attached: AttachedInfo = serde_json::from_str(&row.attached_info).expect("should parse");
    assert_eq!(attached.reaction_extension_list.len(), 1);
    assert_eq!(attached.reaction_extension_list[0].type_key, "like");

    let changed = h.listener.extensions_changed.lock().expect("lock");
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].0, "m1");
}

#[tokio::test]
async fn reaction_delete_removes_keys() {
    let h = harness();
    h.db.insert_message_controller(&stored_text_row("m1", "peer", "me", 5, 100))
        .expect("should insert");
    h.db.get_and_update_message_reaction_extension(
        "m1",
        &[KeyValue {
            type_key: "like".to_string(),
            value: "1".to_string(),
            latest_update_time: 1,
        }],
    )
    .expect("should seed");

    let notification = ReactionMessageDeleteNotification {
        client_msg_id: "m1".to_string(),
        session_type: constant::SINGLE_CHAT_TYPE,
        success_reaction_extension_list: vec![KeyValue {
            type_key: "like".to_string(),
            ..Default::default()
        }],
        ..Default::default()
    };
    let mut deleter = text_msg("rx2", "peer", "me", 6, 900);
    deleter.content_type = constant::REACTION_MESSAGE_DELETER;
    deleter.content = serde_json::to_string(&notification)
        .expect("should serialize")
        .into_bytes();
    h.ingest(vec![deleter]).await;

    let row = h
        .db
        .get_message("m1")
        .expect("should query")
        .expect("should exist");
    let attached: AttachedInfo = serde_json::from_str(&row.attached_info).expect("should parse");
    assert!(attached.reaction_extension_list.is_empty());

    let deleted = h.listener.extensions_deleted.lock().expect("lock");
    assert_eq!(deleted.len(), 1);
    assert!(deleted[0].1.contains("like"));
}

#[tokio::test]
async fn super_group_stub_special_update() {
    let h = harness();
    let stub = ChatLog {
        client_msg_id: "sgm".to_string(),
        send_id: "me".to_string(),
        recv_id: "sg-1".to_string(),
        session_type: constant::SUPER_GROUP_CHAT_TYPE,
        content_type: constant::TEXT,
        status: constant::MSG_STATUS_SENDING,
        seq: 0,
        create_time: 0,
        ..Default::default()
    };
    h.db.insert_message_controller(&stub).expect("should insert");

    let mut echo = group_text_msg("sgm", "me", "sg-1", 300);
    echo.session_type = constant::SUPER_GROUP_CHAT_TYPE;
    echo.seq = 9;
    h.ingest_super(vec![echo]).await;

    let row = h
        .db
        .get_message("sgm")
        .expect("should query")
        .expect("should exist");
    assert_eq!(row.seq, 9);
    assert_eq!(row.create_time, 300);
    assert_eq!(row.status, constant::MSG_STATUS_SEND_SUCCESS);
}

#[tokio::test]
async fn super_group_revoke_preinserts_stub() {
    let h = harness();
    let payload = MessageRevoked {
        client_msg_id: "missing-target".to_string(),
        source_message_send_time: 111,
        session_type: constant::SUPER_GROUP_CHAT_TYPE,
        ..Default::default()
    };
    let mut revoke = group_text_msg("R1", "peer", "sg-1", 900);
    revoke.session_type = constant::SUPER_GROUP_CHAT_TYPE;
    revoke.content_type = constant::ADVANCED_REVOKE;
    revoke.content = serde_json::to_string(&payload)
        .expect("should serialize")
        .into_bytes();
    h.ingest_super(vec![revoke]).await;

    let stub = h
        .db
        .get_message("missing-target")
        .expect("should query")
        .expect("stub should exist");
    assert_eq!(stub.status, constant::MSG_STATUS_REVOKED);
    assert_eq!(stub.recv_id, "sg-1");
    // no revoke event fires for a target that never arrived
    assert!(h.listener.new_revoked.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn typing_is_relayed_without_storage() {
    let h = harness();
    let mut typing = text_msg("t1", "peer", "me", 0, 500);
    typing.content_type = constant::TYPING;
    typing.content = b"typing".to_vec();
    let typing = with_option(typing, constant::IS_HISTORY, false);
    let typing = with_option(typing, constant::IS_UNREAD_COUNT, false);
    let typing = with_option(typing, constant::IS_CONVERSATION_UPDATE, false);

    h.ingest(vec![typing]).await;

    assert!(h.db.get_message("t1").expect("should query").is_none());
    assert!(h
        .db
        .get_conversation("single_peer")
        .expect("should query")
        .is_none());
    assert_eq!(h.listener.new_messages.lock().expect("lock").len(), 1);
}

#[tokio::test]
async fn batch_listener_receives_sorted_batch() {
    let h = harness();
    let batch_listener = Arc::new(RecordingBatchListener::default());
    h.pipeline.set_batch_msg_listener(batch_listener.clone());

    h.ingest(vec![
        text_msg("late", "peer", "me", 2, 200),
        text_msg("early", "peer", "me", 1, 100),
    ])
    .await;

    let batches = batch_listener.batches.lock().expect("lock");
    assert_eq!(batches.len(), 1);
    let messages: Vec<Message> = serde_json::from_str(&batches[0]).expect("should parse");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].client_msg_id, "early");
    assert_eq!(messages[1].client_msg_id, "late");
    // the batch listener replaces per-message delivery
    assert!(h.listener.new_messages.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn new_conversation_gets_display_metadata() {
    let h = harness();
    h.ingest(vec![text_msg("m1", "peer", "me", 1, 400)]).await;

    let conv = h
        .db
        .get_conversation("single_peer")
        .expect("should query")
        .expect("should exist");
    assert_eq!(conv.show_name, "user-peer");
    assert_eq!(conv.face_url, "https://faces.test/peer");
    assert_eq!(conv.user_id, "peer");
}

#[tokio::test]
async fn filtered_message_does_not_touch_conversation() {
    let h = harness();
    let msg = with_option(
        text_msg("m1", "peer", "me", 1, 400),
        constant::IS_CONVERSATION_UPDATE,
        false,
    );
    let msg = with_option(msg, constant::IS_UNREAD_COUNT, false);
    h.ingest(vec![msg]).await;

    let row = h
        .db
        .get_message("m1")
        .expect("should query")
        .expect("should exist");
    assert_eq!(row.status, constant::MSG_STATUS_FILTERED);
    assert!(h
        .db
        .get_conversation("single_peer")
        .expect("should query")
        .is_none());
    assert!(h.listener.new_messages.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn echo_without_local_copy_updates_sender_conversation() {
    let h = harness();
    // sent from another device of this user, never seen locally
    h.ingest(vec![text_msg("m1", "me", "peer", 3, 400)]).await;

    let row = h
        .db
        .get_message("m1")
        .expect("should query")
        .expect("should exist");
    assert_eq!(row.seq, 3);

    let conv = h
        .db
        .get_conversation("single_peer")
        .expect("should query")
        .expect("should exist");
    // own sends never count as unread
    assert_eq!(conv.unread_count, 0);
    assert_eq!(conv.latest_msg_send_time, 400);
    assert_eq!(h.listener.new_messages.lock().expect("lock").len(), 1);
}

#[tokio::test]
async fn echo_evicts_in_flight_temp_message() {
    let h = harness();
    let mut stub = stored_text_row("A", "me", "peer", 0, 100);
    stub.status = constant::MSG_STATUS_SENDING;
    h.db.insert_message_controller(&stub).expect("should insert");
    h.pipeline.register_temp_message(Message {
        client_msg_id: "A".to_string(),
        ..Default::default()
    });
    assert_eq!(h.pipeline.temp_message_count(), 1);

    h.ingest(vec![text_msg("A", "me", "peer", 42, 200)]).await;

    assert_eq!(h.pipeline.temp_message_count(), 0);
}

#[tokio::test]
async fn group_at_mention_sets_conversation_at_state() {
    let h = harness();
    let mut at = group_text_msg("a1", "peer", "g1", 400);
    at.content_type = constant::AT_TEXT;
    at.content = format!(
        r#"{{"text":"hey","atUserList":["me","{}"]}}"#,
        constant::AT_ALL_STRING
    )
    .into_bytes();
    h.ingest(vec![at]).await;

    let conv = h
        .db
        .get_conversation("group_g1")
        .expect("should query")
        .expect("should exist");
    assert_eq!(conv.group_at_type, constant::AT_ALL_AT_ME);
}
