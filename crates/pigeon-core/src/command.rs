//! Command types on the pipeline's inbound and outbound channels.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use crate::protocol::MsgData;

/// Per-batch request context.
///
/// Cancellation is honoured between commit phases, never mid-phase; a
/// cancelled batch leaves the store at the last completed phase.
#[derive(Debug, Clone)]
pub struct BatchContext {
    /// Correlation id carried through logs.
    pub operation_id: String,
    cancel: CancellationToken,
}

impl BatchContext {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// The token to cancel this batch with.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for BatchContext {
    fn default() -> Self {
        let mut id = [0u8; 8];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut id);
        Self::new(hex::encode(id))
    }
}

/// One batch of server messages as delivered by the transport or syncer.
#[derive(Debug, Clone, Default)]
pub struct MsgBatch {
    pub msgs: Vec<MsgData>,
}

/// Inbound work for the pipeline consumer.
#[derive(Debug, Clone)]
pub enum IngestCommand {
    /// Messages for regular (single / group / notification) conversations.
    NewMessages {
        ctx: BatchContext,
        msgs: Vec<MsgBatch>,
    },
    /// Messages synced for super-group conversations.
    NewSuperGroupMessages {
        ctx: BatchContext,
        msgs: Vec<MsgBatch>,
    },
}

/// Deltas posted to the conversation subsystem after a batch commits.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationCommand {
    /// Freshly created conversations, JSON array of rows.
    NewConDirect { conversations_json: String },
    /// Changed conversations, JSON array of rows.
    ConChangeDirect { conversations_json: String },
    /// Lighter change signal: the subsystem re-reads the listed rows.
    ConChange { conversation_ids: Vec<String> },
    /// Zero the unread counter of one conversation.
    UnreadCountSetZero { conversation_id: String },
    /// Per-conversation lists of messages now marked read by the peer.
    ConversationLatestMsgHasRead {
        read_map: HashMap<String, Vec<String>>,
    },
    /// At least one unread counter moved this batch.
    TotalUnreadMessageChanged,
}
