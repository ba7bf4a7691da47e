//! Listener surface exposed to the host application.
//!
//! All payloads cross the boundary as JSON strings. Callbacks run on the
//! pipeline task strictly after the batch that produced them is durable; a
//! slow listener therefore delays the next batch, never reorders events.

use std::sync::Arc;

/// Advanced message listener.
pub trait MsgListener: Send + Sync {
    /// One new inbound message (JSON message).
    fn on_recv_new_message(&self, msg_json: &str);
    /// Legacy revocation: only the target client msg id.
    fn on_recv_message_revoked(&self, client_msg_id: &str);
    /// Modern revocation (JSON `MessageRevoked`).
    fn on_new_recv_message_revoked(&self, revoked_json: &str);
    /// 1-to-1 read receipts (JSON array of `MessageReceipt`).
    fn on_recv_c2c_read_receipt(&self, receipts_json: &str);
    /// Group read receipts (JSON array of `MessageReceipt`).
    fn on_recv_group_read_receipt(&self, receipts_json: &str);
    /// Reaction extensions added (JSON array of `KeyValue`).
    fn on_recv_message_extensions_added(&self, client_msg_id: &str, extensions_json: &str);
    /// Reaction extensions changed (JSON array of `KeyValue`).
    fn on_recv_message_extensions_changed(&self, client_msg_id: &str, extensions_json: &str);
    /// Reaction extensions deleted (JSON array of type keys).
    fn on_recv_message_extensions_deleted(&self, client_msg_id: &str, keys_json: &str);
}

/// Batch listener: receives one sorted JSON array per batch instead of
/// per-message callbacks.
pub trait BatchMsgListener: Send + Sync {
    fn on_recv_new_messages(&self, msgs_json: &str);
}

/// Mirror listener for an embedding service process.
pub trait ServiceListener: Send + Sync {
    fn on_recv_new_message(&self, msg_json: &str);
}

/// The capability set of configured listeners.
///
/// Which callbacks fire depends on what is set: a batch listener replaces
/// per-message delivery, the service listener is always mirrored.
#[derive(Default, Clone)]
pub struct Listeners {
    pub msg: Option<Arc<dyn MsgListener>>,
    pub batch: Option<Arc<dyn BatchMsgListener>>,
    pub service: Option<Arc<dyn ServiceListener>>,
}

impl Listeners {
    pub fn has_batch(&self) -> bool {
        self.batch.is_some()
    }
}
