//! Message processing pipeline.
//!
//! A single logical consumer fed by a bounded command channel. One batch is
//! processed to completion (classification, the seven commit phases, the
//! post-commit dispatchers) before the next batch starts; parallelism is
//! external. Regular and super-group batches share this processor, split only
//! by [`PathPolicy`].

mod aggregate;
mod classify;
mod commit;
mod policy;
mod post;
mod temp;

pub use policy::PathPolicy;
pub use temp::{TempMessageMap, DEFAULT_TEMP_CAPACITY};

use std::sync::{Arc, RwLock};
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::cache::{ConversationCache, MetadataCache};
use crate::command::{BatchContext, ConversationCommand, IngestCommand, MsgBatch};
use crate::config::SdkConfig;
use crate::error::Error;
use crate::listener::{BatchMsgListener, Listeners, MsgListener, ServiceListener};
use crate::message::{ContentDecoder, Message};
use crate::notification::NotificationRouter;
use crate::storage::Database;

use aggregate::map_conversations_to_list;

/// The ingestion core of one SDK instance.
pub struct MessagePipeline {
    config: SdkConfig,
    db: Arc<Database>,
    decoder: ContentDecoder,
    conversation_cache: Arc<ConversationCache>,
    metadata_cache: Arc<dyn MetadataCache>,
    router: NotificationRouter,
    listeners: RwLock<Listeners>,
    conversation_tx: mpsc::Sender<ConversationCommand>,
    temp_messages: TempMessageMap,
}

impl MessagePipeline {
    pub fn new(
        config: SdkConfig,
        db: Arc<Database>,
        conversation_cache: Arc<ConversationCache>,
        metadata_cache: Arc<dyn MetadataCache>,
        router: NotificationRouter,
        conversation_tx: mpsc::Sender<ConversationCommand>,
    ) -> Self {
        let decoder = ContentDecoder::new(
            config.login_user_id.clone(),
            config.encryption_key.clone(),
        );
        Self {
            config,
            db,
            decoder,
            conversation_cache,
            metadata_cache,
            router,
            listeners: RwLock::new(Listeners::default()),
            conversation_tx,
            temp_messages: TempMessageMap::default(),
        }
    }

    pub fn set_msg_listener(&self, listener: Arc<dyn MsgListener>) {
        self.write_listeners(|l| l.msg = Some(listener));
    }

    pub fn set_batch_msg_listener(&self, listener: Arc<dyn BatchMsgListener>) {
        self.write_listeners(|l| l.batch = Some(listener));
    }

    pub fn set_listener_for_service(&self, listener: Arc<dyn ServiceListener>) {
        self.write_listeners(|l| l.service = Some(listener));
    }

    fn write_listeners(&self, f: impl FnOnce(&mut Listeners)) {
        let mut guard = match self.listeners.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard);
    }

    pub(crate) fn listeners_snapshot(&self) -> Listeners {
        match self.listeners.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub(crate) fn with_msg_listener(&self, name: &'static str, f: impl FnOnce(&dyn MsgListener)) {
        match self.listeners_snapshot().msg {
            Some(listener) => f(listener.as_ref()),
            None => warn!(callback = name, "listener not set"),
        }
    }

    /// Register an in-flight locally-sent message; the classifier evicts it
    /// when the server echo reaches a terminal state.
    pub fn register_temp_message(&self, msg: Message) {
        self.temp_messages.insert(msg);
    }

    /// Number of in-flight temporary messages (diagnostics).
    pub fn temp_message_count(&self) -> usize {
        self.temp_messages.len()
    }

    /// Consume commands until the channel closes.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<IngestCommand>) {
        while let Some(cmd) = rx.recv().await {
            self.process(cmd).await;
        }
        debug!("ingest channel closed, pipeline stopping");
    }

    /// Process one inbound command to completion.
    pub async fn process(&self, cmd: IngestCommand) {
        match cmd {
            IngestCommand::NewMessages { ctx, msgs } => {
                self.process_batch(ctx, msgs, PathPolicy::regular()).await;
            }
            IngestCommand::NewSuperGroupMessages { ctx, msgs } => {
                self.process_batch(ctx, msgs, PathPolicy::super_group()).await;
            }
        }
    }

    async fn process_batch(&self, ctx: BatchContext, msgs: Vec<MsgBatch>, policy: PathPolicy) {
        let started = Instant::now();
        debug!(op = %ctx.operation_id, batches = msgs.len(), "processing inbound batch");

        let mut buckets = self.classify_batch(&msgs, &policy).await;
        let outcome = match self.commit_batch(&ctx, &mut buckets).await {
            Ok(outcome) => outcome,
            Err(Error::Cancelled) => {
                warn!(op = %ctx.operation_id, "batch cancelled between phases");
                return;
            }
            Err(e) => {
                error!(op = %ctx.operation_id, error = %e, "batch commit failed");
                return;
            }
        };

        self.do_msg_read_state(std::mem::take(&mut buckets.read_receipts))
            .await;
        self.do_group_msg_read_state(std::mem::take(&mut buckets.group_read_receipts))
            .await;
        self.revoke_message_legacy(std::mem::take(&mut buckets.revoke_legacy))
            .await;
        self.dispatch_new_messages(std::mem::take(&mut buckets.new_messages));
        self.new_revoke_message(std::mem::take(&mut buckets.revoke_advanced), &policy)
            .await;
        self.do_reaction_msg_modifier(std::mem::take(&mut buckets.reaction_modifiers))
            .await;
        self.do_reaction_msg_deleter(std::mem::take(&mut buckets.reaction_deleters))
            .await;

        if !outcome.new_set.is_empty() {
            match serde_json::to_string(&map_conversations_to_list(&outcome.new_set)) {
                Ok(json) => {
                    self.send_conversation_command(ConversationCommand::NewConDirect {
                        conversations_json: json,
                    })
                    .await;
                }
                Err(e) => error!(error = %e, "failed to serialize new conversations"),
            }
        }
        if !outcome.changed_set.is_empty() {
            match serde_json::to_string(&map_conversations_to_list(&outcome.changed_set)) {
                Ok(json) => {
                    self.send_conversation_command(ConversationCommand::ConChangeDirect {
                        conversations_json: json,
                    })
                    .await;
                }
                Err(e) => error!(error = %e, "failed to serialize changed conversations"),
            }
        }
        if buckets.unread_triggered {
            self.send_conversation_command(ConversationCommand::TotalUnreadMessageChanged)
                .await;
        }

        debug!(
            op = %ctx.operation_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch committed"
        );
    }

    pub(crate) async fn send_conversation_command(&self, cmd: ConversationCommand) {
        if self.conversation_tx.send(cmd).await.is_err() {
            warn!("conversation update channel closed");
        }
    }
}
