//! Persistence committer.
//!
//! Phases run in a fixed order, each best-effort with per-phase error
//! isolation. Cancellation is honoured between phases only, so an aborted
//! batch leaves the store at the last completed phase (every phase is
//! independently consistent).

use std::collections::HashMap;

use tracing::error;

use crate::command::BatchContext;
use crate::conversation::LocalConversation;
use crate::error::{Error, Result};
use crate::storage::ErrChatLog;

use super::aggregate::{apply_hidden_overlay, map_conversations_to_list};
use super::classify::BatchBuckets;
use super::MessagePipeline;

/// Conversation deltas produced by the commit, for the post-commit
/// emissions.
pub(crate) struct CommitOutcome {
    /// Genuinely new conversations (hidden re-creations excluded).
    pub new_set: HashMap<String, LocalConversation>,
    /// Changed conversations, including hidden re-creations.
    pub changed_set: HashMap<String, LocalConversation>,
}

fn ensure_live(ctx: &BatchContext) -> Result<()> {
    if ctx.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

impl MessagePipeline {
    pub(crate) async fn commit_batch(
        &self,
        ctx: &BatchContext,
        buckets: &mut BatchBuckets,
    ) -> Result<CommitOutcome> {
        let generated = std::mem::take(&mut buckets.generated);
        let (mut changed, mut fresh) = self.diff_against_store(generated).await;
        ensure_live(ctx)?;

        // phase 1: sequence reconciliation of previously-stubbed sends
        if let Err(e) = self.db.batch_update_message_list(&buckets.update) {
            error!(op = %ctx.operation_id, error = %e, "seq reconciliation failed");
        }
        ensure_live(ctx)?;

        // phase 2: super-group stub rewrites
        if let Err(e) = self
            .db
            .batch_special_update_message_list(&buckets.special_update)
        {
            error!(op = %ctx.operation_id, error = %e, "special update failed");
        }
        ensure_live(ctx)?;

        // phase 3: message inserts, falling back to per-row on batch failure
        if let Err(e) = self
            .db
            .batch_insert_message_list_controller(&buckets.insert)
        {
            error!(
                op = %ctx.operation_id,
                count = buckets.insert.len(),
                error = %e,
                "batch insert failed, retrying per row"
            );
            for v in &buckets.insert {
                if let Err(e) = self.db.insert_message_controller(v) {
                    error!(
                        client_msg_id = %v.client_msg_id,
                        error = %e,
                        "row insert failed, demoting to exception"
                    );
                    buckets.exception.push(ErrChatLog::from_chat_log(v));
                }
            }
        }
        ensure_live(ctx)?;

        // phase 4: exception rows
        if let Err(e) = self
            .db
            .batch_insert_exception_msg_controller(&buckets.exception)
        {
            error!(op = %ctx.operation_id, error = %e, "exception insert failed");
        }
        ensure_live(ctx)?;

        // phase 5: hidden-merge, then conversation updates
        let hidden = match self.db.get_hidden_conversation_list() {
            Ok(list) => list,
            Err(e) => {
                error!(op = %ctx.operation_id, error = %e, "hidden list load failed");
                Vec::new()
            }
        };
        changed.extend(apply_hidden_overlay(&hidden, &mut fresh));
        if let Err(e) = self
            .db
            .batch_update_conversation_list(&map_conversations_to_list(&changed))
        {
            error!(op = %ctx.operation_id, error = %e, "conversation update failed");
        }
        ensure_live(ctx)?;

        // phase 6: new conversation rows
        if let Err(e) = self
            .db
            .batch_insert_conversation_list(&map_conversations_to_list(&fresh))
        {
            error!(op = %ctx.operation_id, error = %e, "conversation insert failed");
        }
        ensure_live(ctx)?;

        // phase 7: unread rows
        if let Err(e) = self
            .db
            .batch_insert_conversation_unread_message_list(&buckets.unread_rows)
        {
            error!(op = %ctx.operation_id, error = %e, "unread row insert failed");
        }

        Ok(CommitOutcome {
            new_set: fresh,
            changed_set: changed,
        })
    }
}
