//! Processing-path policy.
//!
//! Regular and super-group batches run through the same processor; the three
//! switches here are the entire behavioural difference between the paths.

/// Path-specific processing rules.
#[derive(Debug, Clone, Copy)]
pub struct PathPolicy {
    /// Reclassify a stored `seq == 0` row into the special-update bucket
    /// (rewrites create time and status together).
    pub allow_special_update: bool,
    /// When a revocation targets a message that is missing locally, insert a
    /// revoked stub so a later delivery of the target is idempotent.
    pub permit_hidden_revoke_preinsert: bool,
    /// Relay `TYPING` messages to the new-message listeners.
    pub allow_typing_relay: bool,
}

impl PathPolicy {
    /// Rules for single / group / notification conversations.
    pub fn regular() -> Self {
        Self {
            allow_special_update: false,
            permit_hidden_revoke_preinsert: false,
            allow_typing_relay: true,
        }
    }

    /// Rules for super-group conversations.
    pub fn super_group() -> Self {
        Self {
            allow_special_update: true,
            permit_hidden_revoke_preinsert: true,
            allow_typing_relay: true,
        }
    }
}
