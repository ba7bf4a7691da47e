//! Local relational store.
//!
//! SQLite mirror of the server message log plus the derived conversation
//! list. The adapter exposes batched insert/update primitives with row-level
//! atomicity; a single write mutex inside [`Database`] serialises writers, so
//! the pipeline takes no extra locks.

mod database;
mod schema;

pub use database::{
    ChatLog, ChatLogUpdate, Database, DatabaseConfig, ErrChatLog, TempCacheChatLog,
};
pub use schema::{CREATE_SCHEMA, SCHEMA_VERSION};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "pigeon.db";
