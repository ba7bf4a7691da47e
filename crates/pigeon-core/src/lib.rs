//! # Pigeon Core
//!
//! Client-side conversation and message ingestion core for the Pigeon
//! instant-messaging SDK. The crate consumes batches of inbound server
//! messages, classifies each one, persists it into a local SQLite mirror,
//! maintains the derived conversation list (unread counters, latest-message
//! metadata, @-state) and emits events to the host application.
//!
//! ## Guarantees
//!
//! - One row per client message id, ever: later deliveries transition the
//!   row in place (`seq 0 -> seq`, revoked, reaction fields) or land in the
//!   exception table.
//! - A conversation's latest-message snapshot always agrees with its
//!   latest-message send time.
//! - Unread counters never double-count a duplicate and never count below
//!   the per-conversation read watermark.
//! - Listener callbacks fire strictly after the batch that produced them is
//!   durable.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │          transport / history syncer           │
//! ├───────────────────────────────────────────────┤
//! │   command channel  →  MessagePipeline         │
//! │   classify │ aggregate │ commit │ dispatch    │
//! ├───────────────────────────────────────────────┤
//! │   storage (SQLite)  │  caches  │  listeners   │
//! └───────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, clippy::all)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cache;
pub mod command;
pub mod config;
pub mod constant;
pub mod conversation;
pub mod error;
pub mod listener;
pub mod message;
pub mod notification;
pub mod pipeline;
pub mod protocol;
pub mod storage;

pub use cache::{ConversationCache, GroupSnapshot, MetadataCache, UserSnapshot};
pub use command::{BatchContext, ConversationCommand, IngestCommand, MsgBatch};
pub use config::SdkConfig;
pub use error::{Error, Result};
pub use listener::{BatchMsgListener, Listeners, MsgListener, ServiceListener};
pub use message::Message;
pub use notification::{NotificationHandler, NotificationRouter, RouteOutcome};
pub use pipeline::{MessagePipeline, PathPolicy};
pub use storage::{Database, DatabaseConfig};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default capacity of the inbound command channel.
pub const DEFAULT_COMMAND_BUFFER: usize = 1000;
