//! Local store schema definitions.

/// Schema version for migrations.
pub const SCHEMA_VERSION: u32 = 1;

/// SQL to create the local store schema.
pub const CREATE_SCHEMA: &str = r#"
-- Message log. client_msg_id is the canonical dedupe key.
CREATE TABLE IF NOT EXISTS chat_log (
    client_msg_id TEXT PRIMARY KEY,
    server_msg_id TEXT NOT NULL DEFAULT '',
    send_id TEXT NOT NULL DEFAULT '',
    recv_id TEXT NOT NULL DEFAULT '',
    sender_platform_id INTEGER NOT NULL DEFAULT 0,
    sender_nickname TEXT NOT NULL DEFAULT '',
    sender_face_url TEXT NOT NULL DEFAULT '',
    session_type INTEGER NOT NULL DEFAULT 0,
    msg_from INTEGER NOT NULL DEFAULT 0,
    content_type INTEGER NOT NULL DEFAULT 0,
    content TEXT NOT NULL DEFAULT '',
    is_read INTEGER NOT NULL DEFAULT 0,
    status INTEGER NOT NULL DEFAULT 0,
    seq INTEGER NOT NULL DEFAULT 0,
    send_time INTEGER NOT NULL DEFAULT 0,
    create_time INTEGER NOT NULL DEFAULT 0,
    attached_info TEXT NOT NULL DEFAULT '',
    ex TEXT NOT NULL DEFAULT '',
    is_react INTEGER NOT NULL DEFAULT 0,
    is_external_extensions INTEGER NOT NULL DEFAULT 0,
    msg_first_modify_time INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_chat_log_scope
    ON chat_log(session_type, recv_id, send_time);
CREATE INDEX IF NOT EXISTS idx_chat_log_content_type
    ON chat_log(content_type);

-- Messages that failed primary insert. Non-authoritative, diagnostics only.
CREATE TABLE IF NOT EXISTS err_chat_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_msg_id TEXT NOT NULL DEFAULT '',
    server_msg_id TEXT NOT NULL DEFAULT '',
    send_id TEXT NOT NULL DEFAULT '',
    recv_id TEXT NOT NULL DEFAULT '',
    session_type INTEGER NOT NULL DEFAULT 0,
    content_type INTEGER NOT NULL DEFAULT 0,
    content TEXT NOT NULL DEFAULT '',
    status INTEGER NOT NULL DEFAULT 0,
    seq INTEGER NOT NULL DEFAULT 0,
    send_time INTEGER NOT NULL DEFAULT 0,
    create_time INTEGER NOT NULL DEFAULT 0,
    attached_info TEXT NOT NULL DEFAULT '',
    ex TEXT NOT NULL DEFAULT ''
);

-- Payloads parked after a failed post-commit mutation (e.g. a revocation
-- whose target never arrived). Diagnostics only.
CREATE TABLE IF NOT EXISTS temp_cache_chat_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    client_msg_id TEXT NOT NULL DEFAULT '',
    send_id TEXT NOT NULL DEFAULT '',
    recv_id TEXT NOT NULL DEFAULT '',
    session_type INTEGER NOT NULL DEFAULT 0,
    content_type INTEGER NOT NULL DEFAULT 0,
    content TEXT NOT NULL DEFAULT '',
    status INTEGER NOT NULL DEFAULT 0,
    send_time INTEGER NOT NULL DEFAULT 0,
    create_time INTEGER NOT NULL DEFAULT 0
);

-- Derived conversation list, one row per chat thread.
-- latest_msg_send_time = 0 marks a user-hidden conversation.
CREATE TABLE IF NOT EXISTS local_conversation (
    conversation_id TEXT PRIMARY KEY,
    conversation_type INTEGER NOT NULL DEFAULT 0,
    user_id TEXT NOT NULL DEFAULT '',
    group_id TEXT NOT NULL DEFAULT '',
    show_name TEXT NOT NULL DEFAULT '',
    face_url TEXT NOT NULL DEFAULT '',
    recv_msg_opt INTEGER NOT NULL DEFAULT 0,
    unread_count INTEGER NOT NULL DEFAULT 0,
    group_at_type INTEGER NOT NULL DEFAULT 0,
    latest_msg TEXT NOT NULL DEFAULT '',
    latest_msg_send_time INTEGER NOT NULL DEFAULT 0,
    draft_text TEXT NOT NULL DEFAULT '',
    draft_text_time INTEGER NOT NULL DEFAULT 0,
    is_pinned INTEGER NOT NULL DEFAULT 0,
    is_private_chat INTEGER NOT NULL DEFAULT 0,
    burn_duration INTEGER NOT NULL DEFAULT 0,
    is_not_in_group INTEGER NOT NULL DEFAULT 0,
    update_unread_count_time INTEGER NOT NULL DEFAULT 0,
    attached_info TEXT NOT NULL DEFAULT '',
    ex TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_local_conversation_latest
    ON local_conversation(latest_msg_send_time);

-- One row per message that contributed an unread increment.
CREATE TABLE IF NOT EXISTS local_conversation_unread_message (
    conversation_id TEXT NOT NULL,
    client_msg_id TEXT NOT NULL,
    send_time INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (conversation_id, client_msg_id)
);

CREATE INDEX IF NOT EXISTS idx_unread_message_time
    ON local_conversation_unread_message(conversation_id, send_time);
"#;
