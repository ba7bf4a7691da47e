//! Database operations over the local store.

use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::schema::CREATE_SCHEMA;
use crate::constant;
use crate::conversation::{ConversationUnreadMessage, LocalConversation};
use crate::error::{Error, Result};
use crate::message::{KeyValue, Message};

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the database file.
    pub path: String,
    /// Whether to use an in-memory database (for testing).
    pub in_memory: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: super::DEFAULT_DB_NAME.to_string(),
            in_memory: false,
        }
    }
}

/// Persisted message row.
#[derive(Debug, Clone, Default)]
pub struct ChatLog {
    pub client_msg_id: String,
    pub server_msg_id: String,
    pub send_id: String,
    pub recv_id: String,
    pub sender_platform_id: i32,
    pub sender_nickname: String,
    pub sender_face_url: String,
    pub session_type: i32,
    pub msg_from: i32,
    pub content_type: i32,
    pub content: String,
    pub is_read: bool,
    pub status: i32,
    pub seq: i64,
    pub send_time: i64,
    pub create_time: i64,
    pub attached_info: String,
    pub ex: String,
    pub is_react: bool,
    pub is_external_extensions: bool,
    pub msg_first_modify_time: i64,
}

impl ChatLog {
    /// Project a decoded message onto its row form. For group-typed sessions
    /// the receiver column carries the group id.
    pub fn from_message(m: &Message) -> Self {
        let recv_id = if m.session_type == constant::GROUP_CHAT_TYPE
            || m.session_type == constant::SUPER_GROUP_CHAT_TYPE
        {
            m.group_id.clone()
        } else {
            m.recv_id.clone()
        };
        Self {
            client_msg_id: m.client_msg_id.clone(),
            server_msg_id: m.server_msg_id.clone(),
            send_id: m.send_id.clone(),
            recv_id,
            sender_platform_id: m.sender_platform_id,
            sender_nickname: m.sender_nickname.clone(),
            sender_face_url: m.sender_face_url.clone(),
            session_type: m.session_type,
            msg_from: m.msg_from,
            content_type: m.content_type,
            content: m.content.clone(),
            is_read: m.is_read,
            status: m.status,
            seq: m.seq,
            send_time: m.send_time,
            create_time: m.create_time,
            attached_info: m.attached_info.clone(),
            ex: m.ex.clone(),
            is_react: false,
            is_external_extensions: false,
            msg_first_modify_time: 0,
        }
    }
}

/// Row in the exception side table.
#[derive(Debug, Clone, Default)]
pub struct ErrChatLog {
    pub client_msg_id: String,
    pub server_msg_id: String,
    pub send_id: String,
    pub recv_id: String,
    pub session_type: i32,
    pub content_type: i32,
    pub content: String,
    pub status: i32,
    pub seq: i64,
    pub send_time: i64,
    pub create_time: i64,
    pub attached_info: String,
    pub ex: String,
}

impl ErrChatLog {
    pub fn from_message(m: &Message) -> Self {
        let recv_id = if m.session_type == constant::GROUP_CHAT_TYPE
            || m.session_type == constant::SUPER_GROUP_CHAT_TYPE
        {
            m.group_id.clone()
        } else {
            m.recv_id.clone()
        };
        Self {
            client_msg_id: m.client_msg_id.clone(),
            server_msg_id: m.server_msg_id.clone(),
            send_id: m.send_id.clone(),
            recv_id,
            session_type: m.session_type,
            content_type: m.content_type,
            content: m.content.clone(),
            status: m.status,
            seq: m.seq,
            send_time: m.send_time,
            create_time: m.create_time,
            attached_info: m.attached_info.clone(),
            ex: m.ex.clone(),
        }
    }

    pub fn from_chat_log(c: &ChatLog) -> Self {
        Self {
            client_msg_id: c.client_msg_id.clone(),
            server_msg_id: c.server_msg_id.clone(),
            send_id: c.send_id.clone(),
            recv_id: c.recv_id.clone(),
            session_type: c.session_type,
            content_type: c.content_type,
            content: c.content.clone(),
            status: c.status,
            seq: c.seq,
            send_time: c.send_time,
            create_time: c.create_time,
            attached_info: c.attached_info.clone(),
            ex: c.ex.clone(),
        }
    }
}

/// Row parked in the temp cache after a failed post-commit mutation.
#[derive(Debug, Clone, Default)]
pub struct TempCacheChatLog {
    pub client_msg_id: String,
    pub send_id: String,
    pub recv_id: String,
    pub session_type: i32,
    pub content_type: i32,
    pub content: String,
    pub status: i32,
    pub send_time: i64,
    pub create_time: i64,
}

impl TempCacheChatLog {
    pub fn from_message(m: &Message) -> Self {
        Self {
            client_msg_id: m.client_msg_id.clone(),
            send_id: m.send_id.clone(),
            recv_id: m.recv_id.clone(),
            session_type: m.session_type,
            content_type: m.content_type,
            content: m.content.clone(),
            status: m.status,
            send_time: m.send_time,
            create_time: m.create_time,
        }
    }
}

/// Partial message update. Unset fields are left untouched; updating a row
/// that does not exist is a `MissingTarget` error.
#[derive(Debug, Clone, Default)]
pub struct ChatLogUpdate {
    pub client_msg_id: String,
    pub status: Option<i32>,
    pub send_time: Option<i64>,
    pub is_read: Option<bool>,
    pub content: Option<String>,
    pub attached_info: Option<String>,
    pub is_react: Option<bool>,
    pub is_external_extensions: Option<bool>,
    pub msg_first_modify_time: Option<i64>,
}

impl ChatLogUpdate {
    pub fn new(client_msg_id: impl Into<String>) -> Self {
        Self {
            client_msg_id: client_msg_id.into(),
            ..Default::default()
        }
    }
}

const CHAT_LOG_COLUMNS: &str = "client_msg_id, server_msg_id, send_id, recv_id, \
     sender_platform_id, sender_nickname, sender_face_url, session_type, msg_from, \
     content_type, content, is_read, status, seq, send_time, create_time, \
     attached_info, ex, is_react, is_external_extensions, msg_first_modify_time";

const CONVERSATION_COLUMNS: &str = "conversation_id, conversation_type, user_id, group_id, \
     show_name, face_url, recv_msg_opt, unread_count, group_at_type, latest_msg, \
     latest_msg_send_time, draft_text, draft_text_time, is_pinned, is_private_chat, \
     burn_duration, is_not_in_group, update_unread_count_time, attached_info, ex";

fn chat_log_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatLog> {
    Ok(ChatLog {
        client_msg_id: row.get(0)?,
        server_msg_id: row.get(1)?,
        send_id: row.get(2)?,
        recv_id: row.get(3)?,
        sender_platform_id: row.get(4)?,
        sender_nickname: row.get(5)?,
        sender_face_url: row.get(6)?,
        session_type: row.get(7)?,
        msg_from: row.get(8)?,
        content_type: row.get(9)?,
        content: row.get(10)?,
        is_read: row.get::<_, i32>(11)? != 0,
        status: row.get(12)?,
        seq: row.get(13)?,
        send_time: row.get(14)?,
        create_time: row.get(15)?,
        attached_info: row.get(16)?,
        ex: row.get(17)?,
        is_react: row.get::<_, i32>(18)? != 0,
        is_external_extensions: row.get::<_, i32>(19)? != 0,
        msg_first_modify_time: row.get(20)?,
    })
}

fn conversation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LocalConversation> {
    Ok(LocalConversation {
        conversation_id: row.get(0)?,
        conversation_type: row.get(1)?,
        user_id: row.get(2)?,
        group_id: row.get(3)?,
        show_name: row.get(4)?,
        face_url: row.get(5)?,
        recv_msg_opt: row.get(6)?,
        unread_count: row.get(7)?,
        group_at_type: row.get(8)?,
        latest_msg: row.get(9)?,
        latest_msg_send_time: row.get(10)?,
        draft_text: row.get(11)?,
        draft_text_time: row.get(12)?,
        is_pinned: row.get::<_, i32>(13)? != 0,
        is_private_chat: row.get::<_, i32>(14)? != 0,
        burn_duration: row.get(15)?,
        is_not_in_group: row.get::<_, i32>(16)? != 0,
        update_unread_count_time: row.get(17)?,
        attached_info: row.get(18)?,
        ex: row.get(19)?,
    })
}

/// Local store handle. Safe to share; a single internal mutex serialises
/// access to the connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the local store.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let conn = if config.in_memory {
            Connection::open_in_memory()
        } else {
            Connection::open(&config.path)
        }
        .map_err(|e| Error::Storage(format!("failed to open database: {}", e)))?;

        conn.execute_batch(CREATE_SCHEMA)
            .map_err(|e| Error::Storage(format!("failed to create schema: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("database mutex poisoned".to_string()))
    }

    // ---- message log ----

    /// Look up a message by client id.
    pub fn get_message(&self, client_msg_id: &str) -> Result<Option<ChatLog>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM chat_log WHERE client_msg_id = ?",
            CHAT_LOG_COLUMNS
        );
        conn.query_row(&sql, params![client_msg_id], chat_log_from_row)
            .optional()
            .map_err(|e| Error::Storage(format!("get_message: {}", e)))
    }

    /// Session-aware lookup. Super-group messages are scoped to their group
    /// so a colliding id from another scope never shadows them.
    pub fn get_message_controller(&self, m: &Message) -> Result<Option<ChatLog>> {
        if m.session_type == constant::SUPER_GROUP_CHAT_TYPE {
            let conn = self.conn()?;
            let sql = format!(
                "SELECT {} FROM chat_log WHERE client_msg_id = ? AND recv_id = ?",
                CHAT_LOG_COLUMNS
            );
            conn.query_row(&sql, params![m.client_msg_id, m.group_id], chat_log_from_row)
                .optional()
                .map_err(|e| Error::Storage(format!("get_message_controller: {}", e)))
        } else {
            self.get_message(&m.client_msg_id)
        }
    }

    /// Fetch several messages by client id within one session scope.
    pub fn get_multiple_message_controller(
        &self,
        client_msg_ids: &[String],
        group_id: &str,
        session_type: i32,
    ) -> Result<Vec<ChatLog>> {
        if client_msg_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let placeholders = vec!["?"; client_msg_ids.len()].join(", ");
        let mut sql = format!(
            "SELECT {} FROM chat_log WHERE client_msg_id IN ({})",
            CHAT_LOG_COLUMNS, placeholders
        );
        if session_type == constant::SUPER_GROUP_CHAT_TYPE {
            sql.push_str(" AND recv_id = ?");
        }
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::Storage(e.to_string()))?;
        let mut values: Vec<&dyn rusqlite::ToSql> = client_msg_ids
            .iter()
            .map(|s| s as &dyn rusqlite::ToSql)
            .collect();
        if session_type == constant::SUPER_GROUP_CHAT_TYPE {
            values.push(&group_id as &dyn rusqlite::ToSql);
        }
        let rows = stmt
            .query_map(values.as_slice(), chat_log_from_row)
            .map_err(|e| Error::Storage(e.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| Error::Storage(e.to_string()))?);
        }
        Ok(out)
    }

    fn insert_chat_log(conn: &Connection, v: &ChatLog) -> rusqlite::Result<()> {
        let sql = format!(
            "INSERT INTO chat_log ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            CHAT_LOG_COLUMNS
        );
        conn.execute(
            &sql,
            params![
                v.client_msg_id,
                v.server_msg_id,
                v.send_id,
                v.recv_id,
                v.sender_platform_id,
                v.sender_nickname,
                v.sender_face_url,
                v.session_type,
                v.msg_from,
                v.content_type,
                v.content,
                v.is_read as i32,
                v.status,
                v.seq,
                v.send_time,
                v.create_time,
                v.attached_info,
                v.ex,
                v.is_react as i32,
                v.is_external_extensions as i32,
                v.msg_first_modify_time,
            ],
        )?;
        Ok(())
    }

    /// Insert one message row.
    pub fn insert_message_controller(&self, v: &ChatLog) -> Result<()> {
        let conn = self.conn()?;
        Self::insert_chat_log(&conn, v)
            .map_err(|e| Error::Storage(format!("insert_message: {}", e)))
    }

    /// Insert a batch of message rows atomically. Any failing row fails the
    /// whole batch; the caller retries per-row.
    pub fn batch_insert_message_list_controller(&self, list: &[ChatLog]) -> Result<()> {
        if list.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(e.to_string()))?;
        for v in list {
            Self::insert_chat_log(&tx, v)
                .map_err(|e| Error::Storage(format!("batch insert message: {}", e)))?;
        }
        tx.commit().map_err(|e| Error::Storage(e.to_string()))
    }

    /// Sequence reconciliation of previously-stubbed sends: the stored row
    /// takes the server-assigned identity of the echo.
    pub fn batch_update_message_list(&self, list: &[ChatLog]) -> Result<()> {
        if list.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(e.to_string()))?;
        for v in list {
            tx.execute(
                "UPDATE chat_log SET server_msg_id = ?, seq = ?, send_time = ?, \
                 status = ?, content = ?, attached_info = ? WHERE client_msg_id = ?",
                params![
                    v.server_msg_id,
                    v.seq,
                    v.send_time,
                    v.status,
                    v.content,
                    v.attached_info,
                    v.client_msg_id
                ],
            )
            .map_err(|e| Error::Storage(format!("batch update message: {}", e)))?;
        }
        tx.commit().map_err(|e| Error::Storage(e.to_string()))
    }

    /// Super-group variant of sequence reconciliation that also rewrites the
    /// create time (server-synced stubs carry none).
    pub fn batch_special_update_message_list(&self, list: &[ChatLog]) -> Result<()> {
        if list.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(e.to_string()))?;
        for v in list {
            tx.execute(
                "UPDATE chat_log SET server_msg_id = ?, seq = ?, send_time = ?, \
                 create_time = ?, status = ?, content = ?, attached_info = ? \
                 WHERE client_msg_id = ?",
                params![
                    v.server_msg_id,
                    v.seq,
                    v.send_time,
                    v.create_time,
                    v.status,
                    v.content,
                    v.attached_info,
                    v.client_msg_id
                ],
            )
            .map_err(|e| Error::Storage(format!("batch special update message: {}", e)))?;
        }
        tx.commit().map_err(|e| Error::Storage(e.to_string()))
    }

    /// Apply a partial update to one message row.
    pub fn update_message_controller(&self, u: &ChatLogUpdate) -> Result<()> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(status) = u.status {
            sets.push("status = ?");
            values.push(Box::new(status));
        }
        if let Some(send_time) = u.send_time {
            sets.push("send_time = ?");
            values.push(Box::new(send_time));
        }
        if let Some(is_read) = u.is_read {
            sets.push("is_read = ?");
            values.push(Box::new(is_read as i32));
        }
        if let Some(content) = &u.content {
            sets.push("content = ?");
            values.push(Box::new(content.clone()));
        }
        if let Some(attached_info) = &u.attached_info {
            sets.push("attached_info = ?");
            values.push(Box::new(attached_info.clone()));
        }
        if let Some(is_react) = u.is_react {
            sets.push("is_react = ?");
            values.push(Box::new(is_react as i32));
        }
        if let Some(is_external) = u.is_external_extensions {
            sets.push("is_external_extensions = ?");
            values.push(Box::new(is_external as i32));
        }
        if let Some(t) = u.msg_first_modify_time {
            sets.push("msg_first_modify_time = ?");
            values.push(Box::new(t));
        }
        if sets.is_empty() {
            return Ok(());
        }
        values.push(Box::new(u.client_msg_id.clone()));

        let conn = self.conn()?;
        let sql = format!(
            "UPDATE chat_log SET {} WHERE client_msg_id = ?",
            sets.join(", ")
        );
        let affected = conn
            .execute(&sql, rusqlite::params_from_iter(values.iter()))
            .map_err(|e| Error::Storage(format!("update_message: {}", e)))?;
        if affected == 0 {
            return Err(Error::MissingTarget(u.client_msg_id.clone()));
        }
        Ok(())
    }

    /// Park failed arrivals in the exception table.
    pub fn batch_insert_exception_msg_controller(&self, list: &[ErrChatLog]) -> Result<()> {
        if list.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(e.to_string()))?;
        for v in list {
            tx.execute(
                "INSERT INTO err_chat_log (client_msg_id, server_msg_id, send_id, recv_id, \
                 session_type, content_type, content, status, seq, send_time, create_time, \
                 attached_info, ex) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    v.client_msg_id,
                    v.server_msg_id,
                    v.send_id,
                    v.recv_id,
                    v.session_type,
                    v.content_type,
                    v.content,
                    v.status,
                    v.seq,
                    v.send_time,
                    v.create_time,
                    v.attached_info,
                    v.ex
                ],
            )
            .map_err(|e| Error::Storage(format!("insert exception message: {}", e)))?;
        }
        tx.commit().map_err(|e| Error::Storage(e.to_string()))
    }

    /// Count exception rows for one client id (diagnostics).
    pub fn exception_msg_count(&self, client_msg_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM err_chat_log WHERE client_msg_id = ?",
            params![client_msg_id],
            |row| row.get(0),
        )
        .map_err(|e| Error::Storage(e.to_string()))
    }

    fn insert_temp_cache(conn: &Connection, v: &TempCacheChatLog) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO temp_cache_chat_log (client_msg_id, send_id, recv_id, session_type, \
             content_type, content, status, send_time, create_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                v.client_msg_id,
                v.send_id,
                v.recv_id,
                v.session_type,
                v.content_type,
                v.content,
                v.status,
                v.send_time,
                v.create_time
            ],
        )?;
        Ok(())
    }

    /// Insert one temp-cache row.
    pub fn insert_temp_cache_message(&self, v: &TempCacheChatLog) -> Result<()> {
        let conn = self.conn()?;
        Self::insert_temp_cache(&conn, v)
            .map_err(|e| Error::Storage(format!("insert temp cache message: {}", e)))
    }

    /// Insert a batch of temp-cache rows atomically.
    pub fn batch_insert_temp_cache_message_list(&self, list: &[TempCacheChatLog]) -> Result<()> {
        if list.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(e.to_string()))?;
        for v in list {
            Self::insert_temp_cache(&tx, v)
                .map_err(|e| Error::Storage(format!("batch insert temp cache: {}", e)))?;
        }
        tx.commit().map_err(|e| Error::Storage(e.to_string()))
    }

    /// All stored messages of one content type (quote fix-up scan).
    pub fn search_all_message_by_content_type(&self, content_type: i32) -> Result<Vec<ChatLog>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM chat_log WHERE content_type = ?",
            CHAT_LOG_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::Storage(e.to_string()))?;
        let rows = stmt
            .query_map(params![content_type], chat_log_from_row)
            .map_err(|e| Error::Storage(e.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| Error::Storage(e.to_string()))?);
        }
        Ok(out)
    }

    /// Per-group variant of the content-type scan.
    pub fn super_group_search_all_message_by_content_type(
        &self,
        group_id: &str,
        content_type: i32,
    ) -> Result<Vec<ChatLog>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM chat_log WHERE content_type = ? AND recv_id = ? AND session_type = ?",
            CHAT_LOG_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::Storage(e.to_string()))?;
        let rows = stmt
            .query_map(
                params![content_type, group_id, constant::SUPER_GROUP_CHAT_TYPE],
                chat_log_from_row,
            )
            .map_err(|e| Error::Storage(e.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| Error::Storage(e.to_string()))?);
        }
        Ok(out)
    }

    // ---- reaction extensions ----

    /// Merge reaction extension entries into a message row. Existing keys are
    /// replaced, new keys appended.
    pub fn get_and_update_message_reaction_extension(
        &self,
        client_msg_id: &str,
        kvs: &[KeyValue],
    ) -> Result<()> {
        let row = self
            .get_message(client_msg_id)?
            .ok_or_else(|| Error::MissingTarget(client_msg_id.to_string()))?;
        let mut attached: crate::message::AttachedInfo =
            serde_json::from_str(&row.attached_info).unwrap_or_default();
        for kv in kvs {
            match attached
                .reaction_extension_list
                .iter_mut()
                .find(|e| e.type_key == kv.type_key)
            {
                Some(existing) => *existing = kv.clone(),
                None => attached.reaction_extension_list.push(kv.clone()),
            }
        }
        let mut update = ChatLogUpdate::new(client_msg_id);
        update.attached_info = Some(serde_json::to_string(&attached)?);
        self.update_message_controller(&update)
    }

    /// Remove reaction extension entries from a message row.
    pub fn delete_and_update_message_reaction_extension(
        &self,
        client_msg_id: &str,
        kvs: &[KeyValue],
    ) -> Result<()> {
        let row = self
            .get_message(client_msg_id)?
            .ok_or_else(|| Error::MissingTarget(client_msg_id.to_string()))?;
        let mut attached: crate::message::AttachedInfo =
            serde_json::from_str(&row.attached_info).unwrap_or_default();
        attached
            .reaction_extension_list
            .retain(|e| !kvs.iter().any(|kv| kv.type_key == e.type_key));
        let mut update = ChatLogUpdate::new(client_msg_id);
        update.attached_info = Some(serde_json::to_string(&attached)?);
        self.update_message_controller(&update)
    }

    // ---- conversations ----

    /// Look up one conversation row.
    pub fn get_conversation(&self, conversation_id: &str) -> Result<Option<LocalConversation>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM local_conversation WHERE conversation_id = ?",
            CONVERSATION_COLUMNS
        );
        conn.query_row(&sql, params![conversation_id], conversation_from_row)
            .optional()
            .map_err(|e| Error::Storage(format!("get_conversation: {}", e)))
    }

    /// The full visible conversation list.
    pub fn get_all_conversation_list(&self) -> Result<Vec<LocalConversation>> {
        self.conversation_list_where("latest_msg_send_time != 0")
    }

    /// User-hidden conversations (retained flags, no visible latest message).
    pub fn get_hidden_conversation_list(&self) -> Result<Vec<LocalConversation>> {
        self.conversation_list_where("latest_msg_send_time = 0")
    }

    fn conversation_list_where(&self, predicate: &str) -> Result<Vec<LocalConversation>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM local_conversation WHERE {}",
            CONVERSATION_COLUMNS, predicate
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| Error::Storage(e.to_string()))?;
        let rows = stmt
            .query_map([], conversation_from_row)
            .map_err(|e| Error::Storage(e.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| Error::Storage(e.to_string()))?);
        }
        Ok(out)
    }

    fn insert_conversation(conn: &Connection, v: &LocalConversation) -> rusqlite::Result<()> {
        let sql = format!(
            "INSERT INTO local_conversation ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            CONVERSATION_COLUMNS
        );
        conn.execute(
            &sql,
            params![
                v.conversation_id,
                v.conversation_type,
                v.user_id,
                v.group_id,
                v.show_name,
                v.face_url,
                v.recv_msg_opt,
                v.unread_count,
                v.group_at_type,
                v.latest_msg,
                v.latest_msg_send_time,
                v.draft_text,
                v.draft_text_time,
                v.is_pinned as i32,
                v.is_private_chat as i32,
                v.burn_duration,
                v.is_not_in_group as i32,
                v.update_unread_count_time,
                v.attached_info,
                v.ex
            ],
        )?;
        Ok(())
    }

    /// Insert a batch of new conversation rows atomically.
    pub fn batch_insert_conversation_list(&self, list: &[LocalConversation]) -> Result<()> {
        if list.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(e.to_string()))?;
        for v in list {
            Self::insert_conversation(&tx, v)
                .map_err(|e| Error::Storage(format!("insert conversation: {}", e)))?;
        }
        tx.commit().map_err(|e| Error::Storage(e.to_string()))
    }

    /// Rewrite a batch of existing conversation rows atomically.
    pub fn batch_update_conversation_list(&self, list: &[LocalConversation]) -> Result<()> {
        if list.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(e.to_string()))?;
        for v in list {
            tx.execute(
                "UPDATE local_conversation SET conversation_type = ?, user_id = ?, \
                 group_id = ?, show_name = ?, face_url = ?, recv_msg_opt = ?, \
                 unread_count = ?, group_at_type = ?, latest_msg = ?, \
                 latest_msg_send_time = ?, draft_text = ?, draft_text_time = ?, \
                 is_pinned = ?, is_private_chat = ?, burn_duration = ?, \
                 is_not_in_group = ?, update_unread_count_time = ?, attached_info = ?, \
                 ex = ? WHERE conversation_id = ?",
                params![
                    v.conversation_type,
                    v.user_id,
                    v.group_id,
                    v.show_name,
                    v.face_url,
                    v.recv_msg_opt,
                    v.unread_count,
                    v.group_at_type,
                    v.latest_msg,
                    v.latest_msg_send_time,
                    v.draft_text,
                    v.draft_text_time,
                    v.is_pinned as i32,
                    v.is_private_chat as i32,
                    v.burn_duration,
                    v.is_not_in_group as i32,
                    v.update_unread_count_time,
                    v.attached_info,
                    v.ex,
                    v.conversation_id
                ],
            )
            .map_err(|e| Error::Storage(format!("update conversation: {}", e)))?;
        }
        tx.commit().map_err(|e| Error::Storage(e.to_string()))
    }

    // ---- unread rows ----

    /// Record the messages that contributed unread increments this batch.
    pub fn batch_insert_conversation_unread_message_list(
        &self,
        list: &[ConversationUnreadMessage],
    ) -> Result<()> {
        if list.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(e.to_string()))?;
        for v in list {
            tx.execute(
                "INSERT OR IGNORE INTO local_conversation_unread_message \
                 (conversation_id, client_msg_id, send_time) VALUES (?, ?, ?)",
                params![v.conversation_id, v.client_msg_id, v.send_time],
            )
            .map_err(|e| Error::Storage(format!("insert unread row: {}", e)))?;
        }
        tx.commit().map_err(|e| Error::Storage(e.to_string()))
    }

    /// Drop unread rows at or below the advanced read watermark.
    pub fn delete_conversation_unread_message_list(
        &self,
        conversation_id: &str,
        up_to_send_time: i64,
    ) -> Result<usize> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM local_conversation_unread_message \
             WHERE conversation_id = ? AND send_time <= ?",
            params![conversation_id, up_to_send_time],
        )
        .map_err(|e| Error::Storage(format!("delete unread rows: {}", e)))
    }

    /// Remaining unread rows for one conversation (diagnostics and tests).
    pub fn get_conversation_unread_message_list(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<ConversationUnreadMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT conversation_id, client_msg_id, send_time \
                 FROM local_conversation_unread_message WHERE conversation_id = ? \
                 ORDER BY send_time",
            )
            .map_err(|e| Error::Storage(e.to_string()))?;
        let rows = stmt
            .query_map(params![conversation_id], |row| {
                Ok(ConversationUnreadMessage {
                    conversation_id: row.get(0)?,
                    client_msg_id: row.get(1)?,
                    send_time: row.get(2)?,
                })
            })
            .map_err(|e| Error::Storage(e.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| Error::Storage(e.to_string()))?);
        }
        Ok(out)
    }
}
