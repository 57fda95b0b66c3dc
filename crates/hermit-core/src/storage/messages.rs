//! Message persistence
//!
//! Messages store JSON-serialized `Vec<Content>` for full fidelity. The user
//! message is appended before the model is invoked, so a crash mid-run never
//! loses what was asked. Assistant rows carry usage and, on provider
//! failure, the error classification.

use anyhow::Result;
use chrono::Utc;
use rusqlite::params;

use super::database::Database;
use crate::ai::types::{Content, ModelMessage, Role, Usage};

/// A persisted message row
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl StoredMessage {
    /// Decode back into the provider message format. Rows that fail to
    /// decode are surfaced as plain text rather than dropped.
    pub fn to_model_message(&self) -> Option<ModelMessage> {
        let role = match self.role.as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => return None,
        };

        let content: Vec<Content> = serde_json::from_str(&self.content)
            .unwrap_or_else(|_| {
                vec![Content::Text {
                    text: self.content.clone(),
                }]
            });

        Some(ModelMessage { role, content })
    }
}

/// Message store scoped to one database
#[derive(Clone)]
pub struct MessageStore {
    db: Database,
}

impl MessageStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append a message and bump the session's message counter.
    pub fn append(&self, session_id: &str, role: Role, content: &[Content]) -> Result<i64> {
        self.append_raw(session_id, role, content, None, Usage::default())
    }

    /// Append an assistant message with its usage.
    pub fn append_assistant(
        &self,
        session_id: &str,
        content: &[Content],
        usage: Usage,
    ) -> Result<i64> {
        self.append_raw(session_id, Role::Assistant, content, None, usage)
    }

    /// Append an errored assistant message: whatever partial content was
    /// accumulated, plus the failure classification.
    pub fn append_errored(
        &self,
        session_id: &str,
        content: &[Content],
        error_type: &str,
        error_message: &str,
    ) -> Result<i64> {
        self.append_raw(
            session_id,
            Role::Assistant,
            content,
            Some((error_type, error_message)),
            Usage::default(),
        )
    }

    fn append_raw(
        &self,
        session_id: &str,
        role: Role,
        content: &[Content],
        error: Option<(&str, &str)>,
        usage: Usage,
    ) -> Result<i64> {
        let content_json = serde_json::to_string(content)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.db.conn();

        conn.execute(
            "INSERT INTO messages (session_id, role, content, error_type, error_message,
                                   input_tokens, output_tokens, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session_id,
                role.as_str(),
                content_json,
                error.map(|(t, _)| t),
                error.map(|(_, m)| m),
                usage.input_tokens as i64,
                usage.output_tokens as i64,
                now
            ],
        )?;
        let id = conn.last_insert_rowid();

        conn.execute(
            "UPDATE sessions SET message_count = message_count + 1, updated_at = ?1 WHERE id = ?2",
            params![now, session_id],
        )?;

        Ok(id)
    }

    /// All messages for a session, oldest first.
    pub fn list_by_session(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, role, content, error_type, error_message, input_tokens, output_tokens
             FROM messages WHERE session_id = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map([session_id], |row| {
            Ok(StoredMessage {
                id: row.get(0)?,
                role: row.get(1)?,
                content: row.get(2)?,
                error_type: row.get(3)?,
                error_message: row.get(4)?,
                input_tokens: row.get::<_, i64>(5)? as usize,
                output_tokens: row.get::<_, i64>(6)? as usize,
            })
        })?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Reconstruct the provider-facing conversation for a session.
    pub fn load_conversation(&self, session_id: &str) -> Result<Vec<ModelMessage>> {
        Ok(self
            .list_by_session(session_id)?
            .iter()
            .filter_map(StoredMessage::to_model_message)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sessions::{NewSession, SessionStore};

    fn setup() -> (SessionStore, MessageStore, String) {
        let db = Database::open_in_memory().unwrap();
        let sessions = SessionStore::new(db.clone());
        let messages = MessageStore::new(db);
        let id = sessions
            .create(NewSession {
                agent_name: "default".to_string(),
                ..Default::default()
            })
            .unwrap();
        (sessions, messages, id)
    }

    #[test]
    fn append_and_reload_conversation() {
        let (_sessions, messages, session_id) = setup();

        messages
            .append(
                &session_id,
                Role::User,
                &[Content::Text {
                    text: "hi".to_string(),
                }],
            )
            .unwrap();
        messages
            .append_assistant(
                &session_id,
                &[Content::Text {
                    text: "hello".to_string(),
                }],
                Usage {
                    input_tokens: 5,
                    output_tokens: 3,
                    cost_usd: None,
                },
            )
            .unwrap();

        let conversation = messages.load_conversation(&session_id).unwrap();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[0].role, Role::User);
        assert_eq!(conversation[1].role, Role::Assistant);
    }

    #[test]
    fn append_bumps_message_count() {
        let (sessions, messages, session_id) = setup();

        for _ in 0..3 {
            messages
                .append(
                    &session_id,
                    Role::User,
                    &[Content::Text {
                        text: "x".to_string(),
                    }],
                )
                .unwrap();
        }

        assert_eq!(sessions.get(&session_id).unwrap().unwrap().message_count, 3);
    }

    #[test]
    fn errored_assistant_row_keeps_classification() {
        let (_sessions, messages, session_id) = setup();

        messages
            .append_errored(&session_id, &[], "provider_failure", "connection reset")
            .unwrap();

        let rows = messages.list_by_session(&session_id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].error_type.as_deref(), Some("provider_failure"));
        assert_eq!(rows[0].error_message.as_deref(), Some("connection reset"));
    }
}
