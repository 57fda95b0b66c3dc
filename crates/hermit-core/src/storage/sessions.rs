//! Session CRUD operations

use anyhow::Result;
use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::database::Database;
use crate::ai::types::Usage;

/// Lifecycle state of a session's most recent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Running,
    Complete,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Running => "running",
            SessionStatus::Complete => "complete",
            SessionStatus::Error => "error",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "running" => SessionStatus::Running,
            "complete" => SessionStatus::Complete,
            "error" => SessionStatus::Error,
            _ => SessionStatus::Idle,
        }
    }
}

/// Persisted session row
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub title: String,
    pub agent_name: String,
    /// Set only for sessions spawned as sub-agent tasks
    pub parent_session_id: Option<String>,
    pub status: SessionStatus,
    pub working_dir: Option<String>,
    pub user_id: Option<String>,
    /// Per-session system prompt override
    pub system_prompt: Option<String>,
    pub message_count: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub cost_usd: f64,
}

/// Fields for creating a session
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub agent_name: String,
    pub parent_session_id: Option<String>,
    pub title: String,
    pub working_dir: Option<String>,
    pub user_id: Option<String>,
    pub system_prompt: Option<String>,
}

/// Session store for CRUD operations
#[derive(Clone)]
pub struct SessionStore {
    db: Database,
}

impl SessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create(&self, new: NewSession) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        self.db.conn().execute(
            "INSERT INTO sessions (id, title, agent_name, parent_session_id, status,
                                   working_dir, user_id, system_prompt, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'idle', ?5, ?6, ?7, ?8, ?8)",
            params![
                id,
                new.title,
                new.agent_name,
                new.parent_session_id,
                new.working_dir,
                new.user_id,
                new.system_prompt,
                now
            ],
        )?;

        Ok(id)
    }

    pub fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, title, agent_name, parent_session_id, status, working_dir,
                    user_id, system_prompt, message_count, input_tokens, output_tokens, cost_usd
             FROM sessions WHERE id = ?1",
        )?;

        let record = stmt.query_row([session_id], |row| {
            Ok(SessionRecord {
                id: row.get(0)?,
                title: row.get(1)?,
                agent_name: row.get(2)?,
                parent_session_id: row.get(3)?,
                status: SessionStatus::parse(&row.get::<_, String>(4)?),
                working_dir: row.get(5)?,
                user_id: row.get(6)?,
                system_prompt: row.get(7)?,
                message_count: row.get::<_, i64>(8)? as usize,
                input_tokens: row.get::<_, i64>(9)? as usize,
                output_tokens: row.get::<_, i64>(10)? as usize,
                cost_usd: row.get(11)?,
            })
        });

        match record {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List sessions, newest first, optionally filtered by working directory.
    pub fn list(&self, working_dir: Option<&str>) -> Result<Vec<SessionRecord>> {
        let conn = self.db.conn();
        let base = "SELECT id, title, agent_name, parent_session_id, status, working_dir,
                           user_id, system_prompt, message_count, input_tokens, output_tokens, cost_usd
                    FROM sessions";

        let map_row = |row: &rusqlite::Row| -> rusqlite::Result<SessionRecord> {
            Ok(SessionRecord {
                id: row.get(0)?,
                title: row.get(1)?,
                agent_name: row.get(2)?,
                parent_session_id: row.get(3)?,
                status: SessionStatus::parse(&row.get::<_, String>(4)?),
                working_dir: row.get(5)?,
                user_id: row.get(6)?,
                system_prompt: row.get(7)?,
                message_count: row.get::<_, i64>(8)? as usize,
                input_tokens: row.get::<_, i64>(9)? as usize,
                output_tokens: row.get::<_, i64>(10)? as usize,
                cost_usd: row.get(11)?,
            })
        };

        if let Some(dir) = working_dir {
            let mut stmt =
                conn.prepare(&format!("{} WHERE working_dir = ?1 ORDER BY updated_at DESC", base))?;
            let rows = stmt.query_map([dir], map_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
        } else {
            let mut stmt = conn.prepare(&format!("{} ORDER BY updated_at DESC", base))?;
            let rows = stmt.query_map([], map_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
        }
    }

    pub fn set_status(&self, session_id: &str, status: SessionStatus) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.conn().execute(
            "UPDATE sessions SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now, session_id],
        )?;
        Ok(())
    }

    /// Fold one run's usage into the session counters.
    pub fn record_usage(&self, session_id: &str, usage: &Usage) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.conn().execute(
            "UPDATE sessions SET
                input_tokens = input_tokens + ?1,
                output_tokens = output_tokens + ?2,
                cost_usd = cost_usd + ?3,
                updated_at = ?4
             WHERE id = ?5",
            params![
                usage.input_tokens as i64,
                usage.output_tokens as i64,
                usage.cost_usd.unwrap_or(0.0),
                now,
                session_id
            ],
        )?;
        Ok(())
    }

    /// Set the title if none has been derived yet.
    pub fn set_title_if_empty(&self, session_id: &str, title: &str) -> Result<()> {
        self.db.conn().execute(
            "UPDATE sessions SET title = ?1 WHERE id = ?2 AND title = ''",
            params![title, session_id],
        )?;
        Ok(())
    }

    /// Derive a session title from the first user message: first line,
    /// word-boundary truncation around 50 chars, char-safe for UTF-8.
    pub fn derive_title(content: &str) -> String {
        let first_line = content.lines().next().unwrap_or("").trim();
        let char_count = first_line.chars().count();

        if char_count <= 50 {
            return first_line.to_string();
        }

        let first_50: String = first_line.chars().take(50).collect();
        if let Some(last_space) = first_50.rfind(char::is_whitespace) {
            let char_idx = first_50[..last_space].chars().count();
            if char_idx > 20 {
                let prefix: String = first_line.chars().take(char_idx).collect();
                return format!("{}...", prefix.trim_end());
            }
        }

        let truncated: String = first_line.chars().take(47).collect();
        format!("{}...", truncated)
    }
}
