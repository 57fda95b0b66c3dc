//! Custom agent persistence
//!
//! Project-defined agents live in the `agents` table, keyed by
//! (project_path, name). Reserved built-in names are rejected at the
//! creation path via `AgentRegistry::is_reserved_name`; the store itself is
//! name-agnostic.

use anyhow::Result;
use chrono::Utc;
use rusqlite::params;

use super::database::Database;
use crate::agents::config::{AgentConfig, AgentMode};

#[derive(Clone)]
pub struct AgentStore {
    db: Database,
}

impl AgentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn get(&self, project_path: &str, name: &str) -> Result<Option<AgentConfig>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT name, description, mode, hidden, provider, model, temperature,
                    top_p, max_steps, system_prompt, tools
             FROM agents WHERE project_path = ?1 AND name = ?2",
        )?;

        let record = stmt.query_row(params![project_path, name], Self::map_row);
        match record {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list(&self, project_path: &str) -> Result<Vec<AgentConfig>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT name, description, mode, hidden, provider, model, temperature,
                    top_p, max_steps, system_prompt, tools
             FROM agents WHERE project_path = ?1 ORDER BY name",
        )?;

        let rows = stmt.query_map([project_path], Self::map_row)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn upsert(&self, project_path: &str, agent: &AgentConfig) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let tools_json = serde_json::to_string(&agent.tools)?;

        self.db.conn().execute(
            "INSERT INTO agents (project_path, name, description, mode, hidden, provider,
                                 model, temperature, top_p, max_steps, system_prompt, tools, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(project_path, name) DO UPDATE SET
                 description = excluded.description,
                 mode = excluded.mode,
                 hidden = excluded.hidden,
                 provider = excluded.provider,
                 model = excluded.model,
                 temperature = excluded.temperature,
                 top_p = excluded.top_p,
                 max_steps = excluded.max_steps,
                 system_prompt = excluded.system_prompt,
                 tools = excluded.tools",
            params![
                project_path,
                agent.name,
                agent.description,
                agent.mode.as_str(),
                agent.hidden as i32,
                agent.provider,
                agent.model,
                agent.temperature,
                agent.top_p,
                agent.max_steps.map(|s| s as i64),
                agent.system_prompt,
                tools_json,
                now
            ],
        )?;
        Ok(())
    }

    pub fn delete(&self, project_path: &str, name: &str) -> Result<bool> {
        let changed = self.db.conn().execute(
            "DELETE FROM agents WHERE project_path = ?1 AND name = ?2",
            params![project_path, name],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<AgentConfig> {
        let tools_json: String = row.get(10)?;
        Ok(AgentConfig {
            name: row.get(0)?,
            description: row.get(1)?,
            mode: AgentMode::parse(&row.get::<_, String>(2)?),
            hidden: row.get::<_, i32>(3)? != 0,
            provider: row.get(4)?,
            model: row.get(5)?,
            temperature: row.get(6)?,
            top_p: row.get(7)?,
            max_steps: row.get::<_, Option<i64>>(8)?.map(|s| s as usize),
            system_prompt: row.get(9)?,
            tools: serde_json::from_str(&tools_json).unwrap_or_default(),
            is_builtin: false,
        })
    }
}
