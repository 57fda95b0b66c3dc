//! Provider credential storage and resolution

use anyhow::Result;
use chrono::Utc;
use rusqlite::params;

use super::database::Database;

/// API keys per provider, stored in the database
#[derive(Clone)]
pub struct CredentialStore {
    db: Database,
}

impl CredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn get(&self, provider: &str) -> Result<Option<String>> {
        let conn = self.db.conn();
        let key = conn.query_row(
            "SELECT api_key FROM credentials WHERE provider = ?1",
            [provider],
            |row| row.get::<_, String>(0),
        );
        match key {
            Ok(k) => Ok(Some(k)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set(&self, provider: &str, api_key: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.conn().execute(
            "INSERT INTO credentials (provider, api_key, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(provider) DO UPDATE SET api_key = excluded.api_key,
                                                 updated_at = excluded.updated_at",
            params![provider, api_key, now],
        )?;
        Ok(())
    }
}

/// Resolves the active API key for a provider: an explicit override wins,
/// otherwise the store is consulted. Consumed by the composition root when
/// constructing a real completion client.
pub struct CredentialResolver {
    override_key: Option<String>,
    store: Option<CredentialStore>,
}

impl CredentialResolver {
    pub fn new(override_key: Option<String>, store: Option<CredentialStore>) -> Self {
        Self {
            override_key,
            store,
        }
    }

    pub fn resolve(&self, provider: &str) -> Option<String> {
        if let Some(key) = &self.override_key {
            return Some(key.clone());
        }
        self.store
            .as_ref()
            .and_then(|s| s.get(provider).ok().flatten())
    }
}
