//! Persistence layer
//!
//! SQLite-based storage for:
//! - Sessions (including parent/child linkage for sub-agent tasks)
//! - Messages (full-fidelity conversation content)
//! - Project-defined custom agents
//! - Provider credentials

mod agents;
mod credentials;
mod database;
mod messages;
mod sessions;

pub use agents::AgentStore;
pub use credentials::{CredentialResolver, CredentialStore};
pub use database::Database;
pub use messages::{MessageStore, StoredMessage};
pub use sessions::{NewSession, SessionRecord, SessionStatus, SessionStore};
