//! Hermit CLI
//!
//! Inspection and administration for the Hermit runtime: sessions, agents,
//! tools, and provider credentials. The turn loop itself is driven by hosts
//! that embed `hermit-core` together with a completion provider; this binary
//! is the local composition/administration surface.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hermit_core::agents::{AgentRegistry, ListFilter};
use hermit_core::storage::{CredentialStore, Database, SessionStore};
use hermit_core::tools::{register_all_tools, ToolRegistry};

#[derive(Parser)]
#[command(name = "hermit", about = "Agent orchestration runtime", version)]
struct Cli {
    /// Database path (default: platform data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List sessions, newest first
    Sessions {
        /// Only sessions for this working directory
        #[arg(long)]
        dir: Option<String>,
    },

    /// List available agents
    Agents {
        /// Project path for custom agents
        #[arg(long)]
        project: Option<String>,
        /// Include hidden agents
        #[arg(long)]
        all: bool,
    },

    /// List registered tools
    Tools,

    /// Manage provider credentials
    Credentials {
        #[command(subcommand)]
        action: CredentialAction,
    },
}

#[derive(Subcommand)]
enum CredentialAction {
    /// Store an API key for a provider
    Set { provider: String, api_key: String },
    /// Show whether a key is stored for a provider
    Show { provider: String },
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hermit")
        .join("hermit.db")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db = Database::open(&cli.db.clone().unwrap_or_else(default_db_path))?;

    match cli.command {
        Command::Sessions { dir } => {
            let sessions = SessionStore::new(db).list(dir.as_deref())?;
            if sessions.is_empty() {
                println!("No sessions.");
                return Ok(());
            }
            for s in sessions {
                let parent = s
                    .parent_session_id
                    .map(|p| format!("  (child of {})", &p[..8.min(p.len())]))
                    .unwrap_or_default();
                println!(
                    "{}  {:<8} {:<10} {:>4} msgs  {:>7} tok  {}{}",
                    s.id,
                    s.agent_name,
                    s.status.as_str(),
                    s.message_count,
                    s.input_tokens + s.output_tokens,
                    s.title,
                    parent
                );
            }
        }

        Command::Agents { project, all } => {
            let filter = ListFilter {
                include_hidden: all,
                ..Default::default()
            };
            for agent in AgentRegistry::list(Some(&db), project.as_deref(), &filter) {
                let origin = if agent.is_builtin { "builtin" } else { "custom" };
                let tools = if agent.tools.is_empty() {
                    "all tools".to_string()
                } else {
                    agent.tools.join(", ")
                };
                println!(
                    "{:<12} {:<8} [{}]  {}",
                    agent.name, origin, tools, agent.description
                );
            }
        }

        Command::Tools => {
            let registry = ToolRegistry::new();
            register_all_tools(&registry).await;
            for entry in registry.get_all().await {
                let gate = if entry.requires_code_execution {
                    " (requires code execution)"
                } else {
                    ""
                };
                println!(
                    "{:<8} {}{}",
                    entry.tool.name(),
                    entry.tool.description(),
                    gate
                );
            }
        }

        Command::Credentials { action } => {
            let store = CredentialStore::new(db);
            match action {
                CredentialAction::Set { provider, api_key } => {
                    store.set(&provider, &api_key)?;
                    println!("Stored key for '{}'", provider);
                }
                CredentialAction::Show { provider } => match store.get(&provider)? {
                    Some(key) => {
                        let tail = &key[key.len().saturating_sub(4)..];
                        println!("{}: ...{}", provider, tail);
                    }
                    None => println!("{}: no key stored", provider),
                },
            }
        }
    }

    Ok(())
}
