//! Agent resolution: built-ins first, then project-defined custom agents
//!
//! Built-in names are reserved. A custom agent stored under a reserved name
//! is unreachable by design - lookup never consults the store for those
//! names, so there is nothing to error about.

use once_cell::sync::Lazy;

use super::config::{AgentConfig, AgentMode};
use crate::storage::{AgentStore, Database};

const DEFAULT_TURN_BUDGET: usize = 25;

static BUILTIN_AGENTS: Lazy<Vec<AgentConfig>> = Lazy::new(|| {
    vec![
        AgentConfig {
            name: "default".to_string(),
            description: "General-purpose coding agent with the full tool set".to_string(),
            mode: AgentMode::All,
            hidden: false,
            provider: None,
            model: None,
            temperature: None,
            top_p: None,
            max_steps: Some(25),
            system_prompt: Some(
                "You are a software engineering agent working in a project directory. \
                 Use the available tools to read, search, and modify files and to run \
                 commands. Make the smallest change that solves the task, verify your \
                 work, and report what you did."
                    .to_string(),
            ),
            tools: Vec::new(),
            is_builtin: true,
        },
        AgentConfig {
            name: "explore".to_string(),
            description: "Read-only codebase exploration sub-agent".to_string(),
            mode: AgentMode::Subagent,
            hidden: false,
            provider: None,
            model: None,
            temperature: None,
            top_p: None,
            max_steps: Some(15),
            system_prompt: Some(
                "You are a codebase explorer with read-only access. Start with glob or \
                 list to discover structure, grep to find patterns, and read to inspect \
                 the relevant files. Be thorough: examine multiple files, then answer \
                 with specific file and line references."
                    .to_string(),
            ),
            tools: vec![
                "read".to_string(),
                "glob".to_string(),
                "grep".to_string(),
                "list".to_string(),
            ],
            is_builtin: true,
        },
        AgentConfig {
            name: "plan".to_string(),
            description: "Planning agent: investigates and produces a plan without editing".to_string(),
            mode: AgentMode::All,
            hidden: false,
            provider: None,
            model: None,
            temperature: None,
            top_p: None,
            max_steps: Some(20),
            system_prompt: Some(
                "You are a planning agent. Investigate the codebase with the read-only \
                 tools, delegate deeper investigation with the task tool, and produce a \
                 concrete step-by-step plan. Do not modify any files."
                    .to_string(),
            ),
            tools: vec![
                "read".to_string(),
                "glob".to_string(),
                "grep".to_string(),
                "list".to_string(),
                "task".to_string(),
            ],
            is_builtin: true,
        },
    ]
});

/// Filters for `AgentRegistry::list`
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub mode: Option<AgentMode>,
    pub include_hidden: bool,
    pub builtin_only: bool,
    pub custom_only: bool,
}

/// Resolves agent names to configurations. Built-ins are process-wide
/// constants and always win; custom agents come from the project's store.
pub struct AgentRegistry;

impl AgentRegistry {
    /// All built-in configurations.
    pub fn builtins() -> &'static [AgentConfig] {
        &BUILTIN_AGENTS
    }

    /// True for every built-in name. The custom-agent creation path uses
    /// this to reject collisions up front.
    pub fn is_reserved_name(name: &str) -> bool {
        BUILTIN_AGENTS.iter().any(|a| a.name == name)
    }

    /// Resolve a name to a configuration.
    ///
    /// Built-ins are checked first and need no database. Custom agents are
    /// consulted only when both a database and a project path are supplied.
    pub fn get(db: Option<&Database>, name: &str, project_path: Option<&str>) -> Option<AgentConfig> {
        if let Some(builtin) = BUILTIN_AGENTS.iter().find(|a| a.name == name) {
            return Some(builtin.clone());
        }

        let (db, project_path) = (db?, project_path?);
        match AgentStore::new(db.clone()).get(project_path, name) {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(agent = name, "Failed to load custom agent: {}", e);
                None
            }
        }
    }

    /// Merge built-ins and custom agents, filter, and sort by name.
    pub fn list(
        db: Option<&Database>,
        project_path: Option<&str>,
        filter: &ListFilter,
    ) -> Vec<AgentConfig> {
        let mut agents: Vec<AgentConfig> = Vec::new();

        if !filter.custom_only {
            agents.extend(BUILTIN_AGENTS.iter().cloned());
        }

        if !filter.builtin_only {
            if let (Some(db), Some(project_path)) = (db, project_path) {
                match AgentStore::new(db.clone()).list(project_path) {
                    Ok(custom) => {
                        // Reserved names never surface a custom record.
                        agents.extend(
                            custom
                                .into_iter()
                                .filter(|a| !Self::is_reserved_name(&a.name)),
                        );
                    }
                    Err(e) => tracing::warn!("Failed to list custom agents: {}", e),
                }
            }
        }

        agents.retain(|a| {
            (filter.include_hidden || !a.hidden)
                && filter
                    .mode
                    .map(|m| a.mode == m || a.mode == AgentMode::All)
                    .unwrap_or(true)
        });
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        agents
    }

    /// Resolve the tool names an agent may use.
    ///
    /// An agent with no declared tools is granted everything in `available`
    /// (or its own empty set if no filter is given). Otherwise the result is
    /// the intersection of the declaration with `available`, in declaration
    /// order - the narrower permission always wins.
    pub fn resolve_tools(agent: &AgentConfig, available: Option<&[String]>) -> Vec<String> {
        match (agent.tools.is_empty(), available) {
            (true, Some(available)) => available.to_vec(),
            (true, None) => Vec::new(),
            (false, Some(available)) => agent
                .tools
                .iter()
                .filter(|t| available.contains(t))
                .cloned()
                .collect(),
            (false, None) => agent.tools.clone(),
        }
    }

    /// Per-agent-type default turn budget for spawned tasks.
    pub fn turn_budget(subagent_type: &str) -> usize {
        match subagent_type {
            "explore" => 15,
            "plan" => 20,
            _ => DEFAULT_TURN_BUDGET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn builtins_resolve_without_database() {
        let agent = AgentRegistry::get(None, "default", None).unwrap();
        assert!(agent.is_builtin);
        assert_eq!(agent.max_steps, Some(25));

        let explore = AgentRegistry::get(None, "explore", None).unwrap();
        assert_eq!(explore.mode, AgentMode::Subagent);
        assert!(!explore.tools.contains(&"write".to_string()));
    }

    #[test]
    fn reserved_name_always_resolves_builtin() {
        let db = Database::open_in_memory().unwrap();
        let store = AgentStore::new(db.clone());

        // A custom record under a reserved name is unreachable.
        let shadow = AgentConfig {
            name: "default".to_string(),
            description: "impostor".to_string(),
            mode: AgentMode::All,
            hidden: false,
            provider: None,
            model: Some("other-model".to_string()),
            temperature: None,
            top_p: None,
            max_steps: Some(1),
            system_prompt: None,
            tools: Vec::new(),
            is_builtin: false,
        };
        store.upsert("/proj", &shadow).unwrap();

        let resolved = AgentRegistry::get(Some(&db), "default", Some("/proj")).unwrap();
        assert!(resolved.is_builtin);
        assert_ne!(resolved.description, "impostor");
    }

    #[test]
    fn custom_agents_need_db_and_project_path() {
        let db = Database::open_in_memory().unwrap();
        let custom = AgentConfig {
            name: "reviewer".to_string(),
            description: "code review".to_string(),
            mode: AgentMode::All,
            hidden: false,
            provider: None,
            model: None,
            temperature: None,
            top_p: None,
            max_steps: None,
            system_prompt: None,
            tools: vec!["read".to_string()],
            is_builtin: false,
        };
        AgentStore::new(db.clone()).upsert("/proj", &custom).unwrap();

        assert!(AgentRegistry::get(Some(&db), "reviewer", Some("/proj")).is_some());
        assert!(AgentRegistry::get(None, "reviewer", Some("/proj")).is_none());
        assert!(AgentRegistry::get(Some(&db), "reviewer", None).is_none());
    }

    #[test]
    fn resolve_tools_intersects() {
        let mut agent = AgentRegistry::get(None, "default", None).unwrap();
        agent.tools = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let available = vec!["a".to_string(), "b".to_string()];

        assert_eq!(
            AgentRegistry::resolve_tools(&agent, Some(&available)),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn resolve_tools_empty_declaration_grants_available() {
        let mut agent = AgentRegistry::get(None, "default", None).unwrap();
        agent.tools = Vec::new();
        let available = vec!["x".to_string(), "y".to_string(), "z".to_string()];

        assert_eq!(
            AgentRegistry::resolve_tools(&agent, Some(&available)),
            available
        );
    }

    #[test]
    fn turn_budgets_per_type() {
        assert_eq!(AgentRegistry::turn_budget("default"), 25);
        assert_eq!(AgentRegistry::turn_budget("explore"), 15);
        assert_eq!(AgentRegistry::turn_budget("plan"), 20);
        assert_eq!(AgentRegistry::turn_budget("anything-else"), 25);
    }

    #[test]
    fn list_merges_custom_and_respects_origin_filters() {
        let db = Database::open_in_memory().unwrap();
        let custom = AgentConfig {
            name: "auditor".to_string(),
            description: "security audit".to_string(),
            mode: AgentMode::All,
            hidden: false,
            provider: None,
            model: None,
            temperature: None,
            top_p: None,
            max_steps: None,
            system_prompt: None,
            tools: Vec::new(),
            is_builtin: false,
        };
        AgentStore::new(db.clone()).upsert("/proj", &custom).unwrap();

        let merged = AgentRegistry::list(Some(&db), Some("/proj"), &ListFilter::default());
        assert!(merged.iter().any(|a| a.name == "auditor"));
        assert!(merged.iter().any(|a| a.name == "default"));

        let builtin_only = AgentRegistry::list(
            Some(&db),
            Some("/proj"),
            &ListFilter {
                builtin_only: true,
                ..Default::default()
            },
        );
        assert!(builtin_only.iter().all(|a| a.is_builtin));

        let custom_only = AgentRegistry::list(
            Some(&db),
            Some("/proj"),
            &ListFilter {
                custom_only: true,
                ..Default::default()
            },
        );
        assert_eq!(custom_only.len(), 1);
        assert_eq!(custom_only[0].name, "auditor");
    }

    #[test]
    fn list_is_sorted_and_filters_mode() {
        let agents = AgentRegistry::list(None, None, &ListFilter::default());
        let names: Vec<&str> = agents.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["default", "explore", "plan"]);

        let primary_only = AgentRegistry::list(
            None,
            None,
            &ListFilter {
                mode: Some(AgentMode::Primary),
                ..Default::default()
            },
        );
        assert!(primary_only.iter().all(|a| a.name != "explore"));
    }
}
