//! Agent configuration types

use serde::{Deserialize, Serialize};

/// Where an agent may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Only as the top-level agent of a session
    Primary,
    /// Only as a spawned sub-agent
    Subagent,
    /// Either
    #[default]
    All,
}

impl AgentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Primary => "primary",
            AgentMode::Subagent => "subagent",
            AgentMode::All => "all",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "primary" => AgentMode::Primary,
            "subagent" => AgentMode::Subagent,
            _ => AgentMode::All,
        }
    }
}

/// A named agent configuration: the prompt, model settings, and allowed
/// tool set that govern one turn loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub mode: AgentMode,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub top_p: Option<f32>,
    #[serde(default)]
    pub max_steps: Option<usize>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Allowed tool names, in preference order. Empty means "every tool
    /// available to the caller".
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub is_builtin: bool,
}

/// Partial overrides applied on top of a base configuration
#[derive(Debug, Clone, Default)]
pub struct AgentOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_steps: Option<usize>,
    pub system_prompt: Option<String>,
    /// When present, fully replaces the base tool list (no union).
    pub tools: Option<Vec<String>>,
}

/// Shallow-merge overrides onto a base configuration. Scalar fields are
/// replaced when set; a present `tools` replaces the base list outright.
pub fn merge(base: &AgentConfig, overrides: &AgentOverrides) -> AgentConfig {
    let mut merged = base.clone();
    if overrides.provider.is_some() {
        merged.provider = overrides.provider.clone();
    }
    if overrides.model.is_some() {
        merged.model = overrides.model.clone();
    }
    if overrides.temperature.is_some() {
        merged.temperature = overrides.temperature;
    }
    if overrides.top_p.is_some() {
        merged.top_p = overrides.top_p;
    }
    if overrides.max_steps.is_some() {
        merged.max_steps = overrides.max_steps;
    }
    if overrides.system_prompt.is_some() {
        merged.system_prompt = overrides.system_prompt.clone();
    }
    if let Some(tools) = &overrides.tools {
        merged.tools = tools.clone();
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AgentConfig {
        AgentConfig {
            name: "base".to_string(),
            description: String::new(),
            mode: AgentMode::All,
            hidden: false,
            provider: None,
            model: Some("model-a".to_string()),
            temperature: Some(0.7),
            top_p: None,
            max_steps: Some(25),
            system_prompt: None,
            tools: vec!["read".to_string(), "write".to_string()],
            is_builtin: false,
        }
    }

    #[test]
    fn merge_overrides_scalars_and_keeps_rest() {
        let merged = merge(
            &base(),
            &AgentOverrides {
                temperature: Some(0.2),
                ..Default::default()
            },
        );

        assert_eq!(merged.temperature, Some(0.2));
        assert_eq!(merged.model.as_deref(), Some("model-a"));
        assert_eq!(merged.max_steps, Some(25));
    }

    #[test]
    fn merge_tools_replaces_not_unions() {
        let merged = merge(
            &base(),
            &AgentOverrides {
                tools: Some(vec!["grep".to_string()]),
                ..Default::default()
            },
        );

        assert_eq!(merged.tools, vec!["grep".to_string()]);
    }
}
