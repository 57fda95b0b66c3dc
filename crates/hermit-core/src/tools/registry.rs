//! Tool registry and execution contract
//!
//! Tools are registered once at startup (first registration wins) and
//! exported per-run as a filtered `ToolSet`: an allow-list intersection plus
//! a central gate on tools that require code execution permission.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::ai::types::AiTool;
use crate::storage::Database;
use crate::tools::path_guard;

/// Tool category, used for filtered listing and permission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    Filesystem,
    Search,
    Execution,
    Agent,
    Other,
}

/// Stable failure codes carried in `ToolResult` metadata.
pub mod codes {
    pub const INVALID_PARAMETERS: &str = "invalid_parameters";
    pub const INVALID_PATTERN: &str = "invalid_pattern";
    pub const ACCESS_DENIED: &str = "access_denied";
    pub const NOT_FOUND: &str = "not_found";
    pub const IS_DIRECTORY: &str = "is_directory";
    pub const AMBIGUOUS: &str = "ambiguous";
    pub const TIMEOUT: &str = "timeout";
    pub const COMMAND_FAILED: &str = "command_failed";
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
    pub const TOOL_ERROR: &str = "tool_error";
}

/// Result of one tool invocation. Produced fresh per call, never mutated
/// after return. `success = false` is an expected outcome (ambiguous edit,
/// missing file) and is distinct from an orchestrator-level error.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub title: String,
    pub output: String,
    pub metadata: Option<Map<String, Value>>,
    pub success: bool,
}

impl ToolResult {
    /// Create a success result
    pub fn ok(title: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            output: output.into(),
            metadata: None,
            success: true,
        }
    }

    /// Create a success result with metadata (must be a JSON object)
    pub fn ok_with(title: impl Into<String>, output: impl Into<String>, metadata: Value) -> Self {
        let mut result = Self::ok(title, output);
        if let Value::Object(map) = metadata {
            result.metadata = Some(map);
        }
        result
    }

    /// Create a failure result with a stable machine-readable code
    pub fn fail(code: &str, title: impl Into<String>, output: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("code".to_string(), Value::String(code.to_string()));
        Self {
            title: title.into(),
            output: output.into(),
            metadata: Some(metadata),
            success: false,
        }
    }

    /// Create a failure result with extra metadata alongside the code
    pub fn fail_with(
        code: &str,
        title: impl Into<String>,
        output: impl Into<String>,
        metadata: Value,
    ) -> Self {
        let mut result = Self::fail(code, title, output);
        if let Value::Object(map) = metadata {
            let entries = result.metadata.get_or_insert_with(Map::new);
            for (k, v) in map {
                entries.insert(k, v);
            }
        }
        result
    }

    /// Create an invalid-parameters failure
    pub fn invalid_parameters(msg: impl std::fmt::Display) -> Self {
        Self::fail(
            codes::INVALID_PARAMETERS,
            "Invalid parameters",
            msg.to_string(),
        )
    }

    /// The failure code, if this result carries one
    pub fn code(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("code"))
            .and_then(|v| v.as_str())
    }

    /// Serialize into the JSON shape fed back to the model
    pub fn to_value(&self) -> Value {
        let mut envelope = Map::new();
        envelope.insert("title".to_string(), Value::String(self.title.clone()));
        envelope.insert("output".to_string(), Value::String(self.output.clone()));
        envelope.insert("success".to_string(), Value::Bool(self.success));
        if let Some(metadata) = &self.metadata {
            envelope.insert("metadata".to_string(), Value::Object(metadata.clone()));
        }
        Value::Object(envelope)
    }
}

/// Parse tool parameters, returning a ToolResult failure on mismatch
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolResult> {
    serde_json::from_value(params).map_err(|e| ToolResult::invalid_parameters(e))
}

/// Progress update emitted by long-running tools
#[derive(Debug, Clone)]
pub struct ToolProgress {
    pub tool_call_id: String,
    pub metadata: Value,
}

/// Per-call execution context. Not persisted; built by the orchestrator for
/// each run and shared by every tool call in it.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Project root. Absolute and canonicalized; every filesystem/search
    /// tool must stay inside it.
    pub project_path: PathBuf,
    pub project_id: Option<String>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    /// Cooperative cancellation; long-running tools treat it like a timeout.
    pub cancel: CancellationToken,
    pub db: Option<Database>,
    progress_tx: Option<mpsc::UnboundedSender<ToolProgress>>,
    pub tool_call_id: Option<String>,
}

impl ExecutionContext {
    pub fn new(project_path: PathBuf) -> Self {
        Self {
            project_path,
            project_id: None,
            session_id: None,
            user_id: None,
            cancel: CancellationToken::new(),
            db: None,
            progress_tx: None,
            tool_call_id: None,
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_db(mut self, db: Database) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_progress(
        mut self,
        tx: mpsc::UnboundedSender<ToolProgress>,
        tool_call_id: impl Into<String>,
    ) -> Self {
        self.progress_tx = Some(tx);
        self.tool_call_id = Some(tool_call_id.into());
        self
    }

    /// Report intermediate metadata (e.g. bytes of output so far).
    pub fn update_metadata(&self, metadata: Value) {
        if let (Some(tx), Some(id)) = (&self.progress_tx, &self.tool_call_id) {
            let _ = tx.send(ToolProgress {
                tool_call_id: id.clone(),
                metadata,
            });
        }
    }

    /// Resolve a path that must already exist, enforcing project containment.
    pub fn resolve_existing(&self, path: &str) -> Result<PathBuf, ToolResult> {
        path_guard::resolve_existing(path, &self.project_path)
    }

    /// Resolve a path that may not exist yet (write targets), enforcing
    /// containment against the nearest existing ancestor.
    pub fn resolve_for_write(&self, path: &str) -> Result<PathBuf, ToolResult> {
        path_guard::resolve_for_write(path, &self.project_path)
    }
}

/// Trait for tool implementations
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (unique registry key)
    fn name(&self) -> &str;

    /// Tool description shown to the model
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool. Expected failures come back as unsuccessful
    /// `ToolResult`s, never as panics or errors.
    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> ToolResult;
}

/// A tool plus its registry metadata
#[derive(Clone)]
pub struct RegisteredTool {
    pub tool: Arc<dyn Tool>,
    pub category: ToolCategory,
    pub requires_code_execution: bool,
}

/// Process-wide tool catalog. Registration happens during startup; lookups
/// are read-many afterwards.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, RegisteredTool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool. Idempotent: if the name is already taken the call is
    /// a no-op and the first registration stays, so repeated module
    /// initialization never duplicates or replaces tools.
    pub async fn register(
        &self,
        tool: Arc<dyn Tool>,
        category: ToolCategory,
        requires_code_execution: bool,
    ) {
        let name = tool.name().to_string();
        let mut tools = self.tools.write().await;
        if tools.contains_key(&name) {
            tracing::debug!(tool = %name, "Tool already registered, keeping first registration");
            return;
        }
        tools.insert(
            name,
            RegisteredTool {
                tool,
                category,
                requires_code_execution,
            },
        );
    }

    pub async fn get(&self, name: &str) -> Option<RegisteredTool> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn has(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    pub async fn len(&self) -> usize {
        self.tools.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tools.read().await.is_empty()
    }

    /// All registered tool names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn get_all(&self) -> Vec<RegisteredTool> {
        let tools = self.tools.read().await;
        let mut all: Vec<_> = tools.values().cloned().collect();
        all.sort_by(|a, b| a.tool.name().cmp(b.tool.name()));
        all
    }

    pub async fn get_by_category(&self, category: ToolCategory) -> Vec<RegisteredTool> {
        let tools = self.tools.read().await;
        let mut matching: Vec<_> = tools
            .values()
            .filter(|t| t.category == category)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.tool.name().cmp(b.tool.name()));
        matching
    }

    /// Export the callable subset for one run.
    ///
    /// Filters by the optional name allow-list (preserving its order) and
    /// drops every tool with `requires_code_execution` when the caller lacks
    /// that capability. The gate lives here, centrally - tools never check
    /// the flag themselves.
    pub async fn export_callable(
        &self,
        ctx: ExecutionContext,
        tool_names: Option<&[String]>,
        can_execute_code: bool,
    ) -> ToolSet {
        let tools = self.tools.read().await;

        let mut entries: Vec<RegisteredTool> = match tool_names {
            Some(names) => names
                .iter()
                .filter_map(|name| tools.get(name).cloned())
                .collect(),
            None => {
                let mut all: Vec<_> = tools.values().cloned().collect();
                all.sort_by(|a, b| a.tool.name().cmp(b.tool.name()));
                all
            }
        };

        entries.retain(|t| can_execute_code || !t.requires_code_execution);

        ToolSet {
            entries,
            ctx: Arc::new(ctx),
        }
    }
}

/// The filtered, context-bound tool set handed to one orchestrator run.
pub struct ToolSet {
    entries: Vec<RegisteredTool>,
    ctx: Arc<ExecutionContext>,
}

impl ToolSet {
    /// Provider-facing definitions for the completion call.
    pub fn definitions(&self) -> Vec<AiTool> {
        self.entries
            .iter()
            .map(|t| AiTool {
                name: t.tool.name().to_string(),
                description: t.tool.description().to_string(),
                input_schema: t.tool.parameters_schema(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|t| t.tool.name()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|t| t.tool.name() == name)
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Invoke a tool from this set. A name outside the set comes back as an
    /// unknown-tool failure rather than an error, so one bad call never
    /// aborts the turn loop.
    pub async fn invoke(&self, name: &str, params: Value) -> ToolResult {
        self.invoke_as(None, name, params).await
    }

    /// Invoke with a tool-call id attached, so progress updates from the
    /// tool can be correlated with the model's call.
    pub async fn invoke_as(
        &self,
        call_id: Option<&str>,
        name: &str,
        params: Value,
    ) -> ToolResult {
        let Some(entry) = self.entries.iter().find(|t| t.tool.name() == name) else {
            return ToolResult::fail(
                codes::UNKNOWN_TOOL,
                "Unknown tool",
                format!("Tool '{}' is not available in this session", name),
            );
        };

        tracing::info!(tool = name, "Executing tool");
        match call_id {
            Some(id) => {
                let mut ctx = (*self.ctx).clone();
                ctx.tool_call_id = Some(id.to_string());
                entry.tool.execute(params, &ctx).await
            }
            None => entry.tool.execute(params, &self.ctx).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct StubTool {
        name: &'static str,
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "stub"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "additionalProperties": false})
        }

        async fn execute(&self, _params: Value, _ctx: &ExecutionContext) -> ToolResult {
            ToolResult::ok("Stub", self.name)
        }
    }

    fn test_ctx() -> ExecutionContext {
        ExecutionContext::new(std::env::temp_dir())
    }

    #[tokio::test]
    async fn registration_is_idempotent_first_wins() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(StubTool { name: "alpha" }), ToolCategory::Other, false)
            .await;
        registry
            .register(Arc::new(StubTool { name: "alpha" }), ToolCategory::Execution, true)
            .await;

        assert_eq!(registry.len().await, 1);
        let entry = registry.get("alpha").await.unwrap();
        // The first registration's metadata survives.
        assert_eq!(entry.category, ToolCategory::Other);
        assert!(!entry.requires_code_execution);
    }

    #[tokio::test]
    async fn lookup_and_category_filters() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(StubTool { name: "fs" }), ToolCategory::Filesystem, false)
            .await;
        registry
            .register(Arc::new(StubTool { name: "sh" }), ToolCategory::Execution, true)
            .await;

        assert!(registry.has("fs").await);
        assert!(!registry.has("nope").await);
        assert_eq!(registry.get_all().await.len(), 2);

        let execution = registry.get_by_category(ToolCategory::Execution).await;
        assert_eq!(execution.len(), 1);
        assert_eq!(execution[0].tool.name(), "sh");
    }

    #[tokio::test]
    async fn export_gates_code_execution_centrally() {
        let registry = ToolRegistry::new();
        registry
            .register(Arc::new(StubTool { name: "safe" }), ToolCategory::Filesystem, false)
            .await;
        registry
            .register(Arc::new(StubTool { name: "shell" }), ToolCategory::Execution, true)
            .await;

        let set = registry.export_callable(test_ctx(), None, false).await;
        assert_eq!(set.names(), vec!["safe"]);

        let set = registry.export_callable(test_ctx(), None, true).await;
        assert_eq!(set.names(), vec!["safe", "shell"]);
    }

    #[tokio::test]
    async fn export_respects_allow_list_order() {
        let registry = ToolRegistry::new();
        for name in ["a", "b", "c"] {
            registry
                .register(Arc::new(StubTool { name }), ToolCategory::Other, false)
                .await;
        }

        let allow = vec!["c".to_string(), "a".to_string(), "missing".to_string()];
        let set = registry.export_callable(test_ctx(), Some(&allow), true).await;
        assert_eq!(set.names(), vec!["c", "a"]);
    }

    #[tokio::test]
    async fn invoke_unknown_tool_is_structured_failure() {
        let registry = ToolRegistry::new();
        let set = registry.export_callable(test_ctx(), None, true).await;

        let result = set.invoke("nope", json!({})).await;
        assert!(!result.success);
        assert_eq!(result.code(), Some(codes::UNKNOWN_TOOL));
    }

    #[test]
    fn parse_params_reports_invalid_parameters() {
        #[derive(serde::Deserialize, Debug)]
        struct Params {
            #[serde(rename = "name")]
            _name: String,
        }

        let err = parse_params::<Params>(json!({"name": 7})).unwrap_err();
        assert!(!err.success);
        assert_eq!(err.code(), Some(codes::INVALID_PARAMETERS));
    }

    #[test]
    fn tool_result_value_shape_is_stable() {
        let result = ToolResult::fail_with(
            codes::AMBIGUOUS,
            "Multiple matches found",
            "3 matches",
            json!({"matches": 3}),
        );

        let value = result.to_value();
        assert_eq!(value["title"], "Multiple matches found");
        assert_eq!(value["success"], false);
        assert_eq!(value["metadata"]["code"], "ambiguous");
        assert_eq!(value["metadata"]["matches"], 3);
    }
}
