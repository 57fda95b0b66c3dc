//! Glob tool - Find files by pattern, newest first

use std::time::SystemTime;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use walkdir::WalkDir;

use crate::tools::registry::{codes, parse_params, ExecutionContext, Tool, ToolResult};

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

pub struct GlobTool;

#[derive(Deserialize)]
struct Params {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern (e.g. **/*.rs), sorted by modification time, newest first."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern to match against project-relative paths"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in (default: project root)"
                },
                "limit": {
                    "type": "number",
                    "description": "Maximum number of results (max 1000)"
                }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let pattern = match glob::Pattern::new(&params.pattern) {
            Ok(p) => p,
            Err(e) => {
                return ToolResult::fail(
                    codes::INVALID_PATTERN,
                    "Invalid glob pattern",
                    format!("'{}': {}", params.pattern, e),
                )
            }
        };

        let root = match &params.path {
            Some(p) => match ctx.resolve_existing(p) {
                Ok(r) => r,
                Err(e) => return e,
            },
            None => ctx.project_path.clone(),
        };

        if !root.is_dir() {
            return ToolResult::fail(
                codes::INVALID_PARAMETERS,
                "Search root is not a directory",
                format!("'{}' is not a directory", root.display()),
            );
        }

        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

        let mut matches: Vec<(std::path::PathBuf, SystemTime)> = Vec::new();
        let walker = WalkDir::new(&root).into_iter().filter_entry(|e| {
            // Skip dotfiles and dot-directories, but not the root itself.
            e.depth() == 0
                || !e
                    .file_name()
                    .to_str()
                    .map(|name| name.starts_with('.'))
                    .unwrap_or(false)
        });

        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = match entry.path().strip_prefix(&root) {
                Ok(r) => r,
                Err(_) => continue,
            };
            if !pattern.matches_path(relative) {
                continue;
            }
            let mtime = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            matches.push((entry.path().to_path_buf(), mtime));
        }

        let total = matches.len();
        matches.sort_by(|a, b| b.1.cmp(&a.1));
        matches.truncate(limit);

        let listing: Vec<String> = matches
            .iter()
            .map(|(p, _)| {
                p.strip_prefix(&root)
                    .unwrap_or(p)
                    .to_string_lossy()
                    .to_string()
            })
            .collect();

        let mut output = listing.join("\n");
        if total > limit {
            output.push_str(&format!(
                "\n[Showing {} of {} matches]",
                limit, total
            ));
        }

        ToolResult::ok_with(
            format!("{} file(s) matching {}", listing.len(), params.pattern),
            output,
            json!({
                "matches": listing.len(),
                "total": total,
                "truncated": total > limit,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_in(dir: &std::path::Path) -> ExecutionContext {
        ExecutionContext::new(dir.canonicalize().unwrap())
    }

    #[tokio::test]
    async fn matches_by_pattern_excluding_dotfiles() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/c.rs"), "").unwrap();
        let ctx = ctx_in(dir.path());

        let result = GlobTool.execute(json!({"pattern": "**/*.rs"}), &ctx).await;

        assert!(result.success);
        assert!(result.output.contains("a.rs"));
        assert!(!result.output.contains("b.txt"));
        assert!(!result.output.contains("c.rs"));
    }

    #[tokio::test]
    async fn limit_is_reported_when_truncated() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            std::fs::write(dir.path().join(format!("f{}.rs", i)), "").unwrap();
        }
        let ctx = ctx_in(dir.path());

        let result = GlobTool
            .execute(json!({"pattern": "*.rs", "limit": 2}), &ctx)
            .await;

        assert!(result.success);
        assert_eq!(result.metadata.as_ref().unwrap()["total"], 5);
        assert_eq!(result.metadata.as_ref().unwrap()["truncated"], true);
        assert!(result.output.contains("Showing 2 of 5"));
    }

    #[tokio::test]
    async fn invalid_pattern_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());

        let result = GlobTool.execute(json!({"pattern": "[unclosed"}), &ctx).await;
        assert!(!result.success);
        assert_eq!(result.code(), Some(codes::INVALID_PATTERN));
    }

    #[tokio::test]
    async fn search_root_outside_project_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx_in(dir.path());

        let result = GlobTool
            .execute(json!({"pattern": "*", "path": "/etc"}), &ctx)
            .await;
        assert!(!result.success);
        assert_eq!(result.code(), Some(codes::ACCESS_DENIED));
    }
}
