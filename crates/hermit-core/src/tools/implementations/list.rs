//! List tool - Breadth-first directory listing with depth/limit

use std::collections::VecDeque;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;

use crate::tools::registry::{codes, parse_params, ExecutionContext, Tool, ToolResult};

const DEFAULT_DEPTH: usize = 2;
const DEFAULT_LIMIT: usize = 200;
const MAX_LIMIT: usize = 1000;

pub struct ListTool;

#[derive(Deserialize)]
struct Params {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    depth: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

#[async_trait]
impl Tool for ListTool {
    fn name(&self) -> &str {
        "list"
    }

    fn description(&self) -> &str {
        "List directory contents recursively. Directories first, dotfiles skipped; depth controls recursion."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: project root)"
                },
                "depth": {
                    "type": "number",
                    "description": "Maximum recursion depth (default: 2)"
                },
                "limit": {
                    "type": "number",
                    "description": "Maximum number of entries (default: 200, max 1000)"
                }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let max_depth = params.depth.unwrap_or(DEFAULT_DEPTH);
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

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
                "Not a directory",
                format!("'{}' is not a directory", root.display()),
            );
        }

        let mut entries: Vec<(String, bool)> = Vec::new();
        let mut queue: VecDeque<(std::path::PathBuf, usize)> = VecDeque::new();
        queue.push_back((root.clone(), 0));

        while let Some((dir, depth)) = queue.pop_front() {
            if entries.len() >= limit {
                break;
            }

            let mut dir_entries = match fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(_) => continue,
            };

            let mut children: Vec<(String, std::path::PathBuf, bool)> = Vec::new();
            while let Ok(Some(entry)) = dir_entries.next_entry().await {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') {
                    continue;
                }
                let is_dir = entry
                    .file_type()
                    .await
                    .map(|ft| ft.is_dir())
                    .unwrap_or(false);
                children.push((name, entry.path(), is_dir));
            }

            // Directories first, then case-insensitive by name.
            children.sort_by(|a, b| {
                b.2.cmp(&a.2)
                    .then_with(|| a.0.to_lowercase().cmp(&b.0.to_lowercase()))
            });

            for (_, entry_path, is_dir) in children {
                if entries.len() >= limit {
                    break;
                }

                let relative = entry_path
                    .strip_prefix(&root)
                    .unwrap_or(&entry_path)
                    .to_string_lossy()
                    .to_string();
                let display = if is_dir {
                    format!("{}/", relative)
                } else {
                    relative
                };
                entries.push((display, is_dir));

                if is_dir && depth < max_depth {
                    queue.push_back((entry_path, depth + 1));
                }
            }
        }

        let total = entries.len();
        let dirs = entries.iter().filter(|(_, d)| *d).count();
        let listing: Vec<String> = entries.into_iter().map(|(display, _)| display).collect();

        ToolResult::ok_with(
            format!("{} entries", total),
            listing.join("\n"),
            json!({
                "entries": total,
                "directories": dirs,
                "files": total - dirs,
                "truncated": total >= limit,
            }),
        )
    }
}
