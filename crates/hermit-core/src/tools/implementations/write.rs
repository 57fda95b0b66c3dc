//! Write tool - Create or overwrite files

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;

use crate::tools::registry::{codes, parse_params, ExecutionContext, Tool, ToolResult};

pub struct WriteTool;

#[derive(Deserialize)]
struct Params {
    path: String,
    content: String,
}

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "write"
    }

    fn description(&self) -> &str {
        "Create or overwrite a file. Creates parent directories if needed."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or project-relative path to the file"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                }
            },
            "required": ["path", "content"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let path = match ctx.resolve_for_write(&params.path) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if path.is_dir() {
            return ToolResult::fail(
                codes::IS_DIRECTORY,
                "Path is a directory",
                format!("'{}' is a directory and cannot be overwritten", params.path),
            );
        }

        let existed = path.exists();

        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            if let Err(e) = fs::create_dir_all(parent).await {
                return ToolResult::fail(
                    codes::ACCESS_DENIED,
                    "Cannot create directory",
                    format!("Failed to create '{}': {}", parent.display(), e),
                );
            }
        }

        match fs::write(&path, &params.content).await {
            Ok(()) => {
                let lines = params.content.lines().count();
                let verb = if existed { "Overwrote" } else { "Created" };
                ToolResult::ok_with(
                    format!("{} {}", verb, params.path),
                    format!(
                        "{} {} ({} lines, {} bytes)",
                        verb,
                        path.display(),
                        lines,
                        params.content.len()
                    ),
                    json!({
                        "created": !existed,
                        "lines": lines,
                        "bytes": params.content.len(),
                    }),
                )
            }
            Err(e) => ToolResult::fail(
                codes::ACCESS_DENIED,
                "Cannot write file",
                format!("Failed to write '{}': {}", params.path, e),
            ),
        }
    }
}
