//! Read tool - Read file contents with line numbers

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;

use crate::tools::registry::{codes, parse_params, ExecutionContext, Tool, ToolResult};
use crate::tools::truncation::clip_line;

const MAX_LINES: usize = 2000;
const MAX_LINE_CHARS: usize = 2000;

pub struct ReadTool;

#[derive(Deserialize)]
struct Params {
    path: String,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "read"
    }

    fn description(&self) -> &str {
        "Read file contents. Returns numbered lines; supports offset/limit for large files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or project-relative path to the file"
                },
                "offset": {
                    "type": "number",
                    "description": "Line offset to start reading from (0-based)"
                },
                "limit": {
                    "type": "number",
                    "description": "Maximum number of lines to return (max 2000)"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let path = match ctx.resolve_existing(&params.path) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if path.is_dir() {
            return ToolResult::fail(
                codes::IS_DIRECTORY,
                "Path is a directory",
                format!(
                    "'{}' is a directory, not a file. Use the list tool to see its contents.",
                    params.path
                ),
            );
        }

        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => {
                return ToolResult::fail(
                    codes::ACCESS_DENIED,
                    "Cannot read file",
                    format!("Failed to read '{}': {}", params.path, e),
                )
            }
        };

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();

        let offset = params.offset.unwrap_or(0);
        let limit = params.limit.unwrap_or(MAX_LINES).min(MAX_LINES);
        let end = offset.saturating_add(limit).min(total_lines);

        if offset >= total_lines && total_lines > 0 {
            return ToolResult::fail(
                codes::INVALID_PARAMETERS,
                "Offset beyond end of file",
                format!("Offset {} is beyond the file's {} lines", offset, total_lines),
            );
        }

        let mut numbered = String::new();
        for (idx, line) in lines[offset..end].iter().enumerate() {
            let line_no = offset + idx + 1;
            numbered.push_str(&format!("{:>6}  {}\n", line_no, clip_line(line, MAX_LINE_CHARS)));
        }

        ToolResult::ok_with(
            format!("Read {}", params.path),
            numbered,
            json!({
                "total_lines": total_lines,
                "lines_returned": end - offset,
                "offset": offset,
            }),
        )
    }
}
