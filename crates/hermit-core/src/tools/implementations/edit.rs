//! Edit tool - Literal string replacement with a uniqueness invariant
//!
//! Matching is literal substring, never regex, for both the occurrence count
//! and the replacement. A non-unique match without `replace_all` is rejected:
//! a model-authored edit with too little context must not silently corrupt
//! the file.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use similar::TextDiff;
use tokio::fs;

use crate::tools::registry::{codes, parse_params, ExecutionContext, Tool, ToolResult};

pub struct EditTool;

#[derive(Deserialize)]
struct Params {
    path: String,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "edit"
    }

    fn description(&self) -> &str {
        "Replace a string in a file. old_string must match exactly once unless replace_all is set."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or project-relative path to the file"
                },
                "old_string": {
                    "type": "string",
                    "description": "The exact text to replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "The replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace every occurrence (default: false)",
                    "default": false
                }
            },
            "required": ["path", "old_string", "new_string"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ExecutionContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if params.old_string == params.new_string {
            return ToolResult::fail(
                codes::INVALID_PARAMETERS,
                "No change requested",
                "old_string and new_string are identical",
            );
        }

        let path = match ctx.resolve_existing(&params.path) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if path.is_dir() {
            return ToolResult::fail(
                codes::IS_DIRECTORY,
                "Path is a directory",
                format!("'{}' is a directory, not a file", params.path),
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

        let count = content.matches(&params.old_string).count();

        if count == 0 {
            return ToolResult::fail(
                codes::NOT_FOUND,
                "String not found",
                format!("old_string not found in {}", params.path),
            );
        }

        if count > 1 && !params.replace_all {
            return ToolResult::fail_with(
                codes::AMBIGUOUS,
                "Multiple matches found",
                format!(
                    "old_string occurs {} times in {}. Provide more surrounding context to make \
                     it unique, or set replace_all=true to replace every occurrence.",
                    count, params.path
                ),
                json!({ "matches": count }),
            );
        }

        let (new_content, replaced) = if params.replace_all {
            (content.replace(&params.old_string, &params.new_string), count)
        } else {
            (content.replacen(&params.old_string, &params.new_string, 1), 1)
        };

        let old_lines = content.lines().count() as i64;
        let new_lines = new_content.lines().count() as i64;
        let diff = compact_diff(&content, &new_content, &path);

        match fs::write(&path, &new_content).await {
            Ok(()) => ToolResult::ok_with(
                format!("Edited {}", params.path),
                format!(
                    "Replaced {} occurrence(s) ({:+} lines)\n{}",
                    replaced,
                    new_lines - old_lines,
                    diff
                ),
                json!({
                    "replacements": replaced,
                    "old_lines": old_lines,
                    "new_lines": new_lines,
                }),
            ),
            Err(e) => ToolResult::fail(
                codes::ACCESS_DENIED,
                "Cannot write file",
                format!("Failed to write '{}': {}", params.path, e),
            ),
        }
    }
}

fn compact_diff(old: &str, new: &str, path: &std::path::Path) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = String::new();
    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        output.push_str(&format!("{}", hunk));
    }
    if output.is_empty() {
        return String::new();
    }
    format!("--- {}\n+++ {}\n{}", path.display(), path.display(), output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_in(dir: &std::path::Path) -> ExecutionContext {
        ExecutionContext::new(dir.canonicalize().unwrap())
    }

    async fn edit(ctx: &ExecutionContext, args: Value) -> ToolResult {
        EditTool.execute(args, ctx).await
    }

    #[tokio::test]
    async fn unique_match_replaces_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, "alpha beta gamma\n").unwrap();
        let ctx = ctx_in(dir.path());

        let result = edit(
            &ctx,
            json!({"path": "f.txt", "old_string": "beta", "new_string": "delta"}),
        )
        .await;

        assert!(result.success);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "alpha delta gamma\n");
        assert_eq!(result.metadata.as_ref().unwrap()["replacements"], 1);
    }

    #[tokio::test]
    async fn ambiguous_match_leaves_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, "foo\nfoo\n").unwrap();
        let ctx = ctx_in(dir.path());

        let result = edit(
            &ctx,
            json!({"path": "f.txt", "old_string": "foo", "new_string": "bar"}),
        )
        .await;

        assert!(!result.success);
        assert_eq!(result.title, "Multiple matches found");
        assert_eq!(result.code(), Some(codes::AMBIGUOUS));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "foo\nfoo\n");
    }

    #[tokio::test]
    async fn zero_matches_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "content\n").unwrap();
        let ctx = ctx_in(dir.path());

        let result = edit(
            &ctx,
            json!({"path": "f.txt", "old_string": "absent", "new_string": "x"}),
        )
        .await;

        assert!(!result.success);
        assert_eq!(result.code(), Some(codes::NOT_FOUND));
    }

    #[tokio::test]
    async fn replace_all_is_exhaustive() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, "foo foo foo\n").unwrap();
        let ctx = ctx_in(dir.path());

        let args = json!({"path": "f.txt", "old_string": "foo", "new_string": "bar", "replace_all": true});
        let first = edit(&ctx, args.clone()).await;
        assert!(first.success);
        assert_eq!(first.metadata.as_ref().unwrap()["replacements"], 3);

        // A second identical run finds nothing: the first pass was exhaustive.
        let second = edit(&ctx, args).await;
        assert!(!second.success);
        assert_eq!(second.code(), Some(codes::NOT_FOUND));
    }

    #[tokio::test]
    async fn identical_strings_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "x\n").unwrap();
        let ctx = ctx_in(dir.path());

        let result = edit(
            &ctx,
            json!({"path": "f.txt", "old_string": "same", "new_string": "same"}),
        )
        .await;

        assert!(!result.success);
        assert_eq!(result.code(), Some(codes::INVALID_PARAMETERS));
    }

    #[tokio::test]
    async fn counting_is_literal_not_regex() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, "a.c\nabc\n").unwrap();
        let ctx = ctx_in(dir.path());

        // "a.c" as a regex would also match "abc"; literally it matches once.
        let result = edit(
            &ctx,
            json!({"path": "f.txt", "old_string": "a.c", "new_string": "x.y"}),
        )
        .await;

        assert!(result.success);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "x.y\nabc\n");
    }
}
