//! Shared path containment for filesystem and search tools
//!
//! Every resolved path must stay a descendant of the project root. Requests
//! that escape are rejected before any I/O happens.

use std::path::{Component, Path, PathBuf};

use crate::tools::registry::{codes, ToolResult};

fn denied(path: &str) -> ToolResult {
    ToolResult::fail(
        codes::ACCESS_DENIED,
        "Access denied",
        format!("Path '{}' is outside the project root", path),
    )
}

fn join_root(path: &str, root: &Path) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

/// Resolve a path that must already exist.
///
/// Canonicalizes (resolving symlinks and `..`) and checks containment.
/// A path that does not exist fails NotFound; one that escapes the root
/// fails AccessDenied.
pub fn resolve_existing(path: &str, root: &Path) -> Result<PathBuf, ToolResult> {
    let resolved = join_root(path, root);

    let canonical = match resolved.canonicalize() {
        Ok(p) => p,
        Err(_) => {
            // Distinguish escape-before-existence from a plain missing file.
            let has_traversal = resolved
                .components()
                .any(|c| matches!(c, Component::ParentDir));
            if has_traversal || !resolved.starts_with(root) {
                return Err(denied(path));
            }
            return Err(ToolResult::fail(
                codes::NOT_FOUND,
                "File not found",
                format!("No such path: {}", path),
            ));
        }
    };

    if !canonical.starts_with(root) {
        return Err(denied(path));
    }

    Ok(canonical)
}

/// Resolve a path that may not exist yet (write targets).
///
/// `..` components are rejected outright; the nearest existing ancestor is
/// canonicalized and checked for containment, then the remaining components
/// are appended back.
pub fn resolve_for_write(path: &str, root: &Path) -> Result<PathBuf, ToolResult> {
    let resolved = join_root(path, root);

    if resolved
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(denied(path));
    }

    if resolved.exists() {
        let canonical = resolved.canonicalize().map_err(|e| {
            ToolResult::fail(
                codes::ACCESS_DENIED,
                "Access denied",
                format!("Cannot resolve path '{}': {}", path, e),
            )
        })?;
        if !canonical.starts_with(root) {
            return Err(denied(path));
        }
        return Ok(canonical);
    }

    // Walk up to the nearest existing ancestor.
    let mut base = resolved.clone();
    let mut suffix: Vec<std::ffi::OsString> = Vec::new();
    while !base.exists() {
        match base.file_name() {
            Some(name) => suffix.push(name.to_owned()),
            None => break,
        }
        if !base.pop() {
            break;
        }
    }

    let canonical_base = if base.as_os_str().is_empty() || !base.exists() {
        root.to_path_buf()
    } else {
        base.canonicalize().map_err(|e| {
            ToolResult::fail(
                codes::ACCESS_DENIED,
                "Access denied",
                format!("Cannot resolve path '{}': {}", path, e),
            )
        })?
    };

    if !canonical_base.starts_with(root) {
        return Err(denied(path));
    }

    let mut final_path = canonical_base;
    for component in suffix.into_iter().rev() {
        final_path.push(component);
    }

    Ok(final_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        (dir, canonical)
    }

    #[test]
    fn relative_paths_resolve_against_root() {
        let (_guard, root) = root();
        std::fs::write(root.join("a.txt"), "x").unwrap();

        let resolved = resolve_existing("a.txt", &root).unwrap();
        assert_eq!(resolved, root.join("a.txt"));
    }

    #[test]
    fn escape_via_dotdot_is_denied() {
        let (_guard, root) = root();

        let err = resolve_existing("../etc/passwd", &root).unwrap_err();
        assert_eq!(err.code(), Some(codes::ACCESS_DENIED));

        let err = resolve_for_write("sub/../../other.txt", &root).unwrap_err();
        assert_eq!(err.code(), Some(codes::ACCESS_DENIED));
    }

    #[test]
    fn absolute_path_outside_root_is_denied() {
        let (_guard, root) = root();

        let err = resolve_existing("/etc/hosts", &root).unwrap_err();
        assert_eq!(err.code(), Some(codes::ACCESS_DENIED));
    }

    #[test]
    fn missing_path_inside_root_is_not_found() {
        let (_guard, root) = root();

        let err = resolve_existing("missing.txt", &root).unwrap_err();
        assert_eq!(err.code(), Some(codes::NOT_FOUND));
    }

    #[test]
    fn write_target_with_missing_parents_resolves() {
        let (_guard, root) = root();

        let resolved = resolve_for_write("deep/nested/file.txt", &root).unwrap();
        assert!(resolved.starts_with(&root));
        assert!(resolved.ends_with("deep/nested/file.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_denied() {
        let (_guard, root) = root();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret"), "x").unwrap();
        std::os::unix::fs::symlink(outside.path(), root.join("link")).unwrap();

        let err = resolve_existing("link/secret", &root).unwrap_err();
        assert_eq!(err.code(), Some(codes::ACCESS_DENIED));
    }
}
