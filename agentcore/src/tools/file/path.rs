//! Path safety: every file tool resolves its `path` argument through here.

use std::path::{Path, PathBuf};

use crate::tool_source::ToolSourceError;

/// Resolves `path_param` against `working_folder`, rejecting escapes.
///
/// Absolute paths are accepted only if they stay under `working_folder` once both
/// are lexically normalized (no `..` segments survive a join); relative paths are
/// joined directly. This mirrors the read/write/ls/glob/multiedit/apply_patch tools'
/// shared contract: a tool never touches a path outside the working folder, even via
/// `..` or a symlink-looking absolute path that happens to start with the right prefix.
pub fn resolve_path_under(working_folder: &PathBuf, path_param: &str) -> Result<PathBuf, ToolSourceError> {
    let candidate = if Path::new(path_param).is_absolute() {
        PathBuf::from(path_param)
    } else {
        working_folder.join(path_param)
    };

    let normalized = normalize(&candidate);
    let root = normalize(working_folder);

    if !normalized.starts_with(&root) {
        return Err(ToolSourceError::InvalidInput(format!(
            "path '{}' escapes working folder '{}'",
            path_param,
            working_folder.display()
        )));
    }

    Ok(normalized)
}

/// Lexical `..`/`.` resolution without touching the filesystem (the path may not
/// exist yet, e.g. a file a `write_file` call is about to create).
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}
