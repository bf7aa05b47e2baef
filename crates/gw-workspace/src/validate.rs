// validate.rs — Name and path checks applied before any mutation.

use std::path::{Component, Path};

use crate::error::{Result, WorkspaceError};

/// Check an owner or workspace name. Both become single directory levels
/// under the storage root.
pub fn segment(what: &'static str, value: &str) -> Result<()> {
    let reason = if value.is_empty() {
        Some("must not be empty")
    } else if value == "." || value == ".." {
        Some("must not be a relative directory reference")
    } else if value.starts_with('.') {
        Some("must not start with '.'")
    } else if value.contains(['/', '\\', '\0']) {
        Some("must be a single path segment")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(WorkspaceError::InvalidName {
            what,
            value: value.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Check a remote name against what git accepts as a remote and what can
/// safely be passed on a command line.
pub fn remote_name(name: &str) -> Result<()> {
    let invalid = |reason| {
        Err(WorkspaceError::InvalidName {
            what: "remote name",
            value: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return invalid("must not be empty");
    }
    if name.starts_with('-') {
        return invalid("must not start with '-'");
    }
    if name.contains("..") {
        return invalid("must not contain '..'");
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || "/:\\~^?*[".contains(c))
    {
        return invalid("contains a forbidden character");
    }
    Ok(())
}

/// Normalize a workspace-relative path.
///
/// Returns the path with `.` components and redundant separators removed.
/// Absolute paths, `..` components and anything inside `.git` are rejected.
pub fn relative_path(path: &str) -> Result<String> {
    let invalid = |reason| WorkspaceError::InvalidPath {
        path: path.to_string(),
        reason,
    };

    if path.contains('\0') {
        return Err(invalid("contains NUL"));
    }

    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().ok_or_else(|| invalid("not valid UTF-8"))?;
                if part == ".git" {
                    return Err(invalid("version-control metadata is not accessible"));
                }
                parts.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("must not contain '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("must be relative to the workspace"))
            }
        }
    }

    if parts.is_empty() {
        return Err(invalid("must name something inside the workspace"));
    }
    Ok(parts.join("/"))
}
