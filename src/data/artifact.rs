use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Leaf name that route-group page templates collapse to.
pub const PAGE_LEAF: &str = "page.tsx";
const PAGE_SUFFIX: &str = "-page.tsx";

/// One generated or repaired file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeArtifact {
    pub relative_path: String,
    pub source_text: String,
}

impl CodeArtifact {
    /// Builds an artifact from a raw path echoed by the completion service.
    ///
    /// The path is sanitized and `template_prefix` (e.g. `templates/`) is
    /// removed from its start. Returns `None` when nothing usable remains.
    pub fn from_raw(raw_path: &str, source_text: String, template_prefix: &str) -> Option<Self> {
        let relative_path = sanitize_relative_path(raw_path, template_prefix);
        if relative_path.is_empty() {
            return None;
        }
        Some(Self {
            relative_path,
            source_text,
        })
    }

    /// Final on-disk location under `folder`, with page canonicalization applied.
    pub fn resolve(&self, folder: &Path) -> PathBuf {
        canonicalize_page_path(&folder.join(&self.relative_path))
    }
}

/// Keeps only `[A-Za-z0-9.-]`, which also removes every path separator.
pub fn sanitize_filename(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '-')
        .collect()
}

/// Sanitizes a relative path while keeping its directory structure.
///
/// Allowed characters are alphanumerics, `.`, `-`, `_`, `(`, `)` and `/`
/// (backslashes are read as separators). Empty, `.` and `..` segments are
/// dropped so the result can never climb out of the folder it is joined to.
pub fn sanitize_relative_path(raw: &str, template_prefix: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| if c == '\\' { '/' } else { c })
        .filter(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '(' | ')' | '/')
        })
        .collect();

    let segments: Vec<&str> = cleaned
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .collect();
    let joined = segments.join("/");

    let prefix = template_prefix.trim_matches('/');
    if !prefix.is_empty() {
        if let Some(rest) = joined.strip_prefix(prefix) {
            if let Some(rest) = rest.strip_prefix('/') {
                return rest.to_string();
            }
        }
    }
    joined
}

/// `dir/user-page.tsx` becomes `dir/page.tsx`; other paths are untouched.
pub fn canonicalize_page_path(path: &Path) -> PathBuf {
    let is_page = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(PAGE_SUFFIX))
        .unwrap_or(false);

    if !is_page {
        return path.to_path_buf();
    }
    match path.parent() {
        Some(parent) => parent.join(PAGE_LEAF),
        None => PathBuf::from(PAGE_LEAF),
    }
}
