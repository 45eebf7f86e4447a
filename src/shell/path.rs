//! Path resolution against the session's working directory
//!
//! Accepts:
//! - relative paths: `src/lib.rs`, `../other`
//! - absolute paths: `/usr/lib`, `C:\Users\me`
//! - home directory: `~`, `~/Documents`
//! - either separator: `src\shell/mod.rs`

use std::path::{Component, Path, PathBuf};

/// Both separators are accepted on every platform.
pub fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Split a path-like token into `(head, last_segment)` at the last separator.
///
/// The head keeps its trailing separator: `src/ma` gives `("src/", "ma")`, `src/` gives
/// `("src/", "")` and `ma` gives `("", "ma")`.
pub fn split_last_segment(token: &str) -> (&str, &str) {
    match token.rfind(is_separator) {
        Some(i) => token.split_at(i + 1),
        None => ("", token),
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    }
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        return home.join(normalize_separators(rest));
    }
    PathBuf::from(normalize_separators(path))
}

/// Rewrite separators to the platform's own.
fn normalize_separators(path: &str) -> String {
    if cfg!(windows) {
        path.replace('/', "\\")
    } else {
        path.replace('\\', "/")
    }
}

/// Join `path` onto `base`, folding `.` and `..`.
///
/// Absolute paths (and home-relative ones) are returned as they are.
pub fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = path.trim();
    if path.is_empty() {
        return base.to_path_buf();
    }

    let expanded = expand_home(path);
    if expanded.is_absolute() || expanded.has_root() {
        return expanded;
    }

    let mut result = base.to_path_buf();
    for component in expanded.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            Component::Normal(name) => result.push(name),
            _ => {}
        }
    }
    result
}
