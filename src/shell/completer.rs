//! Filesystem path completion
//!
//! Completes the word under the cursor against the entries of the directory it
//! names. A unique match replaces the last path segment, several matches first
//! extend it to their common prefix, and only when no progress is possible is a
//! listing produced.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use glob::{MatchOptions, Pattern};

use super::buffer::LineBuffer;
use super::input::Key;
use super::path;

/// Chars that cannot end a file name; a segment ending with one is still being typed.
const UNSAFE_PATH_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// The word ending at the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputToken {
    pub token: String,
    /// Char index of the first char of `token` in the buffer.
    pub start: usize,
}

impl InputToken {
    /// Scan back from the cursor to the previous space (or line start).
    pub fn at_cursor(buffer: &LineBuffer) -> Option<InputToken> {
        if buffer.cursor() == 0 {
            return None;
        }
        let before = buffer.before_cursor();
        let token = match before.rfind(' ') {
            Some(i) => &before[i + 1..],
            None => before,
        };
        let len = token.chars().count();
        Some(InputToken {
            token: token.to_string(),
            start: buffer.cursor() - len,
        })
    }

    pub fn is_valid(&self) -> bool {
        !self.token.is_empty()
    }

    /// Length in chars.
    pub fn char_len(&self) -> usize {
        self.token.chars().count()
    }
}

/// Outcome of a completion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Nothing to do.
    Unchanged,
    /// The last path segment was replaced in the buffer.
    Replaced(String),
    /// Several candidates and no common progress; text to show above the prompt.
    Listing(String),
}

/// Detects two presses of the same key within a time window.
#[derive(Debug, Clone)]
pub struct DoublePress {
    window: Duration,
    last: Option<(Key, Instant)>,
}

impl DoublePress {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Record a key press; true when it repeats the previous key within the window.
    pub fn register(&mut self, key: Key, now: Instant) -> bool {
        let repeated = match self.last {
            Some((last_key, at)) => {
                last_key == key && now.saturating_duration_since(at) < self.window
            }
            None => false,
        };
        self.last = Some((key, now));
        repeated
    }
}

pub struct PathCompleter {
    max_suggestions: usize,
}

impl PathCompleter {
    pub fn new(max_suggestions: usize) -> Self {
        Self { max_suggestions }
    }

    /// Complete the word under the cursor against the filesystem, relative to `cwd`.
    pub fn complete(&self, buffer: &mut LineBuffer, cwd: &Path) -> Completion {
        let Some(token) = InputToken::at_cursor(buffer).filter(InputToken::is_valid) else {
            return Completion::Unchanged;
        };

        let (head, fragment) = path::split_last_segment(&token.token);
        if fragment.ends_with(UNSAFE_PATH_CHARS) {
            return Completion::Unchanged;
        }

        let dir = if head.is_empty() {
            cwd.to_path_buf()
        } else {
            path::resolve(cwd, head)
        };

        let suggestions = matching_entries(&dir, fragment);
        tracing::trace!(
            dir = %dir.display(),
            fragment,
            count = suggestions.len(),
            "path completion"
        );

        let replacement = match suggestions.as_slice() {
            [] => return Completion::Unchanged,
            [only] => only.clone(),
            _ => {
                let common = common_prefix(&suggestions);
                if common.is_empty() || common == fragment {
                    return Completion::Listing(self.listing(&suggestions));
                }
                common
            }
        };

        replace_fragment(buffer, &token, fragment, &replacement);
        Completion::Replaced(replacement)
    }

    fn listing(&self, suggestions: &[String]) -> String {
        if suggestions.len() > self.max_suggestions {
            format!(
                "{}\n({} more...)",
                suggestions[..self.max_suggestions].join("  "),
                suggestions.len() - self.max_suggestions
            )
        } else {
            suggestions.join("  ")
        }
    }
}

/// Replace the trailing `fragment` of `token` with `value`.
///
/// The fragment is always the suffix of the token, so its position is computed from
/// lengths rather than searched for.
fn replace_fragment(buffer: &mut LineBuffer, token: &InputToken, fragment: &str, value: &str) {
    let end = token.start + token.char_len();
    let start = end - fragment.chars().count();
    buffer.replace_range(start, end, value);
}

/// Names of the entries in `dir` starting with `prefix`, case-insensitively, sorted.
pub fn matching_entries(dir: &Path, prefix: &str) -> Vec<String> {
    let pattern: PathBuf = Path::new(&Pattern::escape(&dir.to_string_lossy()))
        .join(format!("{}*", Pattern::escape(prefix)));
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let Ok(paths) = glob::glob_with(&pattern.to_string_lossy(), options) else {
        return Vec::new();
    };

    let mut names: Vec<String> = paths
        .filter_map(|p| p.ok())
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Longest prefix shared by every suggestion, compared char by char.
pub fn common_prefix(suggestions: &[String]) -> String {
    let Some(first) = suggestions.first() else {
        return String::new();
    };
    let mut prefix_len = first.chars().count();
    for other in &suggestions[1..] {
        let common = first
            .chars()
            .zip(other.chars())
            .take_while(|(a, b)| a == b)
            .count();
        prefix_len = prefix_len.min(common);
    }
    first.chars().take(prefix_len).collect()
}
