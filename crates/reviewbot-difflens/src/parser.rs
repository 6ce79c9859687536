use std::fmt;
use std::path::{Path, PathBuf};

use reviewbot_core::ReviewError;

/// The section of a unified diff that belongs to a single file.
///
/// `text` is the raw section, headers included, exactly as it appeared in
/// the input. That is what gets sent for review.
///
/// # Examples
///
/// ```
/// use reviewbot_difflens::parser::split_unified_diff;
///
/// let diff = "diff --git a/hello.rs b/hello.rs\n\
///             --- a/hello.rs\n\
///             +++ b/hello.rs\n\
///             @@ -1,2 +1,3 @@\n\
///              fn main() {\n\
///             +    println!(\"hello\");\n\
///              }\n";
/// let files = split_unified_diff(diff).unwrap();
/// assert_eq!(files.len(), 1);
/// assert_eq!(files[0].hunk_count, 1);
/// assert!(files[0].text.starts_with("diff --git"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Path in the old version.
    pub old_path: PathBuf,
    /// Path in the new version.
    pub new_path: PathBuf,
    /// Raw diff text for this file.
    pub text: String,
    /// Number of `@@` hunks in the section.
    pub hunk_count: usize,
    /// Whether this is a newly created file.
    pub is_new_file: bool,
    /// Whether this file was deleted.
    pub is_deleted_file: bool,
    /// Whether this file was renamed.
    pub is_rename: bool,
}

impl FileDiff {
    fn empty() -> Self {
        Self {
            old_path: PathBuf::new(),
            new_path: PathBuf::new(),
            text: String::new(),
            hunk_count: 0,
            is_new_file: false,
            is_deleted_file: false,
            is_rename: false,
        }
    }

    /// The path a reviewer would call this file by.
    ///
    /// Deleted files are named by their old path.
    pub fn display_path(&self) -> &Path {
        let dev_null = Path::new("/dev/null");
        if self.is_deleted_file || self.new_path.as_os_str().is_empty() || self.new_path == dev_null
        {
            &self.old_path
        } else {
            &self.new_path
        }
    }

    /// Whether the section carries any line changes.
    pub fn has_changes(&self) -> bool {
        self.hunk_count > 0
    }
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} hunks)",
            self.display_path().display(),
            self.hunk_count
        )
    }
}

/// Split a unified diff (as produced by `git diff`) into per-file sections.
///
/// Sections start at a `diff --git` line, or at a bare `---` header for
/// patches without git headers. Hunk line counts are tracked so that a
/// removed line starting with `-- ` is never mistaken for a new header.
/// Binary files are dropped, as is any preamble before the first header.
///
/// # Errors
///
/// Returns [`ReviewError::Parse`] if a hunk header is malformed.
///
/// # Examples
///
/// ```
/// use reviewbot_difflens::parser::split_unified_diff;
///
/// let files = split_unified_diff("").unwrap();
/// assert!(files.is_empty());
/// ```
pub fn split_unified_diff(input: &str) -> Result<Vec<FileDiff>, ReviewError> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current: Option<FileDiff> = None;
    let mut is_binary = false;
    // Lines still expected in the open hunk: (old side, new side).
    let mut pending: (u32, u32) = (0, 0);

    for raw in input.split_inclusive('\n') {
        let line = raw.trim_end_matches(['\n', '\r']);

        // A hunk shorter than its header claims still ends at the next file.
        if pending != (0, 0) && line.starts_with("diff --git ") {
            pending = (0, 0);
        }

        if pending != (0, 0) {
            if let Some(file) = current.as_mut() {
                file.text.push_str(raw);
            }
            consume_hunk_line(line, &mut pending);
            continue;
        }

        if line.starts_with("diff --git ") {
            finish(&mut files, current.take(), is_binary);
            is_binary = false;
            let mut file = FileDiff::empty();
            if let Some((old, new)) = parse_git_header(line) {
                file.old_path = old;
                file.new_path = new;
            }
            current = Some(file);
        } else if line.starts_with("--- ") && current.as_ref().is_none_or(|f| f.has_changes()) {
            // Bare patch without git headers, or the next file in one.
            finish(&mut files, current.take(), is_binary);
            is_binary = false;
            current = Some(FileDiff::empty());
        }

        let Some(file) = current.as_mut() else {
            continue;
        };
        file.text.push_str(raw);

        if (line.starts_with("Binary files ") && line.ends_with(" differ"))
            || line == "GIT binary patch"
        {
            is_binary = true;
        } else if line.starts_with("new file mode") {
            file.is_new_file = true;
        } else if line.starts_with("deleted file mode") {
            file.is_deleted_file = true;
        } else if let Some(path) = line.strip_prefix("rename from ") {
            file.is_rename = true;
            file.old_path = PathBuf::from(path);
        } else if let Some(path) = line.strip_prefix("rename to ") {
            file.is_rename = true;
            file.new_path = PathBuf::from(path);
        } else if let Some(path) = line.strip_prefix("--- ") {
            file.old_path = parse_path(path);
            if path == "/dev/null" {
                file.is_new_file = true;
            }
        } else if let Some(path) = line.strip_prefix("+++ ") {
            file.new_path = parse_path(path);
            if path == "/dev/null" {
                file.is_deleted_file = true;
            }
        } else if line.starts_with("@@ ") {
            let (_, old_lines, _, new_lines) = parse_hunk_header(line)?;
            file.hunk_count += 1;
            pending = (old_lines, new_lines);
        }
    }

    finish(&mut files, current.take(), is_binary);
    Ok(files)
}

fn finish(files: &mut Vec<FileDiff>, file: Option<FileDiff>, is_binary: bool) {
    if let Some(file) = file {
        if !is_binary {
            files.push(file);
        }
    }
}

fn consume_hunk_line(line: &str, pending: &mut (u32, u32)) {
    let (old, new) = pending;
    match line.chars().next() {
        Some('+') => *new = new.saturating_sub(1),
        Some('-') => *old = old.saturating_sub(1),
        Some('\\') => {}
        // Context line; some tools strip the leading space of blank lines.
        _ => {
            *old = old.saturating_sub(1);
            *new = new.saturating_sub(1);
        }
    }
}

fn parse_git_header(line: &str) -> Option<(PathBuf, PathBuf)> {
    let rest = line.strip_prefix("diff --git ")?;
    let split = rest.rfind(" b/")?;
    let old = &rest[..split];
    let new = &rest[split + 1..];
    Some((parse_path(old), parse_path(new)))
}

fn parse_path(raw: &str) -> PathBuf {
    let normalized = raw.trim_matches('"');

    if normalized == "/dev/null" {
        return PathBuf::from("/dev/null");
    }

    let stripped = normalized
        .strip_prefix("a/")
        .or_else(|| normalized.strip_prefix("b/"))
        .unwrap_or(normalized);

    PathBuf::from(stripped)
}

fn parse_hunk_header(line: &str) -> Result<(u32, u32, u32, u32), ReviewError> {
    let inner = line
        .strip_prefix("@@ ")
        .and_then(|s| {
            let end = s.find(" @@")?;
            Some(&s[..end])
        })
        .ok_or_else(|| ReviewError::Parse(format!("invalid hunk header: {line}")))?;

    let parts: Vec<&str> = inner.split(' ').collect();
    if parts.len() != 2 {
        return Err(ReviewError::Parse(format!("invalid hunk header: {line}")));
    }

    let old = parts[0]
        .strip_prefix('-')
        .ok_or_else(|| ReviewError::Parse(format!("invalid old range in hunk: {line}")))?;
    let new = parts[1]
        .strip_prefix('+')
        .ok_or_else(|| ReviewError::Parse(format!("invalid new range in hunk: {line}")))?;

    let (old_start, old_lines) = parse_range(old, line)?;
    let (new_start, new_lines) = parse_range(new, line)?;

    Ok((old_start, old_lines, new_start, new_lines))
}

fn parse_range(range: &str, context: &str) -> Result<(u32, u32), ReviewError> {
    if let Some((start, count)) = range.split_once(',') {
        let s = start
            .parse()
            .map_err(|_| ReviewError::Parse(format!("invalid range number in: {context}")))?;
        let c = count
            .parse()
            .map_err(|_| ReviewError::Parse(format!("invalid range count in: {context}")))?;
        Ok((s, c))
    } else {
        let s = range
            .parse()
            .map_err(|_| ReviewError::Parse(format!("invalid range number in: {context}")))?;
        Ok((s, 1))
    }
}
