//! Zero-context unified diff parser
//!
//! Extracts per-file changed line sets from `git diff --unified=0` output and
//! change statuses from `git diff --name-status`, then joins the two into
//! [`FileChange`] records.

use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Compiled once, reused across all calls to `hunk_new_lines`
static HUNK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@@ [^@]* \+(\d+)(?:,(\d+))? @@").expect("hardcoded hunk regex"));

/// How a file changed between two revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl std::fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeStatus::Added => write!(f, "added"),
            ChangeStatus::Modified => write!(f, "modified"),
            ChangeStatus::Deleted => write!(f, "deleted"),
            ChangeStatus::Renamed => write!(f, "renamed"),
        }
    }
}

/// One changed file introduced by a commit.
///
/// `changed_lines` is always in the coordinate system of the post-change
/// file, which is what makes intersection with freshly parsed spans valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    /// Repository-relative path (post-rename path for renames)
    pub path: String,
    /// Pre-rename path, only set for `Renamed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    pub status: ChangeStatus,
    /// 1-based line numbers in the new version of the file
    pub changed_lines: BTreeSet<u32>,
}

impl FileChange {
    pub fn new(path: impl Into<String>, status: ChangeStatus) -> Self {
        Self {
            path: path.into(),
            old_path: None,
            status,
            changed_lines: BTreeSet::new(),
        }
    }

    pub fn with_lines(mut self, lines: impl IntoIterator<Item = u32>) -> Self {
        self.changed_lines.extend(lines);
        self
    }

    /// Path the file had in the parent revision
    pub fn parent_path(&self) -> &str {
        self.old_path.as_deref().unwrap_or(&self.path)
    }

    /// True if any changed line falls inside `[start, end]` (inclusive)
    pub fn touches(&self, start: u32, end: u32) -> bool {
        start <= end && self.changed_lines.range(start..=end).next().is_some()
    }
}

/// Changed lines accumulated for one `diff --git` section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHunks {
    /// Pre-change path (`None` for added files)
    pub old_path: Option<String>,
    /// Post-change path (`None` for deleted files)
    pub new_path: Option<String>,
    /// Changed line numbers in the new file
    pub lines: BTreeSet<u32>,
    /// Binary sections carry no line information
    pub binary: bool,
}

/// One line of `git diff --name-status` output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameStatusEntry {
    pub status: ChangeStatus,
    pub path: String,
    pub old_path: Option<String>,
}

/// New-file line range covered by a hunk header, half-open.
///
/// Returns `None` if `line` is not a hunk header. Count defaults to 1 when
/// omitted (`@@ -1 +1 @@`); an explicit zero count (pure deletion) yields an
/// empty range.
pub fn hunk_new_lines(line: &str) -> Option<Range<u32>> {
    let caps = HUNK_RE.captures(line)?;
    let start: u32 = match caps[1].parse() {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!(line, "Could not parse hunk start line, skipping hunk");
            return None;
        }
    };
    let count: u32 = match caps.get(2) {
        Some(m) => match m.as_str().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(line, "Could not parse hunk count, defaulting to 1");
                1
            }
        },
        None => 1,
    };
    Some(start..start.saturating_add(count))
}

/// Parse zero-context unified diff output into one entry per file section.
///
/// - Splits on `diff --git` boundaries, flushing the previous section on
///   each new header and once more at the end
/// - Takes paths from `---`/`+++` lines (`/dev/null` marks the absent side),
///   falling back to the `diff --git a/<old> b/<new>` header for sections
///   without them (pure renames, mode changes, binaries)
/// - Only reads `---`/`+++` before the first hunk, so removed lines that
///   happen to start with `--` are never taken for file headers
pub fn parse_zero_context_diff(input: &str) -> Vec<FileHunks> {
    if input.is_empty() {
        return Vec::new();
    }

    // Normalize CRLF for Windows git output (bare \r from classic Mac too)
    let input = if input.contains('\r') {
        std::borrow::Cow::Owned(input.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        std::borrow::Cow::Borrowed(input)
    };

    let mut files = Vec::new();
    let mut current: Option<FileHunks> = None;
    let mut in_header = false;

    for line in input.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            if let Some(done) = current.take() {
                files.push(done);
            }
            let (old, new) = parse_git_header(rest).unwrap_or_default();
            current = Some(FileHunks {
                old_path: Some(old).filter(|p| !p.is_empty()),
                new_path: Some(new).filter(|p| !p.is_empty()),
                ..Default::default()
            });
            in_header = true;
            continue;
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if in_header {
            if line.starts_with("new file mode") {
                file.old_path = None;
                continue;
            }
            if line.starts_with("deleted file mode") {
                file.new_path = None;
                continue;
            }
            if let Some(path) = line.strip_prefix("--- ") {
                file.old_path = side_path(path, "a/");
                continue;
            }
            if let Some(path) = line.strip_prefix("+++ ") {
                file.new_path = side_path(path, "b/");
                continue;
            }
            if line.starts_with("Binary files ") {
                file.binary = true;
                continue;
            }
        }

        if let Some(range) = hunk_new_lines(line) {
            in_header = false;
            if file.new_path.is_some() {
                file.lines.extend(range);
            }
        }
    }

    if let Some(done) = current.take() {
        files.push(done);
    }

    files
}

/// Parse `git diff --name-status` output.
///
/// `A` is added, `M`/`T` modified, `D` deleted, `R###` renamed (new path
/// wins), `C###` a copy, which is a new file as far as tests are concerned.
pub fn parse_name_status(input: &str) -> Vec<NameStatusEntry> {
    let mut entries = Vec::new();

    for line in input.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split('\t').collect();
        let Some(code) = parts.first().and_then(|c| c.chars().next()) else {
            continue;
        };

        let entry = match (code, parts.len()) {
            ('A', 2) => NameStatusEntry {
                status: ChangeStatus::Added,
                path: unquote_path(parts[1]),
                old_path: None,
            },
            ('M' | 'T', 2) => NameStatusEntry {
                status: ChangeStatus::Modified,
                path: unquote_path(parts[1]),
                old_path: None,
            },
            ('D', 2) => NameStatusEntry {
                status: ChangeStatus::Deleted,
                path: unquote_path(parts[1]),
                old_path: None,
            },
            ('R', 3) => NameStatusEntry {
                status: ChangeStatus::Renamed,
                path: unquote_path(parts[2]),
                old_path: Some(unquote_path(parts[1])),
            },
            ('C', 3) => NameStatusEntry {
                status: ChangeStatus::Added,
                path: unquote_path(parts[2]),
                old_path: None,
            },
            _ => {
                tracing::warn!(line, "Skipping unrecognized name-status line");
                continue;
            }
        };
        entries.push(entry);
    }

    entries
}

/// Join name/status entries with hunk-derived line sets by post-change path.
///
/// Output order follows the name/status listing. Deleted files never carry
/// changed lines.
pub fn join_changes(entries: Vec<NameStatusEntry>, hunks: Vec<FileHunks>) -> Vec<FileChange> {
    let mut lines_by_path: HashMap<String, BTreeSet<u32>> = HashMap::new();
    for file in hunks {
        if let Some(path) = file.new_path {
            lines_by_path.entry(path).or_default().extend(file.lines);
        }
    }

    entries
        .into_iter()
        .map(|entry| {
            let changed_lines = if entry.status == ChangeStatus::Deleted {
                BTreeSet::new()
            } else {
                lines_by_path.remove(&entry.path).unwrap_or_default()
            };
            FileChange {
                path: entry.path,
                old_path: entry.old_path,
                status: entry.status,
                changed_lines,
            }
        })
        .collect()
}

/// Split the remainder of a `diff --git ` header into (old, new) paths
fn parse_git_header(rest: &str) -> Option<(String, String)> {
    if rest.starts_with('"') {
        let (old, tail) = split_quoted(rest)?;
        let tail = tail.trim_start();
        let new = if tail.starts_with('"') {
            split_quoted(tail)?.0
        } else {
            tail.to_string()
        };
        return Some((strip_side(&old, "a/"), strip_side(&new, "b/")));
    }
    let old = rest.strip_prefix("a/")?;
    let idx = old.find(" b/")?;
    Some((old[..idx].to_string(), old[idx + 3..].to_string()))
}

/// Path from a `---`/`+++` line; `None` for `/dev/null`
fn side_path(raw: &str, prefix: &str) -> Option<String> {
    // git appends a tab after names containing spaces
    let raw = raw.trim_end_matches('\t');
    if raw == "/dev/null" {
        return None;
    }
    let path = unquote_path(raw);
    Some(strip_side(&path, prefix))
}

fn strip_side(path: &str, prefix: &str) -> String {
    path.strip_prefix(prefix).unwrap_or(path).to_string()
}

/// Read one C-style quoted string from the start of `s`, returning the
/// decoded value and the remainder after the closing quote.
fn split_quoted(s: &str) -> Option<(String, &str)> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'"') {
        return None;
    }
    let mut out: Vec<u8> = Vec::new();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return Some((String::from_utf8_lossy(&out).into_owned(), &s[i + 1..])),
            b'\\' if i + 1 < bytes.len() => {
                let next = bytes[i + 1];
                match next {
                    b'n' => out.push(b'\n'),
                    b't' => out.push(b'\t'),
                    b'0'..=b'7' => {
                        let end = (i + 4).min(bytes.len());
                        let digits = &bytes[i + 1..end];
                        if digits.len() == 3 && digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                            let v = digits
                                .iter()
                                .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                            out.push(v as u8);
                            i += 4;
                            continue;
                        }
                        out.push(next);
                    }
                    other => out.push(other),
                }
                i += 2;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    None
}

/// Decode a path git may have quoted (special characters, non-ASCII)
pub(crate) fn unquote_path(raw: &str) -> String {
    match split_quoted(raw) {
        Some((path, rest)) if rest.is_empty() => path,
        _ => raw.to_string(),
    }
}
