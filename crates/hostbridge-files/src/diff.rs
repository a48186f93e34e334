//! Text diff and patch engine
//!
//! Computes a character-level diff between two texts with a Myers
//! shortest-edit walk (common prefix and suffix are trimmed first, and
//! wildly divergent middles fall back to a wholesale replacement), then
//! folds the edit script into line-anchored context hunks and round-trips
//! them through an opaque text encoding. Application is line-anchored and
//! tolerant of small offsets: each hunk's pre-image is searched up to four
//! lines away from its expected position, and hunks that cannot be located
//! are skipped rather than failing the whole patch.
//!
//! Lines carry their trailing newline internally, so content without a
//! final newline survives a generate/apply round trip exactly (the encoding
//! uses the conventional `\ No newline at end of file` marker).

use crate::ops::FileOperations;
use hostbridge_core::{Error, Result, SessionRegistry};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Context lines kept on each side of a change.
const HUNK_CONTEXT: usize = 3;

/// Maximum distance a hunk anchor may be relocated during application.
const MAX_FUZZ: usize = 4;

/// Edit-distance budget for the character walk. Middles that differ by more
/// than this are emitted as one delete-all/insert-all pair, which keeps the
/// walk's memory bounded without affecting round-trip correctness.
const MAX_EDIT_DISTANCE: usize = 1024;

/// One line inside a hunk body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Remove,
    Add,
}

/// A hunk body line; `text` includes its trailing newline when the source
/// line had one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchLine {
    pub kind: LineKind,
    pub text: String,
}

/// A contiguous diff region anchored by surrounding context lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-based first pre-image line (0 for an insertion at the very start)
    pub old_start: usize,
    pub old_count: usize,
    /// 1-based first post-image line
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<PatchLine>,
}

/// Request body for diff generation. Content comes from paths (resolved
/// under the session working directory) or inline strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRequest {
    #[serde(default)]
    pub original_path: String,
    #[serde(default)]
    pub modified_path: String,
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub modified: String,
}

/// Request body for patch application.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRequest {
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub original: String,
    pub patches: String,
}

/// Session-facing diff service.
pub struct DiffEngine {
    registry: Arc<SessionRegistry>,
    files: Arc<FileOperations>,
}

impl DiffEngine {
    pub fn new(registry: Arc<SessionRegistry>, files: Arc<FileOperations>) -> Self {
        Self { registry, files }
    }

    /// Produce serialized patches transforming the original content into the
    /// modified content.
    pub async fn generate(&self, session_id: Uuid, request: &DiffRequest) -> Result<String> {
        let original = if request.original_path.is_empty() {
            request.original.clone()
        } else {
            self.files.read(session_id, &request.original_path).await?
        };
        let modified = if request.modified_path.is_empty() {
            request.modified.clone()
        } else {
            self.files.read(session_id, &request.modified_path).await?
        };

        let patches = make_patch(&original, &modified);

        self.registry
            .log_activity(session_id, "Generated diff")
            .await;
        info!(session = %session_id, hunks = patches.len(), "generated diff");
        Ok(patch_to_text(&patches))
    }

    /// Apply serialized patches to the request's original content,
    /// optionally writing the result back to `file_path`.
    pub async fn apply(&self, session_id: Uuid, request: &PatchRequest) -> Result<String> {
        let patches = patch_from_text(&request.patches)?;
        let (result, applied) = apply_patch(&patches, &request.original);

        if applied.iter().any(|ok| !ok) {
            warn!(
                session = %session_id,
                failed = applied.iter().filter(|ok| !**ok).count(),
                "not all patches applied"
            );
        }

        if !request.file_path.is_empty() {
            self.files
                .update(session_id, &request.file_path, &result)
                .await?;
            info!(session = %session_id, path = %request.file_path, "applied patches to file");
        }

        self.registry
            .log_activity(session_id, "Applied patches")
            .await;
        Ok(result)
    }
}

/// Split text into lines that keep their trailing newline. `"a\nb"` becomes
/// `["a\n", "b"]`; the empty string becomes no lines.
fn split_keep_newlines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditKind {
    Equal,
    Delete,
    Insert,
}

/// A coalesced run of the character edit script.
type Segment = (EditKind, String);

/// Character-level diff of two texts: trim the common prefix and suffix,
/// run the Myers walk over the middles, and coalesce into segments.
fn diff_chars(original: &str, modified: &str) -> Vec<Segment> {
    let a: Vec<char> = original.chars().collect();
    let b: Vec<char> = modified.chars().collect();

    let mut prefix = 0;
    while prefix < a.len() && prefix < b.len() && a[prefix] == b[prefix] {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < a.len() - prefix
        && suffix < b.len() - prefix
        && a[a.len() - 1 - suffix] == b[b.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let mut segments = Vec::new();
    if prefix > 0 {
        segments.push((EditKind::Equal, a[..prefix].iter().collect()));
    }
    segments.extend(middle_segments(
        &a[prefix..a.len() - suffix],
        &b[prefix..b.len() - suffix],
    ));
    if suffix > 0 {
        segments.push((EditKind::Equal, a[a.len() - suffix..].iter().collect()));
    }

    coalesce(segments)
}

fn middle_segments(a: &[char], b: &[char]) -> Vec<Segment> {
    if a.is_empty() && b.is_empty() {
        return Vec::new();
    }
    if a.is_empty() {
        return vec![(EditKind::Insert, b.iter().collect())];
    }
    if b.is_empty() {
        return vec![(EditKind::Delete, a.iter().collect())];
    }

    match myers_chars(a, b) {
        Some(ops) => {
            let mut segments: Vec<Segment> = Vec::new();
            for (kind, ch) in ops {
                match segments.last_mut() {
                    Some((last, text)) if *last == kind => text.push(ch),
                    _ => segments.push((kind, ch.to_string())),
                }
            }
            segments
        }
        // Beyond the budget the middles share too little to be worth a
        // minimal script.
        None => vec![
            (EditKind::Delete, a.iter().collect()),
            (EditKind::Insert, b.iter().collect()),
        ],
    }
}

fn coalesce(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for (kind, text) in segments {
        if text.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some((last, run)) if *last == kind => run.push_str(&text),
            _ => out.push((kind, text)),
        }
    }
    out
}

/// Myers shortest-edit walk over two character slices, returning per-char
/// edits, or `None` when the edit distance exceeds the budget.
fn myers_chars(a: &[char], b: &[char]) -> Option<Vec<(EditKind, char)>> {
    let n = a.len();
    let m = b.len();
    let max_d = (n + m).min(MAX_EDIT_DISTANCE) as isize;

    // k is bounded by +/-d, so the front array only needs the budget's
    // width, not the full text length.
    let offset = max_d;
    let width = (2 * max_d + 1) as usize;
    let mut v = vec![0isize; width];
    let mut trace: Vec<Vec<isize>> = Vec::new();
    let mut distance = None;

    'search: for d in 0..=max_d {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while (x as usize) < n && (y as usize) < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x as usize >= n && y as usize >= m {
                distance = Some(d);
                break 'search;
            }
            k += 2;
        }
    }
    let distance = distance?;

    // Backtrack from (n, m) through the stored furthest-reaching fronts.
    let mut ops: Vec<(EditKind, char)> = Vec::with_capacity(n + m);
    let mut x = n as isize;
    let mut y = m as isize;
    for d in (1..=distance).rev() {
        let front = &trace[d as usize];
        let k = x - y;
        let prev_k = if k == -d
            || (k != d && front[(k - 1 + offset) as usize] < front[(k + 1 + offset) as usize])
        {
            k + 1
        } else {
            k - 1
        };
        let prev_x = front[(prev_k + offset) as usize];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            ops.push((EditKind::Equal, a[x as usize]));
        }
        if x == prev_x {
            y -= 1;
            ops.push((EditKind::Insert, b[y as usize]));
        } else {
            x -= 1;
            ops.push((EditKind::Delete, a[x as usize]));
        }
    }
    while x > 0 && y > 0 {
        x -= 1;
        y -= 1;
        ops.push((EditKind::Equal, a[x as usize]));
    }
    ops.reverse();

    Some(ops)
}

/// A line-level edit derived from the character script.
struct Edit {
    kind: EditKind,
    text: String,
    /// Pre-image lines consumed before this edit
    old_pos: usize,
    /// Post-image lines produced before this edit
    new_pos: usize,
}

/// Character offsets at which each line starts, with an end sentinel.
fn line_starts(lines: &[String]) -> Vec<usize> {
    let mut starts = Vec::with_capacity(lines.len() + 1);
    let mut offset = 0;
    for line in lines {
        starts.push(offset);
        offset += line.chars().count();
    }
    starts.push(offset);
    starts
}

/// Fold the character segments into a line edit script. A line survives as
/// context only when an Equal segment covers it in full on both sides at a
/// shared line boundary; every other line is a remove (old side) or an add
/// (new side). Touching a single character therefore dirties exactly the
/// line containing it.
fn line_edits(original: &str, modified: &str, segments: &[Segment]) -> Vec<Edit> {
    let old_lines = split_keep_newlines(original);
    let new_lines = split_keep_newlines(modified);
    let old_starts = line_starts(&old_lines);
    let new_starts = line_starts(&new_lines);

    let new_start_index: HashMap<usize, usize> = new_starts[..new_lines.len()]
        .iter()
        .enumerate()
        .map(|(j, &start)| (start, j))
        .collect();

    // Pairs of (old line, new line) left untouched by the edit script,
    // strictly increasing in both coordinates.
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    let mut old_off = 0usize;
    let mut new_off = 0usize;
    for (kind, text) in segments {
        let len = text.chars().count();
        match kind {
            EditKind::Equal => {
                let seg_end = old_off + len;
                let mut k = old_starts[..old_lines.len()].partition_point(|&s| s < old_off);
                while k < old_lines.len() && old_starts[k + 1] <= seg_end {
                    let line_len = old_starts[k + 1] - old_starts[k];
                    let mapped = old_starts[k] - old_off + new_off;
                    if let Some(&j) = new_start_index.get(&mapped) {
                        if new_starts[j + 1] == mapped + line_len {
                            pairs.push((k, j));
                        }
                    }
                    k += 1;
                }
                old_off = seg_end;
                new_off += len;
            }
            EditKind::Delete => old_off += len,
            EditKind::Insert => new_off += len,
        }
    }

    let mut edits = Vec::with_capacity(old_lines.len().max(new_lines.len()));
    let mut oi = 0;
    let mut ni = 0;
    for &(i, j) in &pairs {
        while oi < i {
            edits.push(Edit {
                kind: EditKind::Delete,
                text: old_lines[oi].clone(),
                old_pos: oi,
                new_pos: ni,
            });
            oi += 1;
        }
        while ni < j {
            edits.push(Edit {
                kind: EditKind::Insert,
                text: new_lines[ni].clone(),
                old_pos: oi,
                new_pos: ni,
            });
            ni += 1;
        }
        edits.push(Edit {
            kind: EditKind::Equal,
            text: old_lines[oi].clone(),
            old_pos: oi,
            new_pos: ni,
        });
        oi += 1;
        ni += 1;
    }
    while oi < old_lines.len() {
        edits.push(Edit {
            kind: EditKind::Delete,
            text: old_lines[oi].clone(),
            old_pos: oi,
            new_pos: ni,
        });
        oi += 1;
    }
    while ni < new_lines.len() {
        edits.push(Edit {
            kind: EditKind::Insert,
            text: new_lines[ni].clone(),
            old_pos: oi,
            new_pos: ni,
        });
        ni += 1;
    }

    edits
}

/// Diff two texts into context hunks: a character-level Myers walk, grouped
/// at line granularity for the patch encoding.
pub fn make_patch(original: &str, modified: &str) -> Vec<Hunk> {
    let segments = diff_chars(original, modified);
    let edits = line_edits(original, modified, &segments);

    let change_indices: Vec<usize> = edits
        .iter()
        .enumerate()
        .filter(|(_, e)| e.kind != EditKind::Equal)
        .map(|(i, _)| i)
        .collect();
    if change_indices.is_empty() {
        return Vec::new();
    }

    // Group changes whose surrounding context would overlap or touch.
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut start = change_indices[0];
    let mut end = change_indices[0];
    for &idx in &change_indices[1..] {
        if idx - end <= 2 * HUNK_CONTEXT {
            end = idx;
        } else {
            groups.push((start, end));
            start = idx;
            end = idx;
        }
    }
    groups.push((start, end));

    let mut hunks = Vec::with_capacity(groups.len());
    for (first, last) in groups {
        let from = first.saturating_sub(HUNK_CONTEXT);
        let to = (last + HUNK_CONTEXT).min(edits.len() - 1);
        let slice = &edits[from..=to];

        let old_count = slice.iter().filter(|e| e.kind != EditKind::Insert).count();
        let new_count = slice.iter().filter(|e| e.kind != EditKind::Delete).count();
        let old_start = if old_count > 0 {
            slice[0].old_pos + 1
        } else {
            slice[0].old_pos
        };
        let new_start = if new_count > 0 {
            slice[0].new_pos + 1
        } else {
            slice[0].new_pos
        };

        let lines = slice
            .iter()
            .map(|e| PatchLine {
                kind: match e.kind {
                    EditKind::Equal => LineKind::Context,
                    EditKind::Delete => LineKind::Remove,
                    EditKind::Insert => LineKind::Add,
                },
                text: e.text.clone(),
            })
            .collect();

        hunks.push(Hunk {
            old_start,
            old_count,
            new_start,
            new_count,
            lines,
        });
    }

    hunks
}

/// Serialize hunks to the patch text encoding.
pub fn patch_to_text(hunks: &[Hunk]) -> String {
    let mut out = String::new();
    for hunk in hunks {
        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
        ));
        for line in &hunk.lines {
            let marker = match line.kind {
                LineKind::Context => ' ',
                LineKind::Remove => '-',
                LineKind::Add => '+',
            };
            out.push(marker);
            if let Some(stripped) = line.text.strip_suffix('\n') {
                out.push_str(stripped);
                out.push('\n');
            } else {
                out.push_str(&line.text);
                out.push('\n');
                out.push_str("\\ No newline at end of file\n");
            }
        }
    }
    out
}

/// Parse the patch text encoding back into hunks.
pub fn patch_from_text(text: &str) -> Result<Vec<Hunk>> {
    let mut hunks: Vec<Hunk> = Vec::new();

    for raw in text.lines() {
        if let Some(header) = raw.strip_prefix("@@ -") {
            let header = header
                .strip_suffix(" @@")
                .ok_or_else(|| Error::InvalidArgument(format!("malformed hunk header: {raw}")))?;
            let (old_part, new_part) = header
                .split_once(" +")
                .ok_or_else(|| Error::InvalidArgument(format!("malformed hunk header: {raw}")))?;
            let (old_start, old_count) = parse_range(old_part)?;
            let (new_start, new_count) = parse_range(new_part)?;
            hunks.push(Hunk {
                old_start,
                old_count,
                new_start,
                new_count,
                lines: Vec::new(),
            });
            continue;
        }

        let hunk = hunks
            .last_mut()
            .ok_or_else(|| Error::InvalidArgument("patch body before hunk header".into()))?;

        if raw.starts_with('\\') {
            // "\ No newline at end of file": strip the terminator added to
            // the previous body line.
            if let Some(prev) = hunk.lines.last_mut() {
                if prev.text.ends_with('\n') {
                    prev.text.pop();
                }
            }
            continue;
        }

        let (kind, body) = match raw.chars().next() {
            Some(' ') => (LineKind::Context, &raw[1..]),
            Some('-') => (LineKind::Remove, &raw[1..]),
            Some('+') => (LineKind::Add, &raw[1..]),
            None => (LineKind::Context, ""),
            Some(_) => {
                return Err(Error::InvalidArgument(format!(
                    "unrecognized patch line: {raw}"
                )))
            }
        };
        hunk.lines.push(PatchLine {
            kind,
            text: format!("{body}\n"),
        });
    }

    Ok(hunks)
}

fn parse_range(part: &str) -> Result<(usize, usize)> {
    let parse = |s: &str| {
        s.parse::<usize>()
            .map_err(|_| Error::InvalidArgument(format!("malformed hunk range: {part}")))
    };
    match part.split_once(',') {
        Some((start, count)) => Ok((parse(start)?, parse(count)?)),
        None => Ok((parse(part)?, 1)),
    }
}

/// Apply hunks to `original`. Returns the patched text and a per-hunk
/// applied flag; unlocatable hunks are skipped.
pub fn apply_patch(hunks: &[Hunk], original: &str) -> (String, Vec<bool>) {
    let mut lines = split_keep_newlines(original);
    let mut offset: isize = 0;
    let mut applied = Vec::with_capacity(hunks.len());

    for hunk in hunks {
        let pre: Vec<&str> = hunk
            .lines
            .iter()
            .filter(|l| l.kind != LineKind::Add)
            .map(|l| l.text.as_str())
            .collect();
        let post: Vec<String> = hunk
            .lines
            .iter()
            .filter(|l| l.kind != LineKind::Remove)
            .map(|l| l.text.clone())
            .collect();

        let anchor = if hunk.old_count > 0 {
            hunk.old_start.saturating_sub(1)
        } else {
            hunk.old_start
        };
        let expected = (anchor as isize + offset).max(0) as usize;

        match locate(&lines, expected, &pre) {
            Some(pos) => {
                lines.splice(pos..pos + pre.len(), post.iter().cloned());
                offset += post.len() as isize - pre.len() as isize;
                applied.push(true);
            }
            None => {
                warn!(
                    old_start = hunk.old_start,
                    "hunk could not be located, skipping"
                );
                applied.push(false);
            }
        }
    }

    (lines.concat(), applied)
}

/// Find the pre-image within `MAX_FUZZ` lines of the expected position.
fn locate(lines: &[String], expected: usize, pre: &[&str]) -> Option<usize> {
    if pre.is_empty() {
        return Some(expected.min(lines.len()));
    }

    let matches_at = |pos: usize| {
        pos + pre.len() <= lines.len()
            && lines[pos..pos + pre.len()]
                .iter()
                .zip(pre)
                .all(|(have, want)| have == want)
    };

    for delta in 0..=MAX_FUZZ {
        let forward = expected + delta;
        if matches_at(forward) {
            return Some(forward);
        }
        if delta > 0 && expected >= delta {
            let backward = expected - delta;
            if matches_at(backward) {
                return Some(backward);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests;
