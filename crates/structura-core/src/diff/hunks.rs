use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffLineType {
    Add,
    Remove,
    Context,
    /// Stands in for lines elided from an oversized hunk.
    Truncated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    pub line_type: DiffLineType,
    /// The line without its terminator.
    pub content: String,
}

/// One unified-diff hunk. Starts are 1-based; a zero count starts at the line before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<DiffLine>,
}

/// Line-level diff of `old` against `new`, grouped with `context` lines around
/// each change. Hunks longer than `max_lines` keep their head and tail.
pub fn compute_hunks(old: &str, new: &str, context: usize, max_lines: usize) -> Vec<DiffHunk> {
    let diff = TextDiff::from_lines(old, new);
    diff.grouped_ops(context)
        .iter()
        .filter_map(|group| {
            let (first, last) = (group.first()?, group.last()?);
            let old_range = first.old_range().start..last.old_range().end;
            let new_range = first.new_range().start..last.new_range().end;

            let lines = group
                .iter()
                .flat_map(|op| diff.iter_changes(op))
                .map(|change| DiffLine {
                    line_type: match change.tag() {
                        ChangeTag::Delete => DiffLineType::Remove,
                        ChangeTag::Insert => DiffLineType::Add,
                        ChangeTag::Equal => DiffLineType::Context,
                    },
                    content: change.value().trim_end_matches(['\n', '\r']).to_string(),
                })
                .collect();

            Some(DiffHunk {
                old_start: hunk_start(&old_range),
                old_count: old_range.len(),
                new_start: hunk_start(&new_range),
                new_count: new_range.len(),
                lines: truncate_lines(lines, max_lines),
            })
        })
        .collect()
}

fn hunk_start(range: &std::ops::Range<usize>) -> usize {
    if range.is_empty() {
        range.start
    } else {
        range.start + 1
    }
}

fn truncate_lines(mut lines: Vec<DiffLine>, max_lines: usize) -> Vec<DiffLine> {
    if lines.len() <= max_lines || max_lines < 2 {
        return lines;
    }
    let head = max_lines / 2;
    let tail = max_lines - head;
    let elided = lines.len() - head - tail;
    let tail_lines = lines.split_off(lines.len() - tail);
    lines.truncate(head);
    lines.push(DiffLine {
        line_type: DiffLineType::Truncated,
        content: format!("... {elided} lines truncated ..."),
    });
    lines.extend(tail_lines);
    lines
}
