pub mod hunks;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::DiffConfig;
use crate::render::{join_rel, ConcreteFile, ConcreteKind, ConcreteNode, ConcreteTree};
use crate::text::is_text;

pub use hunks::{compute_hunks, DiffHunk, DiffLine, DiffLineType};

/// Files larger than this are never read for a line diff.
const MAX_DIFF_INPUT_BYTES: u64 = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffAction {
    Create,
    Overwrite,
    Skip,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffNodeType {
    Folder,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffNode {
    /// Short hash of `path`; stable across recomputation.
    pub id: String,
    pub node_type: DiffNodeType,
    pub name: String,
    /// `/`-separated, relative to the target root. Empty for the target itself.
    pub path: String,
    pub action: DiffAction,
    pub existing_content: Option<String>,
    pub new_content: Option<String>,
    pub diff_hunks: Option<Vec<DiffHunk>>,
    pub url: Option<String>,
    pub is_binary: bool,
    pub children: Option<Vec<DiffNode>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub total_items: usize,
    pub creates: usize,
    pub overwrites: usize,
    pub skips: usize,
    pub unchanged_folders: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub root: DiffNode,
    pub summary: DiffSummary,
}

impl DiffResult {
    /// Every node in depth-first order, root included.
    pub fn nodes(&self) -> Vec<&DiffNode> {
        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }
}

fn collect<'a>(node: &'a DiffNode, out: &mut Vec<&'a DiffNode>) {
    out.push(node);
    for child in node.children.iter().flatten() {
        collect(child, out);
    }
}

pub fn diff_id(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Compare a concrete tree with what exists under `target`.
///
/// Reads the filesystem but never writes to it. Each node's action depends
/// only on its own target path, not on its parent's action.
pub fn diff_tree(
    tree: &ConcreteTree,
    target: &Path,
    overwrite: bool,
    config: &DiffConfig,
) -> DiffResult {
    let mut differ = Differ {
        target,
        overwrite,
        config,
        planned_files: HashSet::new(),
        planned_folders: HashSet::new(),
        summary: DiffSummary {
            warnings: tree.warnings.iter().map(|w| w.message.clone()).collect(),
            ..Default::default()
        },
    };

    let root = if tree.root.name.is_empty() {
        let action = if target.is_dir() {
            DiffAction::Unchanged
        } else {
            DiffAction::Create
        };
        let children = differ.diff_children(tree.root.children(), "", false);
        DiffNode {
            id: diff_id(""),
            node_type: DiffNodeType::Folder,
            name: String::new(),
            path: String::new(),
            action,
            existing_content: None,
            new_content: None,
            diff_hunks: None,
            url: None,
            is_binary: false,
            children: Some(children),
        }
    } else {
        differ.diff_node(&tree.root, "", false)
    };

    DiffResult {
        root,
        summary: differ.summary,
    }
}

struct Differ<'a> {
    target: &'a Path,
    overwrite: bool,
    config: &'a DiffConfig,
    /// Relative paths an earlier node of this tree will create.
    planned_files: HashSet<String>,
    planned_folders: HashSet<String>,
    summary: DiffSummary,
}

impl Differ<'_> {
    fn diff_children(&mut self, nodes: &[ConcreteNode], base: &str, blocked: bool) -> Vec<DiffNode> {
        nodes
            .iter()
            .map(|node| self.diff_node(node, base, blocked))
            .collect()
    }

    fn count(&mut self, action: DiffAction) {
        self.summary.total_items += 1;
        match action {
            DiffAction::Create => self.summary.creates += 1,
            DiffAction::Overwrite => self.summary.overwrites += 1,
            DiffAction::Skip => self.summary.skips += 1,
            DiffAction::Unchanged => self.summary.unchanged_folders += 1,
        }
    }

    /// `blocked` is set below a folder that cannot be created because a file
    /// occupies its path; everything under it is skipped.
    fn diff_node(&mut self, node: &ConcreteNode, base: &str, blocked: bool) -> DiffNode {
        let path = join_rel(base, &node.name);
        let full = self.target.join(&path);

        match &node.kind {
            ConcreteKind::Folder(children) => {
                let mut now_blocked = blocked;
                let action = if blocked {
                    DiffAction::Skip
                } else if self.planned_files.contains(&path) {
                    self.summary
                        .warnings
                        .push(format!("'{path}' is already planned as a file; folder skipped"));
                    now_blocked = true;
                    DiffAction::Skip
                } else if full.is_dir() || self.planned_folders.contains(&path) {
                    DiffAction::Unchanged
                } else if full.exists() {
                    self.summary
                        .warnings
                        .push(format!("'{path}' exists and is not a folder; skipped"));
                    now_blocked = true;
                    DiffAction::Skip
                } else {
                    self.planned_folders.insert(path.clone());
                    DiffAction::Create
                };
                self.count(action);
                let children = self.diff_children(children, &path, now_blocked);
                DiffNode {
                    id: diff_id(&path),
                    node_type: DiffNodeType::Folder,
                    name: node.name.clone(),
                    path,
                    action,
                    existing_content: None,
                    new_content: None,
                    diff_hunks: None,
                    url: None,
                    is_binary: false,
                    children: Some(children),
                }
            }
            ConcreteKind::File(file) => self.diff_file(node, file, path, &full, blocked),
        }
    }

    fn diff_file(
        &mut self,
        node: &ConcreteNode,
        file: &ConcreteFile,
        path: String,
        full: &Path,
        blocked: bool,
    ) -> DiffNode {
        let planned = planned_content(file);
        let mut is_binary = planned.is_none();

        let (action, existing) = if blocked {
            (DiffAction::Skip, Existing::Absent)
        } else if !self.planned_files.insert(path.clone()) {
            self.summary
                .warnings
                .push(format!("'{path}' appears more than once; later entries skipped"));
            (DiffAction::Skip, Existing::Absent)
        } else if full.is_dir() || self.planned_folders.contains(&path) {
            self.summary
                .warnings
                .push(format!("'{path}' exists as a folder; file skipped"));
            (DiffAction::Skip, Existing::Absent)
        } else if full.exists() {
            let existing = read_existing(full);
            if matches!(existing, Existing::Binary) {
                is_binary = true;
            }
            let action = if self.overwrite {
                DiffAction::Overwrite
            } else {
                DiffAction::Skip
            };
            (action, existing)
        } else {
            (DiffAction::Create, Existing::Absent)
        };
        self.count(action);

        let diff_hunks = match (&existing, planned.as_deref()) {
            (Existing::Text(old), Some(new)) if action == DiffAction::Overwrite && !is_binary => {
                let hunks = compute_hunks(
                    old,
                    new,
                    self.config.context_lines,
                    self.config.max_hunk_lines,
                );
                (!hunks.is_empty()).then_some(hunks)
            }
            _ => None,
        };
        debug!(path = %path, ?action, hunks = diff_hunks.as_ref().map_or(0, Vec::len), "diffed file");

        let new_content = planned
            .map(|content| truncate_chars(&content, self.config.max_content_chars))
            .or_else(|| preview_placeholder(file));
        let existing_content = match existing {
            Existing::Text(old) => Some(truncate_chars(&old, self.config.max_content_chars)),
            _ => None,
        };

        DiffNode {
            id: diff_id(&path),
            node_type: DiffNodeType::File,
            name: node.name.clone(),
            path,
            action,
            existing_content,
            new_content,
            diff_hunks,
            url: file.source.url.clone(),
            is_binary,
            children: None,
        }
    }
}

enum Existing {
    Absent,
    Text(String),
    Binary,
    /// Present but too large or unreadable.
    Unavailable,
}

fn read_existing(path: &Path) -> Existing {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > MAX_DIFF_INPUT_BYTES => return Existing::Unavailable,
        Err(_) => return Existing::Unavailable,
        Ok(_) => {}
    }
    match std::fs::read(path) {
        Ok(bytes) if is_text(&bytes) => match String::from_utf8(bytes) {
            Ok(text) => Existing::Text(text),
            Err(_) => Existing::Binary,
        },
        Ok(_) => Existing::Binary,
        Err(_) => Existing::Unavailable,
    }
}

/// The text that will be written, when it is known before applying.
///
/// A generated file's text is input to its generator, so its bytes are not
/// known here, nor are those of an unfetched URL. A file with neither is
/// created from its inline content, or empty.
pub(crate) fn planned_content(file: &ConcreteFile) -> Option<String> {
    let source = &file.source;
    if source.generate.is_some() {
        return None;
    }
    match (&source.content, &source.url) {
        (Some(content), _) => Some(content.clone()),
        (None, Some(_)) => None,
        (None, None) => Some(String::new()),
    }
}

fn preview_placeholder(file: &ConcreteFile) -> Option<String> {
    let source = &file.source;
    if let Some(kind) = &source.generate {
        return Some(format!("[Generated {} content]", kind.as_str()));
    }
    source
        .url
        .as_ref()
        .map(|url| format!("[Content from URL: {url}]"))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}... (truncated)", &text[..cut]),
        None => text.to_string(),
    }
}
