mod content;
pub mod fetch;
pub mod undo;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use self::content::{Effect, FileJob, JobOutcome};
use crate::config::EngineConfig;
use crate::diff::{diff_tree, DiffAction, DiffNode};
use crate::hooks::{run_post_create, HookResult};
use crate::render::{Bindings, ConcreteKind, ConcreteNode, ConcreteTree};
use crate::schema::GenerateKind;

pub use fetch::{Fetch, FetchError, HttpFetcher};
pub use undo::{load_manifest, save_manifest, undo_structure, UndoResult, UndoSummary};

#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Report what would happen without touching the filesystem, the network
    /// or running hooks.
    pub dry_run: bool,
    pub overwrite: bool,
    /// Checked between nodes; once set, no further node is started.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl CreateOptions {
    fn cancel_flag(&self) -> Option<&AtomicBool> {
        self.cancel.as_deref()
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Success,
    Warning,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub log_type: LogLevel,
    pub message: String,
    pub details: Option<String>,
}

impl LogEntry {
    pub fn new(log_type: LogLevel, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            log_type,
            message: message.into(),
            details,
        }
    }

    pub fn success(message: impl Into<String>, details: Option<String>) -> Self {
        Self::new(LogLevel::Success, message, details)
    }

    pub fn warning(message: impl Into<String>, details: Option<String>) -> Self {
        Self::new(LogLevel::Warning, message, details)
    }

    pub fn error(message: impl Into<String>, details: Option<String>) -> Self {
        Self::new(LogLevel::Error, message, details)
    }

    pub fn info(message: impl Into<String>, details: Option<String>) -> Self {
        Self::new(LogLevel::Info, message, details)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub folders_created: usize,
    pub files_created: usize,
    pub files_downloaded: usize,
    pub files_generated: usize,
    pub errors: usize,
    pub skipped: usize,
    pub hooks_executed: usize,
    pub hooks_failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    File,
    Folder,
}

/// A path written by a run, kept so the run can be undone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedItem {
    pub path: String,
    pub item_type: ItemType,
    /// Set for files that were overwritten rather than created.
    pub pre_existed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateResult {
    pub logs: Vec<LogEntry>,
    pub summary: ResultSummary,
    pub hook_results: Vec<HookResult>,
    pub created_items: Vec<CreatedItem>,
}

/// What an apply run needs besides the tree itself.
pub struct ApplyContext<'a> {
    /// Used to substitute placeholders in downloaded text.
    pub bindings: &'a Bindings,
    pub fetcher: &'a dyn Fetch,
    pub config: &'a EngineConfig,
}

/// Materialize a concrete tree under `target`.
///
/// Per-node failures never abort the run: they become `error` log entries and
/// bump `summary.errors`, and processing moves on to the next node. Hooks run
/// after every node has been handled, and only for a real run.
pub fn apply(
    tree: &ConcreteTree,
    target: &Path,
    options: &CreateOptions,
    ctx: &ApplyContext<'_>,
) -> CreateResult {
    info!(target = %target.display(), dry_run = options.dry_run, overwrite = options.overwrite, "applying structure");
    let mut result = CreateResult::default();
    for warning in &tree.warnings {
        result
            .logs
            .push(LogEntry::warning(warning.message.clone(), None));
    }

    if options.dry_run {
        preview(tree, target, options, ctx, &mut result);
    } else {
        materialize(tree, target, options, ctx, &mut result);
    }

    info!(
        folders = result.summary.folders_created,
        files = result.summary.files_created,
        downloaded = result.summary.files_downloaded,
        generated = result.summary.files_generated,
        errors = result.summary.errors,
        skipped = result.summary.skipped,
        "apply finished"
    );
    result
}

/// Hooks run inside the root folder when it exists, otherwise in the target.
fn hook_working_dir(tree: &ConcreteTree, target: &Path) -> PathBuf {
    if !tree.root.name.is_empty() {
        let root = target.join(&tree.root.name);
        if root.is_dir() {
            return root;
        }
    }
    target.to_path_buf()
}

fn generator_label(kind: &GenerateKind) -> Option<&'static str> {
    match kind {
        GenerateKind::Image => Some("image"),
        GenerateKind::Database => Some("database"),
        GenerateKind::Other(_) => None,
    }
}

enum Slot {
    Entry(LogEntry, Option<CreatedItem>),
    Job { index: usize, pre_existed: bool },
}

struct Walk<'t> {
    options: &'t CreateOptions,
    slots: Vec<Slot>,
    jobs: Vec<FileJob<'t>>,
    summary: ResultSummary,
    cancelled: bool,
    /// File paths already taken by an earlier node of this run.
    claimed_files: HashSet<PathBuf>,
}

impl<'t> Walk<'t> {
    fn entry(&mut self, entry: LogEntry) {
        self.slots.push(Slot::Entry(entry, None));
    }

    fn skip(&mut self, message: String, details: Option<String>) {
        self.summary.skipped += 1;
        self.entry(LogEntry::warning(message, details));
    }

    /// `blocked` is set below a folder that could not be created.
    fn node(&mut self, node: &'t ConcreteNode, parent: &Path, blocked: bool) {
        if self.cancelled || self.options.is_cancelled() {
            self.cancelled = true;
            return;
        }
        let path = parent.join(&node.name);
        let shown = path.display().to_string();

        match &node.kind {
            ConcreteKind::Folder(children) => {
                let mut blocked_below = blocked;
                if blocked {
                    self.skip(format!("Skipped (parent not created): {}", node.name), Some(shown));
                } else if self.claimed_files.contains(&path) {
                    self.skip(
                        format!("Skipped (not a folder): {}", node.name),
                        Some(format!("{shown} is already written as a file by this run")),
                    );
                    blocked_below = true;
                } else if path.is_dir() {
                    self.entry(LogEntry::info(format!("Folder exists: {}", node.name), Some(shown)));
                } else if path.exists() {
                    self.skip(
                        format!("Skipped (not a folder): {}", node.name),
                        Some(format!("{shown} exists and is not a folder")),
                    );
                    blocked_below = true;
                } else {
                    match std::fs::create_dir_all(&path) {
                        Ok(()) => {
                            self.summary.folders_created += 1;
                            self.slots.push(Slot::Entry(
                                LogEntry::success(format!("Created folder: {}", node.name), Some(shown.clone())),
                                Some(CreatedItem {
                                    path: shown,
                                    item_type: ItemType::Folder,
                                    pre_existed: false,
                                }),
                            ));
                        }
                        Err(e) => {
                            warn!(path = %shown, error = %e, "folder creation failed");
                            self.summary.errors += 1;
                            self.entry(LogEntry::error(
                                format!("Failed to create folder: {}", node.name),
                                Some(format!("Error: {e}")),
                            ));
                            blocked_below = true;
                        }
                    }
                }
                for child in children {
                    self.node(child, &path, blocked_below);
                }
            }
            ConcreteKind::File(file) => {
                if blocked {
                    self.skip(format!("Skipped (parent not created): {}", node.name), Some(shown));
                    return;
                }
                if !self.claimed_files.insert(path.clone()) {
                    self.skip(format!("Skipped (duplicate): {}", node.name), Some(shown));
                    return;
                }
                let pre_existed = path.exists();
                if pre_existed && !self.options.overwrite {
                    self.skip(format!("Skipped (exists): {}", node.name), Some(shown));
                    return;
                }
                self.slots.push(Slot::Job {
                    index: self.jobs.len(),
                    pre_existed,
                });
                self.jobs.push(FileJob {
                    name: &node.name,
                    path,
                    file,
                });
            }
        }
    }
}

fn materialize(
    tree: &ConcreteTree,
    target: &Path,
    options: &CreateOptions,
    ctx: &ApplyContext<'_>,
    result: &mut CreateResult,
) {
    if !target.is_dir() {
        if let Err(e) = std::fs::create_dir_all(target) {
            result.summary.errors += 1;
            result.logs.push(LogEntry::error(
                format!("Failed to create target directory: {}", target.display()),
                Some(format!("Error: {e}")),
            ));
            return;
        }
    }

    let mut walk = Walk {
        options,
        slots: Vec::new(),
        jobs: Vec::new(),
        summary: ResultSummary::default(),
        cancelled: false,
        claimed_files: HashSet::new(),
    };
    if tree.root.name.is_empty() {
        for child in tree.root.children() {
            walk.node(child, target, false);
        }
    } else {
        walk.node(&tree.root, target, false);
    }
    debug!(jobs = walk.jobs.len(), "folders done, writing files");

    let mut outcomes = run_jobs(&walk.jobs, ctx, options.cancel_flag());
    let mut summary = walk.summary;
    let mut cancelled = walk.cancelled;

    for slot in walk.slots {
        match slot {
            Slot::Entry(entry, created) => {
                result.logs.push(entry);
                result.created_items.extend(created);
            }
            Slot::Job { index, pre_existed } => {
                let Some(JobOutcome { effect, log }) = outcomes[index].take() else {
                    cancelled = true;
                    continue;
                };
                match effect {
                    Effect::Created => summary.files_created += 1,
                    Effect::Downloaded => summary.files_downloaded += 1,
                    Effect::Generated => summary.files_generated += 1,
                    Effect::Skipped => summary.skipped += 1,
                    Effect::Failed => summary.errors += 1,
                }
                if effect.wrote() {
                    result.created_items.push(CreatedItem {
                        path: walk.jobs[index].path.display().to_string(),
                        item_type: ItemType::File,
                        pre_existed,
                    });
                }
                result.logs.push(log);
            }
        }
    }
    result.summary = summary;

    if cancelled {
        result.logs.push(LogEntry::warning(
            "Operation cancelled",
            Some("Remaining items and hooks were not processed".into()),
        ));
        return;
    }

    run_hooks(tree, target, result);
}

/// Run every file job on a bounded pool of scoped threads.
///
/// Outcomes come back through a channel in completion order and are stored
/// by job index. A job that never ran (cancelled) stays `None`.
fn run_jobs(
    jobs: &[FileJob<'_>],
    ctx: &ApplyContext<'_>,
    cancel: Option<&AtomicBool>,
) -> Vec<Option<JobOutcome>> {
    let mut outcomes: Vec<Option<JobOutcome>> = jobs.iter().map(|_| None).collect();
    if jobs.is_empty() {
        return outcomes;
    }

    let workers = ctx.config.download.max_concurrent.clamp(1, jobs.len());
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel();

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            scope.spawn(move || loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some(job) = jobs.get(index) else {
                    break;
                };
                if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                    break;
                }
                let outcome = content::write_file(job, ctx.bindings, ctx.fetcher);
                if tx.send((index, outcome)).is_err() {
                    break;
                }
            });
        }
        drop(tx);
        for (index, outcome) in rx {
            outcomes[index] = Some(outcome);
        }
    });
    outcomes
}

fn run_hooks(tree: &ConcreteTree, target: &Path, result: &mut CreateResult) {
    if tree.hooks.is_empty() {
        return;
    }
    let dir = hook_working_dir(tree, target);
    let details = format!("Working directory: {}", dir.display());

    for hook in run_post_create(&tree.hooks, &dir) {
        let command = &hook.command;
        result
            .logs
            .push(LogEntry::info(format!("Running hook: {command}"), Some(details.clone())));
        if hook.success {
            result.summary.hooks_executed += 1;
            result.logs.push(LogEntry::success(
                format!("Hook completed: {command}"),
                hook.stdout.clone(),
            ));
        } else {
            result.summary.hooks_failed += 1;
            let details = hook
                .stderr
                .clone()
                .or_else(|| Some(format!("Exit code: {:?}", hook.exit_code)));
            result
                .logs
                .push(LogEntry::error(format!("Hook failed: {command}"), details));
        }
        result.hook_results.push(hook);
    }
}

fn preview(
    tree: &ConcreteTree,
    target: &Path,
    options: &CreateOptions,
    ctx: &ApplyContext<'_>,
    result: &mut CreateResult,
) {
    let diff = diff_tree(tree, target, options.overwrite, &ctx.config.diff);
    if tree.root.name.is_empty() {
        for (node, planned) in tree.root.children().iter().zip(diff.root.children.iter().flatten()) {
            preview_node(node, planned, target, result);
        }
    } else {
        preview_node(&tree.root, &diff.root, target, result);
    }

    let details = format!("Working directory: {}", hook_working_dir(tree, target).display());
    for command in &tree.hooks {
        result
            .logs
            .push(LogEntry::info(format!("Would run hook: {command}"), Some(details.clone())));
    }
}

/// Log what a real run would do for one node, using the diff's decision.
fn preview_node(node: &ConcreteNode, planned: &DiffNode, target: &Path, result: &mut CreateResult) {
    let shown = target.join(&planned.path).display().to_string();
    let summary = &mut result.summary;
    let entry = match (&node.kind, planned.action) {
        (ConcreteKind::Folder(_), DiffAction::Create) => {
            summary.folders_created += 1;
            LogEntry::info(format!("Would create folder: {}", node.name), Some(shown))
        }
        (ConcreteKind::Folder(_), DiffAction::Skip) => {
            summary.skipped += 1;
            LogEntry::warning(format!("Would skip folder: {}", node.name), Some(shown))
        }
        (ConcreteKind::Folder(_), _) => {
            LogEntry::info(format!("Folder exists: {}", node.name), Some(shown))
        }
        (ConcreteKind::File(_), DiffAction::Skip | DiffAction::Unchanged) => {
            summary.skipped += 1;
            LogEntry::warning(format!("Skipped (exists): {}", node.name), Some(shown))
        }
        (ConcreteKind::File(file), action) => {
            let verb = if action == DiffAction::Overwrite {
                "overwrite"
            } else {
                "create"
            };
            let source = &file.source;
            match (&source.generate, &source.content, &source.url) {
                (Some(kind), _, _) => match generator_label(kind) {
                    Some(label) => {
                        summary.files_generated += 1;
                        LogEntry::info(format!("Would generate {label}: {}", node.name), Some(shown))
                    }
                    None => {
                        summary.skipped += 1;
                        LogEntry::warning(
                            format!("Unknown generator type: {}", kind.as_str()),
                            Some(format!(
                                "File '{}' would be skipped. Supported generators: image, database",
                                node.name
                            )),
                        )
                    }
                },
                (None, None, Some(url)) => {
                    summary.files_downloaded += 1;
                    LogEntry::info(format!("Would download: {}", node.name), Some(url.clone()))
                }
                _ => {
                    summary.files_created += 1;
                    LogEntry::info(format!("Would {verb} file: {}", node.name), Some(shown))
                }
            }
        }
    };
    result.logs.push(entry);

    for (child, planned_child) in node.children().iter().zip(planned.children.iter().flatten()) {
        preview_node(child, planned_child, target, result);
    }
}
