use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{CreatedItem, ItemType, LogEntry};
use crate::error::{Result, StructuraError};

/// Write the items a run created as pretty JSON, for a later undo.
pub fn save_manifest(path: &Path, items: &[CreatedItem]) -> Result<()> {
    let json =
        serde_json::to_string_pretty(items).map_err(|e| StructuraError::Manifest { source: e })?;
    std::fs::write(path, json).map_err(|e| StructuraError::Io {
        context: format!("writing manifest {}", path.display()),
        source: e,
    })
}

pub fn load_manifest(path: &Path) -> Result<Vec<CreatedItem>> {
    let json = std::fs::read_to_string(path).map_err(|e| StructuraError::Io {
        context: format!("reading manifest {}", path.display()),
        source: e,
    })?;
    serde_json::from_str(&json).map_err(|e| StructuraError::Manifest { source: e })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoSummary {
    pub files_deleted: usize,
    pub folders_deleted: usize,
    pub items_skipped: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoResult {
    pub logs: Vec<LogEntry>,
    pub summary: UndoSummary,
}

/// Remove what a previous run created.
///
/// Items that existed before that run are never touched. Files go first,
/// newest first; folders follow deepest first and only when empty.
pub fn undo_structure(items: &[CreatedItem], dry_run: bool) -> UndoResult {
    let mut undo = Undo {
        dry_run,
        logs: Vec::new(),
        summary: UndoSummary::default(),
    };

    let mut files = Vec::new();
    let mut folders = Vec::new();
    for item in items {
        if item.pre_existed {
            undo.summary.items_skipped += 1;
            undo.logs.push(LogEntry::info(
                format!("Skipped (pre-existed): {}", item.path),
                Some("This item existed before creation and was overwritten".into()),
            ));
            continue;
        }
        match item.item_type {
            ItemType::File => files.push(item),
            ItemType::Folder => folders.push(item),
        }
    }

    for item in files.iter().rev() {
        undo.file(Path::new(&item.path), &item.path);
    }

    folders.sort_by_key(|item| std::cmp::Reverse(Path::new(&item.path).components().count()));
    for item in folders {
        undo.folder(Path::new(&item.path), &item.path);
    }

    info!(
        files = undo.summary.files_deleted,
        folders = undo.summary.folders_deleted,
        dry_run,
        "undo finished"
    );
    UndoResult {
        logs: undo.logs,
        summary: undo.summary,
    }
}

struct Undo {
    dry_run: bool,
    logs: Vec<LogEntry>,
    summary: UndoSummary,
}

impl Undo {
    fn file(&mut self, path: &Path, shown: &str) {
        if !path.is_file() {
            self.summary.items_skipped += 1;
            self.logs
                .push(LogEntry::info(format!("File already deleted: {shown}"), None));
            return;
        }
        if self.dry_run {
            self.summary.files_deleted += 1;
            self.logs
                .push(LogEntry::info(format!("Would delete file: {shown}"), None));
            return;
        }
        match std::fs::remove_file(path) {
            Ok(()) => {
                self.summary.files_deleted += 1;
                self.logs
                    .push(LogEntry::success(format!("Deleted file: {shown}"), None));
            }
            Err(e) => {
                self.summary.errors += 1;
                self.logs.push(LogEntry::error(
                    format!("Failed to delete file: {shown}"),
                    Some(format!("Error: {e}")),
                ));
            }
        }
    }

    fn folder(&mut self, path: &Path, shown: &str) {
        if !path.is_dir() {
            self.summary.items_skipped += 1;
            self.logs
                .push(LogEntry::info(format!("Folder already deleted: {shown}"), None));
            return;
        }
        let empty = match std::fs::read_dir(path) {
            Ok(mut entries) => entries.next().is_none(),
            Err(e) => {
                self.summary.errors += 1;
                self.logs.push(LogEntry::error(
                    format!("Failed to read folder: {shown}"),
                    Some(format!("Error: {e}")),
                ));
                return;
            }
        };
        if !empty {
            self.summary.items_skipped += 1;
            self.logs.push(LogEntry::info(
                format!("Folder not empty, skipped: {shown}"),
                None,
            ));
            return;
        }
        if self.dry_run {
            self.summary.folders_deleted += 1;
            self.logs
                .push(LogEntry::info(format!("Would delete folder: {shown}"), None));
            return;
        }
        match std::fs::remove_dir(path) {
            Ok(()) => {
                self.summary.folders_deleted += 1;
                self.logs
                    .push(LogEntry::success(format!("Deleted folder: {shown}"), None));
            }
            Err(e) => {
                self.summary.errors += 1;
                self.logs.push(LogEntry::error(
                    format!("Failed to delete folder: {shown}"),
                    Some(format!("Error: {e}")),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn item(path: &Path, item_type: ItemType, pre_existed: bool) -> CreatedItem {
        CreatedItem {
            path: path.display().to_string(),
            item_type,
            pre_existed,
        }
    }

    #[test]
    fn deletes_new_files_then_empty_folders() {
        let tmp = tempfile::tempdir().unwrap();
        let outer = tmp.path().join("a");
        let inner = outer.join("b");
        fs::create_dir_all(&inner).unwrap();
        fs::write(inner.join("x.txt"), "x").unwrap();

        let items = vec![
            item(&outer, ItemType::Folder, false),
            item(&inner, ItemType::Folder, false),
            item(&inner.join("x.txt"), ItemType::File, false),
        ];
        let result = undo_structure(&items, false);
        assert_eq!(result.summary.files_deleted, 1);
        assert_eq!(result.summary.folders_deleted, 2);
        assert!(!outer.exists());
    }

    #[test]
    fn pre_existing_items_survive() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("keep.txt");
        fs::write(&file, "mine").unwrap();
        let result = undo_structure(&[item(&file, ItemType::File, true)], false);
        assert_eq!(result.summary.items_skipped, 1);
        assert!(file.exists());
    }

    #[test]
    fn non_empty_folders_are_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("d");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("user.txt"), "added later").unwrap();
        let result = undo_structure(&[item(&dir, ItemType::Folder, false)], false);
        assert_eq!(result.summary.folders_deleted, 0);
        assert_eq!(result.summary.items_skipped, 1);
        assert!(dir.exists());
    }

    #[test]
    fn dry_run_deletes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("f.txt");
        fs::write(&file, "x").unwrap();
        let result = undo_structure(&[item(&file, ItemType::File, false)], true);
        assert_eq!(result.summary.files_deleted, 1);
        assert!(file.exists());
        assert!(result.logs[0].message.starts_with("Would delete file"));
    }

    #[test]
    fn manifest_survives_a_round_trip_through_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let manifest = tmp.path().join("created.json");
        let items = vec![item(&tmp.path().join("a"), ItemType::Folder, false)];
        save_manifest(&manifest, &items).unwrap();
        assert_eq!(load_manifest(&manifest).unwrap(), items);

        std::fs::write(&manifest, "{not json").unwrap();
        assert!(matches!(
            load_manifest(&manifest),
            Err(StructuraError::Manifest { .. })
        ));
    }

    #[test]
    fn missing_items_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let result = undo_structure(
            &[
                item(&tmp.path().join("gone.txt"), ItemType::File, false),
                item(&tmp.path().join("gone"), ItemType::Folder, false),
            ],
            false,
        );
        assert_eq!(result.summary.items_skipped, 2);
        assert_eq!(result.summary.errors, 0);
    }
}
