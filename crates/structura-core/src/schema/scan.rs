use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;

use globset::GlobSet;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{FileSource, IdAllocator, NodeId, SchemaNode, SchemaTree};
use crate::config::ScanConfig;
use crate::error::{Result, StructuraError};
use crate::text::{has_binary_extension, is_text};

/// Mirror a directory on disk into a schema tree rooted at a folder named after it.
///
/// Folders sort before files, then by name. Ignored names (per
/// [`ScanConfig::ignore`]) are skipped along with everything below them.
/// Text files up to `max_file_bytes` carry their content.
pub fn scan_folder(path: &Path, config: &ScanConfig) -> Result<SchemaTree> {
    if !path.is_dir() {
        return Err(StructuraError::NotADirectory {
            path: path.to_path_buf(),
        });
    }
    let ignore = config.ignore_set()?;
    let root_name = root_name(path);

    let mut ids = IdAllocator::new();
    let root_id = ids.next_id();
    // stack[d] is the open folder at depth d + 1.
    let mut stack: Vec<SchemaNode> = Vec::new();
    let mut top: Vec<SchemaNode> = Vec::new();

    let walker = WalkDir::new(path)
        .min_depth(1)
        .sort_by(|a, b| {
            b.file_type()
                .is_dir()
                .cmp(&a.file_type().is_dir())
                .then_with(|| a.file_name().cmp(b.file_name()))
        })
        .into_iter()
        .filter_entry(|e| !ignore.is_match(e.file_name()));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry during scan");
                continue;
            }
        };
        while stack.len() >= entry.depth() {
            close_folder(&mut stack, &mut top);
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type();
        if file_type.is_dir() {
            stack.push(SchemaNode::folder(ids.next_id(), name, Vec::new()));
        } else if file_type.is_file() {
            let content = read_text_content(entry.path(), &name, config.max_file_bytes);
            let node = SchemaNode::file(
                ids.next_id(),
                name,
                FileSource {
                    content,
                    ..Default::default()
                },
            );
            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => top.push(node),
            }
        } else {
            debug!(path = %entry.path().display(), "skipping non-regular entry");
        }
    }
    while !stack.is_empty() {
        close_folder(&mut stack, &mut top);
    }

    Ok(SchemaTree::from_root(SchemaNode::folder(
        root_id, root_name, top,
    )))
}

fn close_folder(stack: &mut Vec<SchemaNode>, top: &mut Vec<SchemaNode>) {
    if let Some(done) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(done),
            None => top.push(done),
        }
    }
}

fn root_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            path.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| "root".to_string())
}

fn read_text_content(path: &Path, name: &str, max_bytes: u64) -> Option<String> {
    if has_binary_extension(name) {
        return None;
    }
    let size = std::fs::metadata(path).ok()?.len();
    if size > max_bytes {
        debug!(path = %path.display(), size, "file too large to inline");
        return None;
    }
    let bytes = std::fs::read(path).ok()?;
    if !is_text(&bytes) {
        return None;
    }
    String::from_utf8(bytes).ok()
}

/// Folder contents collected from a flat archive listing.
#[derive(Default)]
struct ArchiveDir {
    dirs: BTreeMap<String, ArchiveDir>,
    files: BTreeMap<String, Option<String>>,
}

impl ArchiveDir {
    fn dir_mut(&mut self, components: &[String]) -> &mut ArchiveDir {
        components
            .iter()
            .fold(self, |dir, part| dir.dirs.entry(part.clone()).or_default())
    }

    fn into_nodes(self, ids: &mut IdAllocator) -> Vec<SchemaNode> {
        let mut nodes = Vec::with_capacity(self.dirs.len() + self.files.len());
        for (name, dir) in self.dirs {
            let id = ids.next_id();
            let children = dir.into_nodes(ids);
            nodes.push(SchemaNode::folder(id, name, children));
        }
        for (name, content) in self.files {
            nodes.push(SchemaNode::file(
                ids.next_id(),
                name,
                FileSource {
                    content,
                    ..Default::default()
                },
            ));
        }
        nodes
    }
}

/// Mirror a zip archive held in memory into a schema tree.
///
/// An archive with a single top-level directory is rooted at that directory.
/// Otherwise the root folder is named after the archive file's stem.
pub fn scan_archive(bytes: &[u8], name: &str, config: &ScanConfig) -> Result<SchemaTree> {
    let archive_err = |source| StructuraError::Archive {
        name: name.to_string(),
        source,
    };
    let ignore = config.ignore_set()?;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(archive_err)?;

    let mut listing = ArchiveDir::default();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(archive_err)?;
        let Some(path) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "skipping archive entry with unsafe path");
            continue;
        };
        let components: Vec<String> = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if components.is_empty() || components.iter().any(|c| is_ignored(&ignore, c)) {
            continue;
        }

        if entry.is_dir() {
            listing.dir_mut(&components);
            continue;
        }
        let Some((file_name, parents)) = components.split_last() else {
            continue;
        };
        let content = if has_binary_extension(file_name) || entry.size() > config.max_file_bytes
        {
            None
        } else {
            let mut buf = Vec::new();
            match entry.read_to_end(&mut buf) {
                Ok(_) if is_text(&buf) => String::from_utf8(buf).ok(),
                Ok(_) => None,
                Err(err) => {
                    warn!(entry = %file_name, error = %err, "failed to read archive entry");
                    None
                }
            }
        };
        listing
            .dir_mut(parents)
            .files
            .insert(file_name.clone(), content);
    }

    let mut ids = IdAllocator::new();
    let root = if listing.files.is_empty() && listing.dirs.len() == 1 {
        // The lone directory is the first and only node produced.
        match listing.into_nodes(&mut ids).pop() {
            Some(only) => only,
            None => SchemaNode::folder(NodeId(0), "", Vec::new()),
        }
    } else {
        let id = ids.next_id();
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "archive".to_string());
        SchemaNode::folder(id, stem, listing.into_nodes(&mut ids))
    };
    Ok(SchemaTree::from_root(root))
}

fn is_ignored(ignore: &GlobSet, component: &str) -> bool {
    ignore.is_match(component)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NodeKind;
    use std::fs;
    use std::io::Write;

    fn content_of(node: &SchemaNode) -> Option<&str> {
        match &node.kind {
            NodeKind::File(src) => src.content.as_deref(),
            _ => None,
        }
    }

    #[test]
    fn scan_orders_folders_first_and_skips_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("proj");
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("b.txt"), "bee").unwrap();
        fs::write(root.join("a.txt"), "ay").unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(root.join(".env"), "SECRET=1").unwrap();

        let tree = scan_folder(&root, &ScanConfig::default()).unwrap();
        assert_eq!(tree.root.name, "proj");
        let names: Vec<_> = tree.root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["src", "a.txt", "b.txt"]);
        assert_eq!(content_of(&tree.root.children[0].children[0]), Some("fn main() {}"));
        assert_eq!(tree.stats.folders, 2);
        assert_eq!(tree.stats.files, 3);
    }

    #[test]
    fn scan_skips_content_of_binary_and_large_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("img.png"), "not really png").unwrap();
        fs::write(tmp.path().join("blob.dat"), [0u8, 159, 146, 150, 0, 1]).unwrap();
        fs::write(tmp.path().join("big.txt"), "x".repeat(64)).unwrap();

        let config = ScanConfig {
            max_file_bytes: 32,
            ..Default::default()
        };
        let tree = scan_folder(tmp.path(), &config).unwrap();
        for child in &tree.root.children {
            assert_eq!(content_of(child), None, "{} should have no content", child.name);
        }
    }

    #[test]
    fn scan_ids_are_preorder() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs::write(tmp.path().join("a/b/c.txt"), "c").unwrap();
        fs::write(tmp.path().join("z.txt"), "z").unwrap();

        let tree = scan_folder(tmp.path(), &ScanConfig::default()).unwrap();
        let a = &tree.root.children[0];
        assert_eq!(a.id.0, 1);
        assert_eq!(a.children[0].id.0, 2);
        assert_eq!(a.children[0].children[0].id.0, 3);
        assert_eq!(tree.root.children[1].id.0, 4);
    }

    #[test]
    fn scan_rejects_files() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let err = scan_folder(tmp.path(), &ScanConfig::default()).unwrap_err();
        assert!(matches!(err, StructuraError::NotADirectory { .. }));
    }

    fn zip_bytes(entries: &[(&str, Option<&str>)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            for (path, content) in entries {
                match content {
                    Some(text) => {
                        writer.start_file(*path, options).unwrap();
                        writer.write_all(text.as_bytes()).unwrap();
                    }
                    None => writer.add_directory(*path, options).unwrap(),
                }
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn archive_with_single_top_dir_is_rooted_there() {
        let bytes = zip_bytes(&[
            ("app/", None),
            ("app/src/lib.rs", Some("pub mod a;")),
            ("app/README.md", Some("# app")),
            ("app/.DS_Store", Some("junk")),
        ]);
        let tree = scan_archive(&bytes, "app-v1.zip", &ScanConfig::default()).unwrap();
        assert_eq!(tree.root.name, "app");
        let names: Vec<_> = tree.root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["src", "README.md"]);
        assert_eq!(content_of(&tree.root.children[0].children[0]), Some("pub mod a;"));
    }

    #[test]
    fn archive_with_loose_entries_is_named_after_the_file() {
        let bytes = zip_bytes(&[("a.txt", Some("a")), ("docs/b.md", Some("b"))]);
        let tree = scan_archive(&bytes, "bundle.zip", &ScanConfig::default()).unwrap();
        assert_eq!(tree.root.name, "bundle");
        assert_eq!(tree.root.children[0].name, "docs");
        assert_eq!(tree.root.children[1].name, "a.txt");
    }

    #[test]
    fn garbage_archive_is_an_error() {
        let err = scan_archive(b"not a zip", "x.zip", &ScanConfig::default()).unwrap_err();
        assert!(matches!(err, StructuraError::Archive { .. }));
    }
}
