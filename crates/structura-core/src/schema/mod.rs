pub mod export;
pub mod parse;
pub mod scan;

use serde::{Deserialize, Serialize};

pub use export::export_schema_text;
pub use parse::parse_schema_text;
pub use scan::{scan_archive, scan_folder};

/// Identity of a node within one tree. Assigned in pre-order by an [`IdAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Hands out fresh, strictly increasing node ids.
///
/// Each pipeline stage that creates nodes takes the allocator by `&mut`, so
/// identity assignment never depends on process-wide state.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An allocator whose first id follows `last`.
    pub fn starting_after(last: NodeId) -> Self {
        Self { next: last.0 + 1 }
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// Binary-content directive on a file node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerateKind {
    Image,
    Database,
    /// A generator this engine does not know. Kept for round-tripping.
    Other(String),
}

impl GenerateKind {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => GenerateKind::Image,
            "database" | "sqlite" => GenerateKind::Database,
            _ => GenerateKind::Other(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GenerateKind::Image => "image",
            GenerateKind::Database => "database",
            GenerateKind::Other(name) => name,
        }
    }
}

/// Where a file's bytes come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSource {
    pub url: Option<String>,
    pub content: Option<String>,
    pub generate: Option<GenerateKind>,
    /// Nested generator configuration, kept as raw XML.
    pub generate_config: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Folder,
    File(FileSource),
    If { condition_var: String },
    Else,
    Repeat { count: String, as_var: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaNode {
    pub id: NodeId,
    /// May contain placeholders. Empty for control nodes and for an anonymous root.
    pub name: String,
    pub kind: NodeKind,
    pub children: Vec<SchemaNode>,
    /// Attributes the parser does not interpret, in document order.
    pub attributes: Vec<(String, String)>,
}

impl SchemaNode {
    pub fn folder(id: NodeId, name: impl Into<String>, children: Vec<SchemaNode>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: NodeKind::Folder,
            children,
            attributes: Vec::new(),
        }
    }

    pub fn file(id: NodeId, name: impl Into<String>, source: FileSource) -> Self {
        Self {
            id,
            name: name.into(),
            kind: NodeKind::File(source),
            children: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// `if`, `else` and `repeat` nodes.
    pub fn is_control(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::If { .. } | NodeKind::Else | NodeKind::Repeat { .. }
        )
    }

    /// A folder with an empty name stands for the target directory itself.
    pub fn is_anonymous_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder) && self.name.is_empty()
    }

    /// The element name this node is written as.
    pub fn tag(&self) -> &'static str {
        match self.kind {
            NodeKind::Folder => "folder",
            NodeKind::File(_) => "file",
            NodeKind::If { .. } => "if",
            NodeKind::Else => "else",
            NodeKind::Repeat { .. } => "repeat",
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Largest id in this subtree.
    pub fn max_id(&self) -> NodeId {
        self.children
            .iter()
            .map(SchemaNode::max_id)
            .fold(self.id, std::cmp::max)
    }

    /// A copy of this subtree with ids re-assigned in pre-order.
    pub fn with_fresh_ids(&self, ids: &mut IdAllocator) -> SchemaNode {
        let id = ids.next_id();
        SchemaNode {
            id,
            name: self.name.clone(),
            kind: self.kind.clone(),
            children: self
                .children
                .iter()
                .map(|child| child.with_fresh_ids(ids))
                .collect(),
            attributes: self.attributes.clone(),
        }
    }
}

/// Aggregate node counts over a whole schema, control bodies included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaStats {
    pub folders: usize,
    pub files: usize,
    pub downloads: usize,
    pub generated: usize,
}

impl SchemaStats {
    pub fn of(node: &SchemaNode) -> Self {
        let mut stats = SchemaStats::default();
        stats.count(node);
        stats
    }

    fn count(&mut self, node: &SchemaNode) {
        match &node.kind {
            NodeKind::Folder if !node.name.is_empty() => self.folders += 1,
            NodeKind::File(source) => {
                self.files += 1;
                if source.url.is_some() {
                    self.downloads += 1;
                }
                if source.generate.is_some() {
                    self.generated += 1;
                }
            }
            _ => {}
        }
        for child in &node.children {
            self.count(child);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaHooks {
    pub post_create: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaTree {
    pub root: SchemaNode,
    pub stats: SchemaStats,
    pub hooks: SchemaHooks,
    /// Names of the base templates this schema extends, in declaration order.
    pub extends: Vec<String>,
}

impl SchemaTree {
    pub fn new(root: SchemaNode, hooks: SchemaHooks, extends: Vec<String>) -> Self {
        let stats = SchemaStats::of(&root);
        Self {
            root,
            stats,
            hooks,
            extends,
        }
    }

    /// A tree with no hooks and no bases.
    pub fn from_root(root: SchemaNode) -> Self {
        Self::new(root, SchemaHooks::default(), Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("image", GenerateKind::Image)]
    #[case("Database", GenerateKind::Database)]
    #[case("sqlite", GenerateKind::Database)]
    #[case("pdf", GenerateKind::Other("pdf".into()))]
    fn generate_kind_parses_aliases(#[case] raw: &str, #[case] expected: GenerateKind) {
        assert_eq!(GenerateKind::parse(raw), expected);
    }

    #[test]
    fn stats_count_nested_and_control_bodies() {
        let mut ids = IdAllocator::new();
        let root_id = ids.next_id();
        let repeat = SchemaNode {
            id: ids.next_id(),
            name: String::new(),
            kind: NodeKind::Repeat {
                count: "2".into(),
                as_var: "i".into(),
            },
            children: vec![SchemaNode::file(
                ids.next_id(),
                "logo.png",
                FileSource {
                    generate: Some(GenerateKind::Image),
                    ..Default::default()
                },
            )],
            attributes: Vec::new(),
        };
        let download = SchemaNode::file(
            ids.next_id(),
            "LICENSE",
            FileSource {
                url: Some("https://example.com/LICENSE".into()),
                ..Default::default()
            },
        );
        let root = SchemaNode::folder(root_id, "app", vec![repeat, download]);

        let stats = SchemaStats::of(&root);
        assert_eq!(stats.folders, 1);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.downloads, 1);
        assert_eq!(stats.generated, 1);
    }

    #[test]
    fn fresh_ids_are_preorder_and_keep_shape() {
        let mut ids = IdAllocator::new();
        let tree = SchemaNode::folder(
            ids.next_id(),
            "a",
            vec![
                SchemaNode::folder(ids.next_id(), "b", vec![]),
                SchemaNode::file(ids.next_id(), "c", FileSource::default()),
            ],
        );

        let mut fresh = IdAllocator::starting_after(tree.max_id());
        let copy = tree.with_fresh_ids(&mut fresh);
        assert_eq!(copy.id, NodeId(3));
        assert_eq!(copy.children[0].id, NodeId(4));
        assert_eq!(copy.children[1].id, NodeId(5));
        assert_eq!(copy.children[1].name, "c");
    }
}
