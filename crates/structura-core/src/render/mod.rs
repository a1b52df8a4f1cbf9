pub mod context;
pub mod expand;

use serde::{Deserialize, Serialize};

use crate::schema::{FileSource, NodeId};

pub use context::{is_builtin, Bindings, BUILTIN_VARIABLES};
pub use expand::expand;

/// A file in a fully resolved tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcreteFile {
    pub source: FileSource,
    /// Generator parameters such as `width` or `background`, already substituted.
    pub attributes: Vec<(String, String)>,
}

impl ConcreteFile {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcreteKind {
    Folder(Vec<ConcreteNode>),
    File(ConcreteFile),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcreteNode {
    pub id: NodeId,
    /// Final on-disk name. Empty only for an anonymous root.
    pub name: String,
    pub kind: ConcreteKind,
}

impl ConcreteNode {
    pub fn children(&self) -> &[ConcreteNode] {
        match &self.kind {
            ConcreteKind::Folder(children) => children,
            ConcreteKind::File(_) => &[],
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, ConcreteKind::Folder(_))
    }
}

/// A non-fatal problem noticed while expanding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionWarning {
    /// The schema node the warning is about.
    pub node: NodeId,
    pub message: String,
}

impl std::fmt::Display for ExpansionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// A schema with every control node consumed and every placeholder resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcreteTree {
    pub root: ConcreteNode,
    /// Post-create hook commands, substituted.
    pub hooks: Vec<String>,
    pub warnings: Vec<ExpansionWarning>,
}

impl ConcreteTree {
    /// Every node below the root with its `/`-separated path, in depth-first order.
    pub fn entries(&self) -> Vec<(String, &ConcreteNode)> {
        let mut out = Vec::new();
        let base = if self.root.name.is_empty() {
            String::new()
        } else {
            out.push((self.root.name.clone(), &self.root));
            self.root.name.clone()
        };
        collect_entries(self.root.children(), &base, &mut out);
        out
    }
}

fn collect_entries<'a>(nodes: &'a [ConcreteNode], base: &str, out: &mut Vec<(String, &'a ConcreteNode)>) {
    for node in nodes {
        let path = join_rel(base, &node.name);
        out.push((path.clone(), node));
        collect_entries(node.children(), &path, out);
    }
}

/// Join two `/`-separated relative path segments.
pub fn join_rel(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}
