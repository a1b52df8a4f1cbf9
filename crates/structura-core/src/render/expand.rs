use tracing::{debug, warn};

use super::context::Bindings;
use super::{ConcreteFile, ConcreteKind, ConcreteNode, ConcreteTree, ExpansionWarning};
use crate::config::ExpandConfig;
use crate::schema::{FileSource, IdAllocator, NodeId, NodeKind, SchemaNode, SchemaTree};
use crate::transform::{find_variable_refs, substitute, substitute_xml};

/// Evaluate control nodes and placeholders, producing a tree of folders and files.
///
/// Pure: the same tree, bindings and config always give an identical result,
/// including the ids handed to repeat clones.
pub fn expand(tree: &SchemaTree, bindings: &Bindings, config: &ExpandConfig) -> ConcreteTree {
    let mut expander = Expander {
        ids: IdAllocator::starting_after(tree.root.max_id()),
        warnings: Vec::new(),
        config,
        produced: 0,
        budget_exhausted: false,
    };

    let root = match &tree.root.kind {
        NodeKind::Folder if tree.root.is_anonymous_folder() => ConcreteNode {
            id: tree.root.id,
            name: String::new(),
            kind: ConcreteKind::Folder(expander.expand_children(&tree.root.children, bindings)),
        },
        // An unusable root name drops the whole tree rather than writing into the target itself.
        NodeKind::Folder => match expander.resolve_name(&tree.root, bindings) {
            Some(name) => ConcreteNode {
                id: tree.root.id,
                name,
                kind: ConcreteKind::Folder(expander.expand_children(&tree.root.children, bindings)),
            },
            None => ConcreteNode {
                id: tree.root.id,
                name: String::new(),
                kind: ConcreteKind::Folder(Vec::new()),
            },
        },
        _ => {
            let id = expander.ids.next_id();
            let children = expander.expand_children(std::slice::from_ref(&tree.root), bindings);
            ConcreteNode {
                id,
                name: String::new(),
                kind: ConcreteKind::Folder(children),
            }
        }
    };

    let hooks = tree
        .hooks
        .post_create
        .iter()
        .map(|command| substitute(command, bindings))
        .collect();

    ConcreteTree {
        root,
        hooks,
        warnings: expander.warnings,
    }
}

struct Expander<'c> {
    ids: IdAllocator,
    warnings: Vec<ExpansionWarning>,
    config: &'c ExpandConfig,
    produced: u64,
    budget_exhausted: bool,
}

impl Expander<'_> {
    fn warn(&mut self, node: NodeId, message: String) {
        warn!(node = node.0, "{message}");
        self.warnings.push(ExpansionWarning { node, message });
    }

    /// Counts one produced folder or file; false once the total budget is spent.
    fn claim_node(&mut self, node: &SchemaNode) -> bool {
        if self.budget_exhausted {
            return false;
        }
        if self.produced >= self.config.max_total_nodes {
            self.budget_exhausted = true;
            let max = self.config.max_total_nodes;
            self.warn(
                node.id,
                format!("expansion reached the limit of {max} entries; remaining entries skipped"),
            );
            return false;
        }
        self.produced += 1;
        true
    }

    fn expand_children(&mut self, children: &[SchemaNode], bindings: &Bindings) -> Vec<ConcreteNode> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < children.len() {
            let node = &children[i];
            i += 1;
            match &node.kind {
                NodeKind::If { condition_var } => {
                    let else_start = i;
                    while i < children.len() && matches!(children[i].kind, NodeKind::Else) {
                        i += 1;
                    }
                    let elses = &children[else_start..i];

                    if bindings.is_truthy(condition_var) {
                        out.extend(self.expand_children(&node.children, bindings));
                    } else if let Some(first) = elses.first() {
                        out.extend(self.expand_children(&first.children, bindings));
                    }
                    for unreachable in elses.iter().skip(1) {
                        self.warn(
                            unreachable.id,
                            format!(
                                "else block after the first one following if var=\"{condition_var}\" is unreachable"
                            ),
                        );
                    }
                }
                NodeKind::Else => {
                    self.warn(node.id, "else block without a preceding if is ignored".into());
                }
                NodeKind::Repeat { count, as_var } => {
                    out.extend(self.expand_repeat(node, count, as_var, bindings));
                }
                NodeKind::Folder => {
                    if !self.claim_node(node) {
                        continue;
                    }
                    if let Some(name) = self.resolve_name(node, bindings) {
                        let children = self.expand_children(&node.children, bindings);
                        out.push(ConcreteNode {
                            id: node.id,
                            name,
                            kind: ConcreteKind::Folder(children),
                        });
                    }
                }
                NodeKind::File(source) => {
                    if !self.claim_node(node) {
                        continue;
                    }
                    if let Some(name) = self.resolve_name(node, bindings) {
                        out.push(ConcreteNode {
                            id: node.id,
                            name,
                            kind: ConcreteKind::File(expand_file(node, source, bindings)),
                        });
                    }
                }
            }
        }
        out
    }

    /// Substituted name, or `None` when it cannot be used as one path component.
    fn resolve_name(&mut self, node: &SchemaNode, bindings: &Bindings) -> Option<String> {
        let name = substitute(&node.name, bindings);
        let invalid = name.trim().is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\');
        if invalid {
            self.warn(
                node.id,
                format!(
                    "{} name '{}' resolves to '{name}', which is not a valid entry name; skipped",
                    node.tag(),
                    node.name
                ),
            );
            return None;
        }
        Some(name)
    }

    fn expand_repeat(
        &mut self,
        node: &SchemaNode,
        count: &str,
        as_var: &str,
        bindings: &Bindings,
    ) -> Vec<ConcreteNode> {
        if !is_valid_iteration_var(as_var) {
            self.warn(
                node.id,
                format!(
                    "repeat variable '{as_var}' must be letters, digits or '_' and not start with a digit; block skipped"
                ),
            );
            return Vec::new();
        }
        if as_var.ends_with("_1") {
            self.warn(
                node.id,
                format!(
                    "repeat variable '{as_var}' ends with '_1' and may be confused with the 1-based index of another variable"
                ),
            );
        }

        let iterations = self.resolve_count(node, count, bindings);
        if iterations == 0 {
            debug!(node = node.id.0, "repeat produced no iterations");
            return Vec::new();
        }

        let one_based = format!("{as_var}_1");
        let mut out = Vec::new();
        for i in 0..iterations {
            if self.budget_exhausted {
                break;
            }
            let mut scoped = bindings.clone();
            scoped.insert(as_var, i.to_string());
            scoped.insert(&one_based, (i + 1).to_string());

            let clones: Vec<SchemaNode> = node
                .children
                .iter()
                .map(|child| child.with_fresh_ids(&mut self.ids))
                .collect();
            out.extend(self.expand_children(&clones, &scoped));
        }
        out
    }

    fn resolve_count(&mut self, node: &SchemaNode, raw: &str, bindings: &Bindings) -> u64 {
        let trimmed = raw.trim();
        let refs = find_variable_refs(trimmed);
        let resolved = match refs.as_slice() {
            [only] if only.raw == trimmed => substitute(trimmed, bindings),
            _ => trimmed.to_string(),
        };

        let max = self.config.max_repeat_count;
        match resolved.trim().parse::<i64>() {
            Ok(n) if n < 0 => {
                self.warn(
                    node.id,
                    format!("repeat count '{raw}' resolved to {n}, which is negative; no iterations"),
                );
                0
            }
            Ok(n) if n as u64 > max => {
                self.warn(
                    node.id,
                    format!("repeat count '{raw}' resolved to {n}, clamped to the maximum of {max}"),
                );
                max
            }
            Ok(n) => n as u64,
            Err(_) => {
                self.warn(
                    node.id,
                    format!("repeat count '{raw}' resolved to '{resolved}', which is not an integer; no iterations"),
                );
                0
            }
        }
    }
}

pub(crate) fn is_valid_iteration_var(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn expand_file(node: &SchemaNode, source: &FileSource, bindings: &Bindings) -> ConcreteFile {
    let sub = |value: &Option<String>| value.as_deref().map(|v| substitute(v, bindings));
    // Only generator parameters take placeholders; other attributes pass through untouched.
    let attributes = if source.generate.is_some() {
        node.attributes
            .iter()
            .map(|(k, v)| (k.clone(), substitute(v, bindings)))
            .collect()
    } else {
        node.attributes.clone()
    };
    ConcreteFile {
        source: FileSource {
            url: sub(&source.url),
            content: sub(&source.content),
            generate: source.generate.clone(),
            generate_config: source
                .generate_config
                .as_deref()
                .map(|config| substitute_xml(config, bindings)),
        },
        attributes,
    }
}
