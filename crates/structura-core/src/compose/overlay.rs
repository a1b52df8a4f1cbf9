use crate::schema::{IdAllocator, NodeKind, SchemaNode, SchemaTree};

/// The entries a tree contributes when overlaid: an anonymous root
/// contributes its children, a named root contributes itself.
pub fn top_level_entries(tree: &SchemaTree) -> Vec<SchemaNode> {
    if tree.root.is_anonymous_folder() {
        tree.root.children.clone()
    } else {
        vec![tree.root.clone()]
    }
}

fn same_entry(a: &SchemaNode, b: &SchemaNode) -> bool {
    !a.is_control() && !b.is_control() && a.tag() == b.tag() && a.name == b.name
}

/// Overlay `layer` on `base`. A layer entry with the same kind and name as a
/// base entry replaces it whole, in place; other entries are appended in order.
pub fn overlay_entries(base: &mut Vec<SchemaNode>, layer: Vec<SchemaNode>) {
    for entry in layer {
        match base.iter().position(|existing| same_entry(existing, &entry)) {
            Some(pos) => base[pos] = entry,
            None => base.push(entry),
        }
    }
}

/// Build a root from merged entries, with ids re-assigned in pre-order.
///
/// A single named folder becomes the root itself; anything else is held by an
/// anonymous root.
pub fn root_from_entries(mut entries: Vec<SchemaNode>) -> SchemaNode {
    let mut ids = IdAllocator::new();
    let single_folder = entries.len() == 1
        && matches!(entries[0].kind, NodeKind::Folder)
        && !entries[0].name.is_empty();
    if single_folder {
        if let Some(only) = entries.pop() {
            return only.with_fresh_ids(&mut ids);
        }
    }
    SchemaNode::folder(crate::schema::NodeId(0), "", entries).with_fresh_ids(&mut ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema_text;

    fn entries(text: &str) -> Vec<SchemaNode> {
        top_level_entries(&parse_schema_text(text).unwrap())
    }

    fn names(nodes: &[SchemaNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn overlay_replaces_same_named_entry_in_place() {
        let mut base = entries(r#"<template><file name="a">base</file><folder name="src"/><file name="c"/></template>"#);
        overlay_entries(&mut base, entries(r#"<template><folder name="src"><file name="lib.rs"/></folder><file name="d"/></template>"#));
        assert_eq!(names(&base), ["a", "src", "c", "d"]);
        assert_eq!(base[1].children.len(), 1);
    }

    #[test]
    fn overlay_distinguishes_files_from_folders() {
        let mut base = entries(r#"<template><file name="docs"/><file name="x"/></template>"#);
        overlay_entries(&mut base, entries(r#"<template><folder name="docs"/></template>"#));
        assert_eq!(names(&base), ["docs", "x", "docs"]);
    }

    #[test]
    fn control_entries_are_always_appended() {
        let mut base = entries(r#"<template><if var="A"><file name="a"/></if><file name="z"/></template>"#);
        overlay_entries(&mut base, entries(r#"<template><if var="A"><file name="b"/></if><else/></template>"#));
        assert_eq!(base.len(), 4);
        assert_eq!(base[2].tag(), "if");
        assert_eq!(base[3].tag(), "else");
    }

    #[test]
    fn single_named_folder_becomes_root() {
        let root = root_from_entries(entries(r#"<folder name="app"><file name="a"/></folder>"#));
        assert_eq!(root.name, "app");
        assert_eq!(root.id.0, 0);
        assert_eq!(root.children[0].id.0, 1);

        let root = root_from_entries(entries(r#"<template><file name="a"/><file name="b"/></template>"#));
        assert!(root.is_anonymous_folder());
        assert_eq!(names(&root.children), ["a", "b"]);
    }
}
