use std::fmt::Write;

use quick_xml::escape::{escape, partial_escape};

use super::{NodeKind, SchemaNode, SchemaTree};

/// Serialize a tree back to schema text that parses to the same tree.
///
/// File content is written verbatim (escaped) with no added indentation, so
/// whitespace inside files survives the round trip.
pub fn export_schema_text(tree: &SchemaTree) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

    let wrap = !tree.extends.is_empty()
        || !tree.hooks.post_create.is_empty()
        || tree.root.is_anonymous_folder();
    if !wrap {
        write_node(&mut out, &tree.root, 0);
        return out;
    }

    out.push_str("<template");
    if !tree.extends.is_empty() {
        push_attr(&mut out, "extends", &tree.extends.join(", "));
    }
    let entries: &[SchemaNode] = if tree.root.is_anonymous_folder() {
        &tree.root.children
    } else {
        std::slice::from_ref(&tree.root)
    };
    if entries.is_empty() && tree.hooks.post_create.is_empty() {
        out.push_str("/>\n");
        return out;
    }
    out.push_str(">\n");

    if !tree.hooks.post_create.is_empty() {
        out.push_str("  <hooks>\n");
        for command in &tree.hooks.post_create {
            let _ = writeln!(out, "    <post-create>{}</post-create>", partial_escape(command));
        }
        out.push_str("  </hooks>\n");
    }
    for entry in entries {
        write_node(&mut out, entry, 1);
    }
    out.push_str("</template>\n");
    out
}

fn push_attr(out: &mut String, key: &str, value: &str) {
    let _ = write!(out, " {key}=\"{}\"", escape(value));
}

fn write_node(out: &mut String, node: &SchemaNode, depth: usize) {
    let indent = "  ".repeat(depth);
    out.push_str(&indent);
    out.push('<');
    out.push_str(node.tag());

    match &node.kind {
        NodeKind::Folder => push_attr(out, "name", &node.name),
        NodeKind::File(source) => {
            push_attr(out, "name", &node.name);
            if let Some(url) = &source.url {
                push_attr(out, "url", url);
            }
            if let Some(generate) = &source.generate {
                push_attr(out, "generate", generate.as_str());
            }
        }
        NodeKind::If { condition_var } => push_attr(out, "var", condition_var),
        NodeKind::Else => {}
        NodeKind::Repeat { count, as_var } => {
            push_attr(out, "count", count);
            push_attr(out, "as", as_var);
        }
    }
    for (key, value) in &node.attributes {
        push_attr(out, key, value);
    }

    if let NodeKind::File(source) = &node.kind {
        if source.content.is_none() && source.generate_config.is_none() {
            out.push_str("/>\n");
            return;
        }
        out.push('>');
        if let Some(content) = &source.content {
            out.push_str(&partial_escape(content));
        }
        if let Some(config) = &source.generate_config {
            out.push_str(config);
        }
        out.push_str("</file>\n");
        return;
    }

    if node.children.is_empty() {
        out.push_str("/>\n");
        return;
    }
    out.push_str(">\n");
    for child in &node.children {
        write_node(out, child, depth + 1);
    }
    let _ = writeln!(out, "{indent}</{}>", node.tag());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema_text;

    fn round_trip(text: &str) {
        let tree = parse_schema_text(text).unwrap();
        let exported = export_schema_text(&tree);
        let reparsed = parse_schema_text(&exported).unwrap();
        assert_eq!(reparsed, tree, "exported text:\n{exported}");
    }

    #[test]
    fn round_trips_plain_tree() {
        round_trip(
            r#"<folder name="%PROJECT%">
                 <folder name="src"><file name="lib.rs">pub fn a() {}
</file></folder>
                 <file name="empty"></file>
                 <file name="none"/>
               </folder>"#,
        );
    }

    #[test]
    fn round_trips_control_nodes_and_attributes() {
        round_trip(
            r#"<folder name="a" owner="me">
                 <if var="X"><file name="x"/></if><else><file name="y"/></else>
                 <repeat count="%N%" as="n"><folder name="item_%n%"/></repeat>
                 <file name="logo.png" generate="image" width="64" height="64"/>
                 <file name="LICENSE" url="https://example.com/l?a=1&amp;b=2"/>
               </folder>"#,
        );
    }

    #[test]
    fn round_trips_generator_config() {
        round_trip(
            r#"<folder name="a"><file name="db.sqlite" generate="database">
                 <table name="t"><column name="id" type="INTEGER"/></table>
                 <sql>CREATE INDEX i ON t(id);</sql>
               </file></folder>"#,
        );
    }

    #[test]
    fn round_trips_template_wrapper() {
        round_trip(
            r#"<template extends="base">
                 <hooks><post-create>echo "a &amp; b"</post-create></hooks>
                 <folder name="app"/>
               </template>"#,
        );
        round_trip(r#"<template><file name="a"/><file name="b">x &lt; y</file></template>"#);
    }

    #[test]
    fn escapes_markup_in_content() {
        let tree =
            parse_schema_text(r#"<folder name="a"><file name="b">&lt;div&gt; &amp;</file></folder>"#)
                .unwrap();
        let exported = export_schema_text(&tree);
        assert!(exported.contains("&lt;div&gt; &amp;"));
    }
}
