use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use super::{FileSource, GenerateKind, IdAllocator, NodeKind, SchemaHooks, SchemaNode, SchemaTree};
use crate::error::{Result, StructuraError};

/// Parse schema text into a [`SchemaTree`]. All-or-nothing: any error yields no tree.
pub fn parse_schema_text(text: &str) -> Result<SchemaTree> {
    let mut ids = IdAllocator::new();
    SchemaParser::new(text, &mut ids).parse_document()
}

struct SchemaParser<'i, 'a> {
    reader: Reader<&'i [u8]>,
    ids: &'a mut IdAllocator,
}

/// Attributes of one element, split into the ones a tag interprets and the rest.
struct ElementAttrs {
    tag: String,
    values: Vec<(String, String)>,
}

impl ElementAttrs {
    fn take(&mut self, key: &str) -> Option<String> {
        let pos = self.values.iter().position(|(k, _)| k == key)?;
        Some(self.values.remove(pos).1)
    }
}

impl<'i, 'a> SchemaParser<'i, 'a> {
    fn new(text: &'i str, ids: &'a mut IdAllocator) -> Self {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(false);
        Self { reader, ids }
    }

    fn syntax(&self, message: impl Into<String>) -> StructuraError {
        StructuraError::XmlSyntax {
            message: message.into(),
            position: self.reader.buffer_position() as u64,
        }
    }

    fn next_event(&mut self) -> Result<Event<'i>> {
        self.reader
            .read_event()
            .map_err(|e| self.syntax(e.to_string()))
    }

    fn parse_document(mut self) -> Result<SchemaTree> {
        let mut tree = None;
        loop {
            let (start, empty) = match self.next_event()? {
                Event::Start(e) => (e, false),
                Event::Empty(e) => (e, true),
                Event::Text(t) => {
                    if !is_blank(&t) {
                        return Err(self.syntax("text outside of the root element"));
                    }
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };
            if tree.is_some() {
                return Err(self.syntax("document has more than one root element"));
            }
            let attrs = self.attributes(&start)?;
            tree = Some(match attrs.tag.as_str() {
                "template" => self.parse_template(attrs, empty)?,
                "folder" => SchemaTree::from_root(self.parse_element(&start, attrs, empty)?),
                _ => {
                    // A lone file or control node still needs a folder to live in.
                    let root_id = self.ids.next_id();
                    let node = self.parse_element(&start, attrs, empty)?;
                    SchemaTree::from_root(SchemaNode::folder(root_id, "", vec![node]))
                }
            });
        }
        tree.ok_or_else(|| self.syntax("document has no root element"))
    }

    fn attributes(&self, start: &BytesStart<'_>) -> Result<ElementAttrs> {
        let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut values = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.syntax(format!("<{tag}>: {e}")))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| self.syntax(format!("<{tag} {key}>: {e}")))?
                .into_owned();
            values.push((key, value));
        }
        Ok(ElementAttrs { tag, values })
    }

    /// `<template extends="a, b">` wrapper: optional hooks plus content entries.
    fn parse_template(&mut self, mut attrs: ElementAttrs, empty: bool) -> Result<SchemaTree> {
        let extends: Vec<String> = attrs
            .take("extends")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        for (key, _) in &attrs.values {
            debug!(attribute = %key, "ignoring unknown attribute on <template>");
        }

        let root_id = self.ids.next_id();
        let mut hooks = SchemaHooks::default();
        let mut entries = Vec::new();
        if !empty {
            loop {
                let (start, child_empty) = match self.next_event()? {
                    Event::Start(e) => (e, false),
                    Event::Empty(e) => (e, true),
                    Event::End(_) => break,
                    Event::Text(t) => {
                        if !is_blank(&t) {
                            return Err(self.syntax("unexpected text inside <template>"));
                        }
                        continue;
                    }
                    Event::CData(_) => {
                        return Err(self.syntax("unexpected CDATA inside <template>"));
                    }
                    Event::Eof => return Err(self.syntax("<template> is not closed")),
                    _ => continue,
                };
                let child = self.attributes(&start)?;
                if child.tag == "hooks" {
                    if !child_empty {
                        hooks.post_create.extend(self.parse_hooks()?);
                    }
                } else {
                    entries.push(self.parse_element(&start, child, child_empty)?);
                }
            }
        }

        let root = match entries.as_slice() {
            // Same ids as the unwrapped form of this document.
            [only] if matches!(only.kind, NodeKind::Folder) && !only.name.is_empty() => {
                only.with_fresh_ids(&mut IdAllocator::new())
            }
            _ => SchemaNode::folder(root_id, "", entries),
        };
        Ok(SchemaTree::new(root, hooks, extends))
    }

    fn parse_hooks(&mut self) -> Result<Vec<String>> {
        let mut commands = Vec::new();
        loop {
            match self.next_event()? {
                Event::Start(e) => {
                    let attrs = self.attributes(&e)?;
                    if attrs.tag != "post-create" {
                        return Err(self.syntax(format!(
                            "<{}> is not allowed inside <hooks>",
                            attrs.tag
                        )));
                    }
                    let command = self.read_plain_text("post-create")?;
                    let command = command.trim();
                    if !command.is_empty() {
                        commands.push(command.to_string());
                    }
                }
                Event::Empty(e) => {
                    let attrs = self.attributes(&e)?;
                    if attrs.tag != "post-create" {
                        return Err(self.syntax(format!(
                            "<{}> is not allowed inside <hooks>",
                            attrs.tag
                        )));
                    }
                }
                Event::End(_) => return Ok(commands),
                Event::Text(t) if !is_blank(&t) => {
                    return Err(self.syntax("unexpected text inside <hooks>"));
                }
                Event::Eof => return Err(self.syntax("<hooks> is not closed")),
                _ => {}
            }
        }
    }

    fn parse_element(
        &mut self,
        start: &BytesStart<'i>,
        mut attrs: ElementAttrs,
        empty: bool,
    ) -> Result<SchemaNode> {
        let id = self.ids.next_id();
        let tag = attrs.tag.clone();
        let (name, kind) = match tag.as_str() {
            "folder" => (self.required_name(&mut attrs)?, NodeKind::Folder),
            "file" => {
                let name = self.required_name(&mut attrs)?;
                let url = attrs.take("url");
                let generate = attrs.take("generate").map(|g| GenerateKind::parse(&g));
                let source = self.parse_file_body(start, &name, url, generate, empty)?;
                let node = SchemaNode {
                    id,
                    name,
                    kind: NodeKind::File(source),
                    children: Vec::new(),
                    attributes: attrs.values,
                };
                return Ok(node);
            }
            "if" => {
                let condition_var = attrs
                    .take("var")
                    .map(|v| v.trim().trim_matches('%').to_string())
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| self.syntax("<if> requires a var attribute"))?;
                (String::new(), NodeKind::If { condition_var })
            }
            "else" => (String::new(), NodeKind::Else),
            "repeat" => {
                let count = attrs.take("count").unwrap_or_else(|| "1".to_string());
                let as_var = attrs.take("as").unwrap_or_else(|| "i".to_string());
                (String::new(), NodeKind::Repeat { count, as_var })
            }
            "template" | "hooks" | "post-create" => {
                return Err(self.syntax(format!("<{tag}> is only allowed at the document root")));
            }
            other => return Err(self.syntax(format!("unknown element <{other}>"))),
        };

        let children = if empty {
            Vec::new()
        } else {
            self.parse_children(&tag)?
        };
        Ok(SchemaNode {
            id,
            name,
            kind,
            children,
            attributes: attrs.values,
        })
    }

    fn required_name(&self, attrs: &mut ElementAttrs) -> Result<String> {
        match attrs.take("name") {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(self.syntax(format!("<{}> requires a name attribute", attrs.tag))),
        }
    }

    fn parse_children(&mut self, owner: &str) -> Result<Vec<SchemaNode>> {
        let mut children = Vec::new();
        loop {
            match self.next_event()? {
                Event::Start(e) => {
                    let attrs = self.attributes(&e)?;
                    children.push(self.parse_element(&e, attrs, false)?);
                }
                Event::Empty(e) => {
                    let attrs = self.attributes(&e)?;
                    children.push(self.parse_element(&e, attrs, true)?);
                }
                Event::End(_) => return Ok(children),
                Event::Text(t) => {
                    if !is_blank(&t) {
                        return Err(self.syntax(format!("unexpected text inside <{owner}>")));
                    }
                }
                Event::CData(_) => {
                    return Err(self.syntax(format!("unexpected CDATA inside <{owner}>")));
                }
                Event::Eof => return Err(self.syntax(format!("<{owner}> is not closed"))),
                _ => {}
            }
        }
    }

    fn parse_file_body(
        &mut self,
        start: &BytesStart<'i>,
        name: &str,
        url: Option<String>,
        generate: Option<GenerateKind>,
        empty: bool,
    ) -> Result<FileSource> {
        let mut source = FileSource {
            url,
            generate,
            ..Default::default()
        };
        if empty {
            return Ok(source);
        }
        if source.generate.is_some() {
            let inner = self
                .reader
                .read_text(start.name())
                .map_err(|e| self.syntax(e.to_string()))?;
            let (content, config) =
                split_generator_body(&inner).map_err(|message| self.syntax(message))?;
            source.content = Some(content.trim().to_string()).filter(|c| !c.is_empty());
            source.generate_config = Some(config).filter(|c| !c.is_empty());
        } else {
            let content = self.read_plain_text("file").map_err(|err| match err {
                StructuraError::XmlSyntax { message, position } => StructuraError::XmlSyntax {
                    message: format!("file '{name}': {message} (nested elements need a generate attribute)"),
                    position,
                },
                other => other,
            })?;
            source.content = Some(content);
        }
        Ok(source)
    }

    /// Text and CDATA up to the matching end tag. Nested elements are an error.
    fn read_plain_text(&mut self, owner: &str) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                Event::Text(t) => {
                    let unescaped = t.unescape().map_err(|e| self.syntax(e.to_string()))?;
                    text.push_str(&unescaped);
                }
                Event::CData(c) => text.push_str(&String::from_utf8_lossy(&c)),
                Event::Start(e) | Event::Empty(e) => {
                    let child = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    return Err(self.syntax(format!("<{child}> is not allowed inside <{owner}>")));
                }
                Event::End(_) => return Ok(text),
                Event::Eof => return Err(self.syntax(format!("<{owner}> is not closed"))),
                _ => {}
            }
        }
    }
}

fn is_blank(text: &[u8]) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

/// Split a generator file body into its direct text and its nested elements.
///
/// Elements are returned verbatim, one per line, so that generators can
/// re-parse them and export can write them back unchanged.
fn split_generator_body(inner: &str) -> std::result::Result<(String, String), String> {
    let mut reader = Reader::from_str(inner);
    reader.config_mut().trim_text(false);

    let mut content = String::new();
    let mut spans: Vec<&str> = Vec::new();
    let mut depth = 0usize;
    let mut span_start = 0usize;
    loop {
        let before = reader.buffer_position() as usize;
        let event = reader.read_event().map_err(|e| e.to_string())?;
        match event {
            Event::Start(_) => {
                if depth == 0 {
                    span_start = before;
                }
                depth += 1;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    spans.push(&inner[span_start..reader.buffer_position() as usize]);
                }
            }
            Event::Empty(_) if depth == 0 => {
                spans.push(&inner[before..reader.buffer_position() as usize]);
            }
            Event::Text(t) if depth == 0 => {
                content.push_str(&t.unescape().map_err(|e| e.to_string())?);
            }
            Event::CData(c) if depth == 0 => content.push_str(&String::from_utf8_lossy(&c)),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok((content, spans.join("\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::NodeId;

    #[test]
    fn parses_nested_folders_and_files_in_order() {
        let tree = parse_schema_text(
            r#"<folder name="app">
                 <folder name="src"><file name="main.rs">fn main() {}</file></folder>
                 <file name="README.md"/>
               </folder>"#,
        )
        .unwrap();

        assert_eq!(tree.root.name, "app");
        assert_eq!(tree.root.id, NodeId(0));
        let names: Vec<_> = tree.root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["src", "README.md"]);
        let main = &tree.root.children[0].children[0];
        assert_eq!(main.id, NodeId(2));
        match &main.kind {
            NodeKind::File(src) => assert_eq!(src.content.as_deref(), Some("fn main() {}")),
            other => panic!("expected file, got {other:?}"),
        }
        assert_eq!(tree.stats.folders, 2);
        assert_eq!(tree.stats.files, 2);
    }

    #[test]
    fn self_closing_file_has_no_content_but_empty_pair_does() {
        let tree =
            parse_schema_text(r#"<folder name="a"><file name="x"/><file name="y"></file></folder>"#)
                .unwrap();
        let content = |i: usize| match &tree.root.children[i].kind {
            NodeKind::File(src) => src.content.clone(),
            _ => unreachable!(),
        };
        assert_eq!(content(0), None);
        assert_eq!(content(1), Some(String::new()));
    }

    #[test]
    fn control_nodes_and_defaults() {
        let tree = parse_schema_text(
            r#"<folder name="a">
                 <if var="%DOCS%"><file name="d.md"/></if>
                 <else><file name="none.md"/></else>
                 <repeat><file name="f"/></repeat>
               </folder>"#,
        )
        .unwrap();
        let kinds: Vec<_> = tree.root.children.iter().map(|c| c.kind.clone()).collect();
        assert_eq!(
            kinds[0],
            NodeKind::If {
                condition_var: "DOCS".into()
            }
        );
        assert_eq!(kinds[1], NodeKind::Else);
        assert_eq!(
            kinds[2],
            NodeKind::Repeat {
                count: "1".into(),
                as_var: "i".into()
            }
        );
    }

    #[test]
    fn unknown_element_is_fatal() {
        let err = parse_schema_text(r#"<folder name="a"><directory name="b"/></folder>"#)
            .unwrap_err();
        assert!(matches!(err, StructuraError::XmlSyntax { ref message, .. } if message.contains("directory")));
    }

    #[test]
    fn mismatched_tags_are_fatal() {
        let err = parse_schema_text(r#"<folder name="a"><file name="b"></folder>"#).unwrap_err();
        assert!(matches!(err, StructuraError::XmlSyntax { .. }));
    }

    #[test]
    fn missing_name_is_fatal() {
        let err = parse_schema_text(r#"<folder><file name="b"/></folder>"#).unwrap_err();
        assert!(matches!(err, StructuraError::XmlSyntax { ref message, .. } if message.contains("name")));
    }

    #[test]
    fn multiple_roots_are_fatal() {
        let err = parse_schema_text(r#"<folder name="a"/><folder name="b"/>"#).unwrap_err();
        assert!(matches!(err, StructuraError::XmlSyntax { .. }));
    }

    #[test]
    fn nested_element_in_plain_file_is_fatal() {
        let err = parse_schema_text(r#"<folder name="a"><file name="b"><x/></file></folder>"#)
            .unwrap_err();
        assert!(matches!(err, StructuraError::XmlSyntax { ref message, .. } if message.contains("generate")));
    }

    #[test]
    fn generator_body_splits_content_and_config() {
        let tree = parse_schema_text(
            r#"<folder name="a">
                 <file name="app.db" generate="sqlite">
                   <table name="users"><column name="id" type="INTEGER" primary-key="true"/></table>
                   INSERT INTO users (id) VALUES (1);
                 </file>
               </folder>"#,
        )
        .unwrap();
        let NodeKind::File(src) = &tree.root.children[0].kind else {
            panic!("expected file");
        };
        assert_eq!(src.generate, Some(GenerateKind::Database));
        assert_eq!(
            src.content.as_deref(),
            Some("INSERT INTO users (id) VALUES (1);")
        );
        let config = src.generate_config.as_deref().unwrap();
        assert!(config.starts_with("<table name=\"users\">"));
        assert!(config.ends_with("</table>"));
    }

    #[test]
    fn template_wrapper_with_hooks_and_extends() {
        let tree = parse_schema_text(
            r#"<?xml version="1.0"?>
               <!-- project -->
               <template extends="base, licensing">
                 <hooks>
                   <post-create>git init</post-create>
                   <post-create>npm install</post-create>
                 </hooks>
                 <folder name="app"><file name="a.txt"/></folder>
               </template>"#,
        )
        .unwrap();
        assert_eq!(tree.extends, ["base", "licensing"]);
        assert_eq!(tree.hooks.post_create, ["git init", "npm install"]);
        assert_eq!(tree.root.name, "app");
    }

    #[test]
    fn template_wrapper_with_several_entries_has_anonymous_root() {
        let tree =
            parse_schema_text(r#"<template><file name="a"/><folder name="b"/></template>"#)
                .unwrap();
        assert!(tree.root.is_anonymous_folder());
        assert_eq!(tree.root.children.len(), 2);
    }

    #[test]
    fn unknown_attributes_are_preserved_in_order() {
        let tree = parse_schema_text(
            r#"<folder name="a"><file name="i.png" generate="image" width="10" height="20"/></folder>"#,
        )
        .unwrap();
        assert_eq!(
            tree.root.children[0].attributes,
            vec![
                ("width".to_string(), "10".to_string()),
                ("height".to_string(), "20".to_string())
            ]
        );
    }

    #[test]
    fn cdata_and_entities_become_content() {
        let tree = parse_schema_text(
            "<folder name=\"a\"><file name=\"b\">x &lt; y<![CDATA[ <raw> ]]></file></folder>",
        )
        .unwrap();
        let NodeKind::File(src) = &tree.root.children[0].kind else {
            panic!("expected file");
        };
        assert_eq!(src.content.as_deref(), Some("x < y <raw> "));
    }
}
