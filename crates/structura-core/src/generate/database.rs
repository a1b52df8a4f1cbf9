use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rusqlite::Connection;

use super::GenerateError;
use crate::render::ConcreteFile;

/// Build a fresh SQLite database at `path`.
///
/// Any existing file is replaced. Tables declared in the config are created
/// first, then `<sql>` blocks run in order, then the file's own text.
pub fn generate_database(file: &ConcreteFile, path: &Path) -> Result<(), GenerateError> {
    let sql = database_sql(file)?;

    if path.exists() {
        std::fs::remove_file(path).map_err(|e| GenerateError::Io {
            context: format!("removing existing database {}", path.display()),
            source: e,
        })?;
    }

    let conn = Connection::open(path)?;
    if !sql.trim().is_empty() {
        conn.execute_batch(&sql)?;
    }
    Ok(())
}

/// The SQL a database file would be built from.
pub fn database_sql(file: &ConcreteFile) -> Result<String, GenerateError> {
    let mut sql = String::new();
    if let Some(config) = &file.source.generate_config {
        for statement in config_statements(config)? {
            sql.push_str(&statement);
            sql.push('\n');
        }
    }
    if let Some(content) = &file.source.content {
        let content = content.trim();
        if !content.is_empty() {
            sql.push_str(content);
            sql.push('\n');
        }
    }
    Ok(sql)
}

#[derive(Default)]
struct TableDef {
    name: String,
    columns: Vec<String>,
}

impl TableDef {
    fn into_sql(self) -> Option<String> {
        if self.columns.is_empty() {
            return None;
        }
        Some(format!(
            "CREATE TABLE {} (\n  {}\n);",
            self.name,
            self.columns.join(",\n  ")
        ))
    }
}

fn config_statements(config: &str) -> Result<Vec<String>, GenerateError> {
    let mut reader = Reader::from_str(config);
    reader.config_mut().trim_text(true);

    let mut statements = Vec::new();
    let mut table: Option<TableDef> = None;
    let mut sql_block: Option<String> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| GenerateError::Config(e.to_string()))?;
        match event {
            // A self-closing <table/> declares no columns and emits nothing.
            Event::Empty(e) if e.name().as_ref() == b"table" => {}
            Event::Start(e) if e.name().as_ref() == b"table" => {
                let attrs = attributes(&e)?;
                let name = lookup(&attrs, "name")
                    .ok_or_else(|| GenerateError::Config("<table> requires a name".into()))?;
                table = Some(TableDef {
                    name: name.to_string(),
                    columns: Vec::new(),
                });
            }
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"column" => {
                let attrs = attributes(&e)?;
                match table.as_mut() {
                    Some(table) => table.columns.push(column_sql(&attrs)?),
                    None => {
                        return Err(GenerateError::Config(
                            "<column> must be inside a <table>".into(),
                        ))
                    }
                }
            }
            Event::Start(e) if e.name().as_ref() == b"sql" => sql_block = Some(String::new()),
            Event::Text(t) => {
                if let Some(block) = sql_block.as_mut() {
                    let text = t.unescape().map_err(|e| GenerateError::Config(e.to_string()))?;
                    block.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(block) = sql_block.as_mut() {
                    block.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(e) if e.name().as_ref() == b"sql" => {
                if let Some(block) = sql_block.take() {
                    let block = block.trim();
                    if !block.is_empty() {
                        statements.push(block.to_string());
                    }
                }
            }
            Event::End(e) if e.name().as_ref() == b"table" => {
                statements.extend(table.take().and_then(TableDef::into_sql));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(statements)
}

fn attributes(start: &BytesStart<'_>) -> Result<Vec<(String, String)>, GenerateError> {
    start
        .attributes()
        .map(|attr| {
            let attr = attr.map_err(|e| GenerateError::Config(e.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|e| GenerateError::Config(e.to_string()))?;
            Ok((
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                value.into_owned(),
            ))
        })
        .collect()
}

fn lookup<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn flag(attrs: &[(String, String)], key: &str) -> bool {
    lookup(attrs, key).is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

fn column_sql(attrs: &[(String, String)]) -> Result<String, GenerateError> {
    let name = lookup(attrs, "name")
        .ok_or_else(|| GenerateError::Config("<column> requires a name".into()))?;
    let mut def = format!("{name} {}", lookup(attrs, "type").unwrap_or("TEXT"));
    if flag(attrs, "primary-key") {
        def.push_str(" PRIMARY KEY");
    }
    if flag(attrs, "unique") {
        def.push_str(" UNIQUE");
    }
    if flag(attrs, "not-null") {
        def.push_str(" NOT NULL");
    }
    if let Some(default) = lookup(attrs, "default") {
        def.push_str(&format!(" DEFAULT '{}'", default.replace('\'', "''")));
    }
    Ok(def)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FileSource, GenerateKind};

    fn db_file(config: Option<&str>, content: Option<&str>) -> ConcreteFile {
        ConcreteFile {
            source: FileSource {
                generate: Some(GenerateKind::Database),
                generate_config: config.map(String::from),
                content: content.map(String::from),
                ..Default::default()
            },
            attributes: vec![],
        }
    }

    fn table_names(path: &Path) -> Vec<String> {
        let conn = Connection::open(path).unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn declarative_tables_become_create_statements() {
        let file = db_file(
            Some(
                r#"<table name="users">
  <column name="id" type="INTEGER" primary-key="true"/>
  <column name="email" not-null="true" unique="true"/>
  <column name="role" default="it's"/>
</table>"#,
            ),
            None,
        );
        let sql = database_sql(&file).unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE users (\n  id INTEGER PRIMARY KEY,\n  email TEXT UNIQUE NOT NULL,\n  role TEXT DEFAULT 'it''s'\n);\n"
        );
    }

    #[test]
    fn config_then_content_are_executed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("app.db");
        let file = db_file(
            Some(
                "<table name=\"users\"><column name=\"id\" type=\"INTEGER\"/></table>\n<sql><![CDATA[CREATE TABLE settings (k TEXT, v TEXT);]]></sql>",
            ),
            Some("INSERT INTO settings VALUES ('a', 'b');"),
        );
        generate_database(&file, &path).unwrap();
        assert_eq!(table_names(&path), ["settings", "users"]);

        let conn = Connection::open(&path).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn existing_database_is_replaced() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("app.db");
        generate_database(&db_file(None, Some("CREATE TABLE old (x);")), &path).unwrap();
        generate_database(&db_file(None, Some("CREATE TABLE fresh (x);")), &path).unwrap();
        assert_eq!(table_names(&path), ["fresh"]);
    }

    #[test]
    fn empty_definition_creates_empty_database() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.db");
        generate_database(&db_file(Some("<table name=\"t\"/>"), None), &path).unwrap();
        assert!(path.exists());
        assert!(table_names(&path).is_empty());
    }

    #[test]
    fn bad_sql_is_a_database_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = generate_database(&db_file(None, Some("CREATE NONSENSE")), &tmp.path().join("x.db"))
            .unwrap_err();
        assert!(matches!(err, GenerateError::Database(_)));
    }

    #[test]
    fn column_outside_table_is_a_config_error() {
        let err = database_sql(&db_file(Some(r#"<column name="x"/>"#), None)).unwrap_err();
        assert!(matches!(err, GenerateError::Config(_)));
    }
}
