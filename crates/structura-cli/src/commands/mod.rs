pub mod check;
pub mod create;
pub mod diff;
pub mod scan;
pub mod undo;

use std::collections::BTreeMap;
use std::path::Path;

use console::style;
use miette::{IntoDiagnostic, Result, WrapErr};

use structura_core::apply::{LogEntry, LogLevel};
use structura_core::compose::{NoTemplates, TemplateLibrary, TemplateLookup};

/// Parse repeated `-d KEY=VALUE` flags. Entries without `=` are ignored.
pub fn parse_data(data: Vec<String>) -> BTreeMap<String, String> {
    data.into_iter()
        .filter_map(|kv| {
            let mut parts = kv.splitn(2, '=');
            let key = parts.next()?.trim().trim_matches('%').to_string();
            let value = parts.next()?.to_string();
            Some((key, value))
        })
        .collect()
}

pub fn read_schema(path: &str) -> Result<String> {
    std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read schema {path}"))
}

/// The base template library in `dir`, or an empty lookup when none is given.
pub fn load_templates(dir: Option<&str>) -> Result<Box<dyn TemplateLookup>> {
    match dir {
        Some(dir) => {
            let library = TemplateLibrary::from_dir(Path::new(dir))?;
            tracing::debug!(count = library.names().count(), "template library loaded");
            Ok(Box::new(library))
        }
        None => Ok(Box::new(NoTemplates)),
    }
}

pub fn print_log(entry: &LogEntry) {
    let marker = match entry.log_type {
        LogLevel::Success => style("✓").green(),
        LogLevel::Warning => style("⚠").yellow(),
        LogLevel::Error => style("✗").red(),
        LogLevel::Info => style("·").dim(),
    };
    println!("  {} {}", marker, entry.message);
    if let Some(details) = &entry.details {
        for line in details.lines() {
            println!("      {}", style(line).dim());
        }
    }
}
