use std::path::Path;

use console::style;
use miette::{miette, Result};

use structura_core::apply::load_manifest;
use structura_core::undo_structure;

use super::print_log;

pub fn run(manifest: String, dry_run: bool) -> Result<()> {
    let items = load_manifest(Path::new(&manifest))?;
    println!(
        "{} {} ({} item(s))",
        style(if dry_run { "Would undo" } else { "Undoing" }).bold(),
        style(&manifest).cyan(),
        items.len()
    );

    let result = undo_structure(&items, dry_run);
    for entry in &result.logs {
        print_log(entry);
    }

    let s = &result.summary;
    println!(
        "\nSummary: {} file(s), {} folder(s) removed, {} skipped",
        s.files_deleted, s.folders_deleted, s.items_skipped
    );
    if s.errors > 0 {
        return Err(miette!("{} item(s) could not be removed", s.errors));
    }
    Ok(())
}
