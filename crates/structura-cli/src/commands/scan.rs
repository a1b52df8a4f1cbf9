use std::path::Path;

use console::style;
use miette::{IntoDiagnostic, Result, WrapErr};

use structura_core::config::load_engine_config;
use structura_core::{export_schema_text, scan_path};

pub fn run(path: String, output: Option<String>) -> Result<()> {
    let config = load_engine_config()?;
    let tree = scan_path(Path::new(&path), &config.scan)?;
    let xml = export_schema_text(&tree);

    match output {
        Some(out) => {
            std::fs::write(&out, xml)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to write {out}"))?;
            eprintln!(
                "{} Schema for {} written to {}",
                style("✓").green().bold(),
                style(&path).cyan(),
                style(&out).cyan()
            );
        }
        None => print!("{xml}"),
    }
    Ok(())
}
