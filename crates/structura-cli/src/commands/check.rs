use console::style;
use miette::{IntoDiagnostic, Result};

use structura_core::check::ValidationIssue;
use structura_core::config::load_engine_config;
use structura_core::validate_schema_text;

use super::{load_templates, parse_data, read_schema};

pub fn run(schema: String, data: Vec<String>, templates: Option<String>, json: bool) -> Result<()> {
    let text = read_schema(&schema)?;
    let config = load_engine_config()?;
    let templates = load_templates(templates.as_deref())?;
    let variables = parse_data(data);

    let result = validate_schema_text(&text, &variables, templates.as_ref(), &config.expand);

    if json {
        let out = serde_json::to_string_pretty(&result).into_diagnostic()?;
        println!("{out}");
        if !result.is_valid {
            std::process::exit(1);
        }
        return Ok(());
    }

    println!(
        "{} {}",
        style("Checking schema at").bold(),
        style(&schema).cyan()
    );

    if !result.warnings.is_empty() {
        println!("\n{}", style("Warnings:").yellow().bold());
        for w in &result.warnings {
            println!("  {} {}", style("⚠").yellow(), describe(w));
        }
    }

    if !result.errors.is_empty() {
        println!("\n{}", style("Errors:").red().bold());
        for e in &result.errors {
            println!("  {} {}", style("✗").red(), describe(e));
        }
        println!(
            "\n{} Schema has {} error(s)",
            style("✗").red().bold(),
            result.errors.len()
        );
        std::process::exit(1);
    } else {
        println!("\n{} Schema is valid!", style("✓").green().bold());
    }

    Ok(())
}

fn describe(issue: &ValidationIssue) -> String {
    match &issue.node_path {
        Some(path) => format!("{} {}", issue.message, style(format!("({path})")).dim()),
        None => issue.message.clone(),
    }
}
