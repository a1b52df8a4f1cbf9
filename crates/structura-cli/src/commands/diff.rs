use std::path::PathBuf;

use console::style;
use miette::{IntoDiagnostic, Result};

use structura_core::config::load_engine_config;
use structura_core::diff::{DiffAction, DiffLineType, DiffNode, DiffNodeType};
use structura_core::{generate_diff_preview, PlanRequest, SchemaInput};

use super::{load_templates, parse_data, read_schema};

pub struct DiffArgs {
    pub schema: String,
    pub output: String,
    pub data: Vec<String>,
    pub templates: Option<String>,
    pub project_name: Option<String>,
    pub overwrite: bool,
    pub hunks: bool,
    pub json: bool,
}

pub fn run(args: DiffArgs) -> Result<()> {
    let schema_text = read_schema(&args.schema)?;
    let config = load_engine_config()?;
    let templates = load_templates(args.templates.as_deref())?;
    let variables = parse_data(args.data);
    let output = PathBuf::from(&args.output);

    let request = PlanRequest {
        schema: SchemaInput::Text(&schema_text),
        variables: &variables,
        project_name: args.project_name.as_deref(),
        templates: templates.as_ref(),
        config: &config,
    };
    let diff = generate_diff_preview(&request, &output, args.overwrite)?;

    if args.json {
        let json = serde_json::to_string_pretty(&diff).into_diagnostic()?;
        println!("{json}");
        return Ok(());
    }

    println!(
        "{} {}",
        style("Comparing schema against").bold(),
        style(output.display()).cyan()
    );
    if diff.root.name.is_empty() {
        for child in diff.root.children.iter().flatten() {
            print_node(child, 1, args.hunks);
        }
    } else {
        print_node(&diff.root, 1, args.hunks);
    }

    let s = &diff.summary;
    if !s.warnings.is_empty() {
        println!("\n{}", style("Warnings:").yellow().bold());
        for w in &s.warnings {
            println!("  {} {}", style("⚠").yellow(), w);
        }
    }
    println!(
        "\nSummary: {} item(s): {} create, {} overwrite, {} skip, {} unchanged folder(s)",
        s.total_items, s.creates, s.overwrites, s.skips, s.unchanged_folders
    );
    Ok(())
}

fn print_node(node: &DiffNode, depth: usize, show_hunks: bool) {
    let indent = "  ".repeat(depth);
    let marker = match node.action {
        DiffAction::Create => style("+").green(),
        DiffAction::Overwrite => style("~").yellow(),
        DiffAction::Skip => style("-").dim(),
        DiffAction::Unchanged => style("=").dim(),
    };
    let name = match node.node_type {
        DiffNodeType::Folder => format!("{}/", node.name),
        DiffNodeType::File => node.name.clone(),
    };
    let note = match (&node.url, node.is_binary) {
        (Some(url), _) => format!(" {}", style(format!("<- {url}")).dim()),
        (None, true) => format!(" {}", style("[binary]").dim()),
        (None, false) => String::new(),
    };
    println!("{indent}{marker} {name}{note}");

    if show_hunks {
        for hunk in node.diff_hunks.iter().flatten() {
            println!(
                "{indent}    {}",
                style(format!(
                    "@@ -{},{} +{},{} @@",
                    hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
                ))
                .cyan()
            );
            for line in &hunk.lines {
                let text = match line.line_type {
                    DiffLineType::Add => style(format!("+{}", line.content)).green(),
                    DiffLineType::Remove => style(format!("-{}", line.content)).red(),
                    DiffLineType::Context => style(format!(" {}", line.content)),
                    DiffLineType::Truncated => style(line.content.clone()).dim(),
                };
                println!("{indent}    {text}");
            }
        }
    }

    for child in node.children.iter().flatten() {
        print_node(child, depth + 1, show_hunks);
    }
}
