use std::path::PathBuf;

use console::style;
use miette::{miette, IntoDiagnostic, Result, WrapErr};

use structura_core::apply::{save_manifest, CreateOptions, HttpFetcher, ResultSummary};
use structura_core::config::load_engine_config;
use structura_core::lock::lock_target;
use structura_core::{create_structure, PlanRequest, SchemaInput};

use super::{load_templates, parse_data, print_log, read_schema};
use crate::prompt::collect_variables;

pub struct CreateArgs {
    pub schema: String,
    pub output: String,
    pub data: Vec<String>,
    pub templates: Option<String>,
    pub project_name: Option<String>,
    pub dry_run: bool,
    pub overwrite: bool,
    pub no_prompt: bool,
    pub manifest: Option<String>,
}

pub fn run(args: CreateArgs) -> Result<()> {
    let schema_text = read_schema(&args.schema)?;
    let config = load_engine_config()?;
    let templates = load_templates(args.templates.as_deref())?;
    let variables = collect_variables(
        &schema_text,
        templates.as_ref(),
        parse_data(args.data),
        args.no_prompt,
    )?;

    let output = PathBuf::from(&args.output);
    let _lock = if args.dry_run {
        None
    } else {
        std::fs::create_dir_all(&output)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to create {}", output.display()))?;
        Some(lock_target(&output)?)
    };

    let fetcher = HttpFetcher::new(&config.download)
        .map_err(|e| miette!("Failed to set up downloads: {e}"))?;

    let request = PlanRequest {
        schema: SchemaInput::Text(&schema_text),
        variables: &variables,
        project_name: args.project_name.as_deref(),
        templates: templates.as_ref(),
        config: &config,
    };
    let options = CreateOptions {
        dry_run: args.dry_run,
        overwrite: args.overwrite,
        cancel: None,
    };

    println!(
        "{} {}",
        style(if args.dry_run {
            "Dry run for"
        } else {
            "Creating structure in"
        })
        .bold(),
        style(output.display()).cyan()
    );

    let result = create_structure(&request, &output, &options, &fetcher)?;
    for entry in &result.logs {
        print_log(entry);
    }
    print_summary(&result.summary, args.dry_run);

    if let Some(manifest) = args.manifest.filter(|_| !args.dry_run) {
        let path = PathBuf::from(manifest);
        save_manifest(&path, &result.created_items)?;
        println!(
            "  Manifest written to {}",
            style(path.display()).cyan()
        );
    }

    if result.summary.errors > 0 || result.summary.hooks_failed > 0 {
        return Err(miette!(
            "{} item(s) failed, {} hook(s) failed",
            result.summary.errors,
            result.summary.hooks_failed
        ));
    }
    Ok(())
}

fn print_summary(summary: &ResultSummary, dry_run: bool) {
    let verb = if dry_run { "would be created" } else { "created" };
    println!(
        "\n{} {} folder(s), {} file(s) {verb}",
        style("==>").cyan().bold(),
        summary.folders_created,
        summary.files_created + summary.files_downloaded + summary.files_generated,
    );
    if summary.files_downloaded + summary.files_generated > 0 {
        println!(
            "    {} downloaded, {} generated",
            summary.files_downloaded, summary.files_generated
        );
    }
    if summary.skipped > 0 {
        println!("    {} skipped", summary.skipped);
    }
    if summary.hooks_executed + summary.hooks_failed > 0 {
        println!(
            "    {} hook(s) run, {} failed",
            summary.hooks_executed, summary.hooks_failed
        );
    }
    if summary.errors == 0 {
        println!("{} Done", style("✓").green().bold());
    } else {
        println!(
            "{} {} error(s)",
            style("✗").red().bold(),
            summary.errors
        );
    }
}
