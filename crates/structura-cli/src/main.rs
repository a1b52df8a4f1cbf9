mod cli;
mod commands;
mod prompt;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Create {
            schema,
            output,
            data,
            templates,
            project_name,
            dry_run,
            overwrite,
            no_prompt,
            manifest,
        } => commands::create::run(commands::create::CreateArgs {
            schema,
            output,
            data,
            templates,
            project_name,
            dry_run,
            overwrite,
            no_prompt,
            manifest,
        }),
        Commands::Diff {
            schema,
            output,
            data,
            templates,
            project_name,
            overwrite,
            hunks,
            json,
        } => commands::diff::run(commands::diff::DiffArgs {
            schema,
            output,
            data,
            templates,
            project_name,
            overwrite,
            hunks,
            json,
        }),
        Commands::Check {
            schema,
            data,
            templates,
            json,
        } => commands::check::run(schema, data, templates, json),
        Commands::Scan { path, output } => commands::scan::run(path, output),
        Commands::Undo { manifest, dry_run } => commands::undo::run(manifest, dry_run),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
