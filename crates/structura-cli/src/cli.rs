use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "structura",
    about = "Turn declarative directory schemas into previewable filesystem plans",
    version
)]
pub struct Cli {
    /// Print debug logs to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the structure a schema describes
    Create {
        /// Path to the XML schema
        schema: String,

        /// Directory to create the structure in
        #[arg(short, long, default_value = ".")]
        output: String,

        /// Set variable values (can be repeated: -d key=value)
        #[arg(short, long = "data", value_name = "KEY=VALUE")]
        data: Vec<String>,

        /// Directory of base templates for `extends`
        #[arg(short, long)]
        templates: Option<String>,

        /// Value for %PROJECT_NAME%
        #[arg(long)]
        project_name: Option<String>,

        /// Log what would happen without touching the filesystem
        #[arg(long)]
        dry_run: bool,

        /// Replace files that already exist
        #[arg(long)]
        overwrite: bool,

        /// Never prompt for missing variables
        #[arg(long)]
        no_prompt: bool,

        /// Record created paths to this file so `undo` can remove them
        #[arg(long, value_name = "FILE")]
        manifest: Option<String>,
    },

    /// Show what `create` would change in an existing directory
    Diff {
        /// Path to the XML schema
        schema: String,

        /// Directory to compare against
        #[arg(short, long, default_value = ".")]
        output: String,

        /// Set variable values (can be repeated: -d key=value)
        #[arg(short, long = "data", value_name = "KEY=VALUE")]
        data: Vec<String>,

        /// Directory of base templates for `extends`
        #[arg(short, long)]
        templates: Option<String>,

        /// Value for %PROJECT_NAME%
        #[arg(long)]
        project_name: Option<String>,

        /// Compare as if existing files would be replaced
        #[arg(long)]
        overwrite: bool,

        /// Print line hunks for files that would be overwritten
        #[arg(long)]
        hunks: bool,

        /// Print the diff as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a schema
    Check {
        /// Path to the XML schema
        schema: String,

        /// Variables to treat as defined (can be repeated: -d key=value)
        #[arg(short, long = "data", value_name = "KEY=VALUE")]
        data: Vec<String>,

        /// Directory of base templates for `extends`
        #[arg(short, long)]
        templates: Option<String>,

        /// Print the validation result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mirror a directory or zip archive as a schema
    Scan {
        /// Directory or .zip archive to scan
        path: String,

        /// Write the schema to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Remove what a previous `create --manifest` run created
    Undo {
        /// Manifest written by `create --manifest`
        manifest: String,

        /// Show what would be removed without deleting anything
        #[arg(long)]
        dry_run: bool,
    },
}
