pub mod apply;
pub mod check;
pub mod compose;
pub mod config;
pub mod diff;
pub mod error;
pub mod generate;
pub mod hooks;
pub mod lock;
pub mod render;
pub mod schema;
pub mod text;
pub mod transform;

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::apply::{ApplyContext, CreateOptions, CreateResult, Fetch};
use crate::compose::{resolve_inheritance, InheritanceResolution, TemplateLookup};
use crate::config::{EngineConfig, ScanConfig};
use crate::diff::{diff_tree, DiffResult};
use crate::error::{Result, StructuraError};
use crate::render::{expand, Bindings, ConcreteTree};
use crate::schema::SchemaTree;

pub use crate::apply::undo_structure;
pub use crate::check::{extract_variables, validate_schema, validate_schema_text};
pub use crate::schema::{export_schema_text, parse_schema_text as parse_schema};

/// Where the schema for a run comes from.
#[derive(Debug, Clone, Copy)]
pub enum SchemaInput<'a> {
    Text(&'a str),
    Tree(&'a SchemaTree),
}

/// Everything needed to turn a schema into a concrete plan.
pub struct PlanRequest<'a> {
    pub schema: SchemaInput<'a>,
    /// Caller values. These win over base template defaults and built-ins.
    pub variables: &'a BTreeMap<String, String>,
    /// Bound as `PROJECT_NAME` unless the caller binds it.
    pub project_name: Option<&'a str>,
    pub templates: &'a dyn TemplateLookup,
    pub config: &'a EngineConfig,
}

/// A schema fully resolved, with the bindings it was expanded against.
pub struct Plan {
    pub tree: ConcreteTree,
    pub bindings: Bindings,
    pub resolution: InheritanceResolution,
}

/// Parse schema text and merge in every base template it extends.
pub fn parse_schema_with_inheritance(
    text: &str,
    templates: &dyn TemplateLookup,
) -> Result<InheritanceResolution> {
    let tree = schema::parse_schema_text(text)?;
    resolve_inheritance(&tree, templates)
}

/// Resolve inheritance, bind variables and expand control nodes.
pub fn plan(request: &PlanRequest<'_>) -> Result<Plan> {
    let resolution = match request.schema {
        SchemaInput::Text(text) => parse_schema_with_inheritance(text, request.templates)?,
        SchemaInput::Tree(tree) => resolve_inheritance(tree, request.templates)?,
    };

    let mut values = resolution.variables.clone();
    values.extend(
        request
            .variables
            .iter()
            .map(|(k, v)| (k.trim().trim_matches('%').to_string(), v.clone())),
    );
    let bindings = Bindings::from_map(&values, chrono::Local::now().date_naive())
        .with_builtins(request.project_name);

    let tree = expand(&resolution.tree, &bindings, &request.config.expand);
    info!(
        bases = resolution.base_templates.len(),
        warnings = tree.warnings.len(),
        "schema planned"
    );
    Ok(Plan {
        tree,
        bindings,
        resolution,
    })
}

/// Compare the planned structure with what already exists under `output`.
pub fn generate_diff_preview(
    request: &PlanRequest<'_>,
    output: &Path,
    overwrite: bool,
) -> Result<DiffResult> {
    let plan = plan(request)?;
    Ok(diff_tree(&plan.tree, output, overwrite, &request.config.diff))
}

/// Plan and apply a schema under `output`.
///
/// Only parse and inheritance failures are returned as errors; everything
/// that goes wrong for an individual node is in the result's logs.
pub fn create_structure(
    request: &PlanRequest<'_>,
    output: &Path,
    options: &CreateOptions,
    fetcher: &dyn Fetch,
) -> Result<CreateResult> {
    let plan = plan(request)?;
    let ctx = ApplyContext {
        bindings: &plan.bindings,
        fetcher,
        config: request.config,
    };
    Ok(apply::apply(&plan.tree, output, options, &ctx))
}

/// Mirror a directory, or a `.zip` archive, as a schema tree.
pub fn scan_path(path: &Path, config: &ScanConfig) -> Result<SchemaTree> {
    let is_zip = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
    if !is_zip {
        return schema::scan_folder(path, config);
    }
    let bytes = std::fs::read(path).map_err(|e| StructuraError::Io {
        context: format!("reading archive {}", path.display()),
        source: e,
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    schema::scan_archive(&bytes, &name, config)
}
