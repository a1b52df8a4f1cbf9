pub mod overlay;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::{TemplateVariables, ValidationRule};
use crate::error::{Result, StructuraError};
use crate::schema::{parse_schema_text, SchemaHooks, SchemaNode, SchemaTree};

use self::overlay::{overlay_entries, root_from_entries, top_level_entries};

/// Longest allowed chain of bases, counted from the schema being resolved.
pub const MAX_INHERITANCE_DEPTH: usize = 16;

/// A named base schema together with its variable defaults and rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseTemplate {
    pub schema: String,
    pub variables: BTreeMap<String, String>,
    pub validation: BTreeMap<String, ValidationRule>,
}

impl BaseTemplate {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            ..Default::default()
        }
    }
}

/// Source of base templates by name.
pub trait TemplateLookup {
    fn lookup(&self, name: &str) -> Option<BaseTemplate>;
}

impl<F> TemplateLookup for F
where
    F: Fn(&str) -> Option<BaseTemplate>,
{
    fn lookup(&self, name: &str) -> Option<BaseTemplate> {
        self(name)
    }
}

/// A lookup that never finds anything, for schemas without bases.
pub struct NoTemplates;

impl TemplateLookup for NoTemplates {
    fn lookup(&self, _name: &str) -> Option<BaseTemplate> {
        None
    }
}

/// In-memory set of named base templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    templates: BTreeMap<String, BaseTemplate>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, template: BaseTemplate) {
        self.templates.insert(name.into(), template);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Load every `<name>.xml` in `dir`, with defaults and rules from an
    /// optional sibling `<name>.toml`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(StructuraError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }
        let mut library = Self::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let is_xml = path.extension().and_then(|e| e.to_str()) == Some("xml");
            if !entry.file_type().is_file() || !is_xml {
                continue;
            }
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let schema = std::fs::read_to_string(path).map_err(|e| StructuraError::Io {
                context: format!("reading template {}", path.display()),
                source: e,
            })?;

            let sidecar = path.with_extension("toml");
            let meta = if sidecar.exists() {
                let content =
                    std::fs::read_to_string(&sidecar).map_err(|e| StructuraError::Io {
                        context: format!("reading {}", sidecar.display()),
                        source: e,
                    })?;
                toml::from_str::<TemplateVariables>(&content).map_err(|e| {
                    StructuraError::ConfigParse {
                        path: sidecar.clone(),
                        source: e,
                    }
                })?
            } else {
                TemplateVariables::default()
            };

            debug!(template = %name, "loaded library template");
            library.insert(
                name,
                BaseTemplate {
                    schema,
                    variables: meta.variables,
                    validation: meta.validation,
                },
            );
        }
        Ok(library)
    }
}

impl TemplateLookup for TemplateLibrary {
    fn lookup(&self, name: &str) -> Option<BaseTemplate> {
        self.templates.get(name).cloned()
    }
}

/// A schema with all of its bases merged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InheritanceResolution {
    pub tree: SchemaTree,
    /// Base defaults, more specific templates winning.
    pub variables: BTreeMap<String, String>,
    pub validation: BTreeMap<String, ValidationRule>,
    /// Bases in the order they were applied, base-most first.
    pub base_templates: Vec<String>,
}

struct Level {
    tree: SchemaTree,
    variables: BTreeMap<String, String>,
    validation: BTreeMap<String, ValidationRule>,
}

/// Resolve the `extends` chain of `tree` against `lookup`.
///
/// Bases are applied base-most first; each level's entries override the
/// accumulated result (see [`overlay_entries`]). A base reached twice through
/// different branches is applied once.
pub fn resolve_inheritance(
    tree: &SchemaTree,
    lookup: &dyn TemplateLookup,
) -> Result<InheritanceResolution> {
    let mut levels = Vec::new();
    let mut applied = Vec::new();
    collect_bases(tree, lookup, Vec::new(), &mut levels, &mut applied)?;

    let mut entries: Vec<SchemaNode> = Vec::new();
    let mut hooks = SchemaHooks::default();
    let mut variables = BTreeMap::new();
    let mut validation = BTreeMap::new();
    for level in levels {
        overlay_entries(&mut entries, top_level_entries(&level.tree));
        hooks.post_create.extend(level.tree.hooks.post_create);
        variables.extend(level.variables);
        validation.extend(level.validation);
    }
    overlay_entries(&mut entries, top_level_entries(tree));
    hooks.post_create.extend(tree.hooks.post_create.iter().cloned());

    let root = if applied.is_empty() {
        tree.root.clone()
    } else {
        root_from_entries(entries)
    };

    Ok(InheritanceResolution {
        tree: SchemaTree::new(root, hooks, Vec::new()),
        variables,
        validation,
        base_templates: applied,
    })
}

/// Depth-first walk over `tree.extends`. `resolving` holds the chain of names
/// currently being resolved and is passed by value down each branch.
fn collect_bases(
    tree: &SchemaTree,
    lookup: &dyn TemplateLookup,
    resolving: Vec<String>,
    levels: &mut Vec<Level>,
    applied: &mut Vec<String>,
) -> Result<()> {
    for name in &tree.extends {
        if resolving.contains(name) {
            let mut chain = resolving.clone();
            chain.push(name.clone());
            return Err(StructuraError::CircularInheritance { chain });
        }
        if applied.contains(name) {
            debug!(template = %name, "base already applied");
            continue;
        }
        if resolving.len() >= MAX_INHERITANCE_DEPTH {
            return Err(StructuraError::InheritanceError {
                template: name.clone(),
                message: format!("inheritance is nested more than {MAX_INHERITANCE_DEPTH} levels deep"),
            });
        }

        let base = lookup
            .lookup(name)
            .ok_or_else(|| StructuraError::InheritanceError {
                template: name.clone(),
                message: "template not found".into(),
            })?;
        let base_tree =
            parse_schema_text(&base.schema).map_err(|e| StructuraError::InheritanceError {
                template: name.clone(),
                message: format!("failed to parse: {e}"),
            })?;

        let mut chain = resolving.clone();
        chain.push(name.clone());
        collect_bases(&base_tree, lookup, chain, levels, applied)?;

        debug!(template = %name, "applying base template");
        applied.push(name.clone());
        levels.push(Level {
            tree: base_tree,
            variables: base.variables,
            validation: base.validation,
        });
    }
    Ok(())
}
