use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::compose::{resolve_inheritance, TemplateLookup};
use crate::config::ExpandConfig;
use crate::render::{is_builtin, join_rel};
use crate::schema::{parse_schema_text, NodeKind, SchemaNode, SchemaTree};
use crate::transform::find_variable_refs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    XmlSyntax,
    UndefinedVariable,
    DuplicateName,
    CircularInheritance,
    InheritanceError,
    InvalidUrl,
    InvalidRepeatCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    pub message: String,
    /// `/`-separated path of the node the issue is about, when there is one.
    pub node_path: Option<String>,
    /// The offending value: a variable name, URL or count.
    pub value: Option<String>,
}

/// Errors block creation; warnings are advisory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl Default for SchemaValidationResult {
    fn default() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl SchemaValidationResult {
    pub fn add_error(&mut self, kind: IssueKind, message: String) {
        self.is_valid = false;
        self.errors.push(ValidationIssue {
            severity: Severity::Error,
            kind,
            message,
            node_path: None,
            value: None,
        });
    }

    pub fn add_warning(
        &mut self,
        kind: IssueKind,
        message: String,
        node_path: Option<String>,
        value: Option<String>,
    ) {
        self.warnings.push(ValidationIssue {
            severity: Severity::Warning,
            kind,
            message,
            node_path,
            value,
        });
    }

    pub fn merge(&mut self, other: SchemaValidationResult) {
        self.is_valid &= other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Validate schema text end to end: syntax, inheritance, then the resolved tree.
///
/// A syntax error stops further checks. An inheritance failure is reported
/// and the remaining checks run on the schema without its bases.
pub fn validate_schema_text(
    text: &str,
    variables: &BTreeMap<String, String>,
    lookup: &dyn TemplateLookup,
    config: &ExpandConfig,
) -> SchemaValidationResult {
    let mut result = SchemaValidationResult::default();
    let tree = match parse_schema_text(text) {
        Ok(tree) => tree,
        Err(e) => {
            result.add_error(IssueKind::XmlSyntax, e.to_string());
            return result;
        }
    };

    if tree.extends.is_empty() {
        result.merge(validate_schema(&tree, variables, config));
        return result;
    }

    match resolve_inheritance(&tree, lookup) {
        Ok(resolved) => {
            let mut defined = resolved.variables;
            defined.extend(variables.iter().map(|(k, v)| (k.clone(), v.clone())));
            result.merge(validate_schema(&resolved.tree, &defined, config));
        }
        Err(e) => {
            let kind = e.issue_kind().unwrap_or(IssueKind::InheritanceError);
            result.add_error(kind, e.to_string());
            result.merge(validate_schema(&tree, variables, config));
        }
    }
    result
}

/// Structural checks on a parsed tree. Never produces errors, only warnings.
pub fn validate_schema(
    tree: &SchemaTree,
    variables: &BTreeMap<String, String>,
    config: &ExpandConfig,
) -> SchemaValidationResult {
    let defined: BTreeSet<String> = variables
        .keys()
        .map(|k| k.trim().trim_matches('%').to_string())
        .collect();
    let mut checker = Checker {
        defined,
        max_repeat_count: config.max_repeat_count,
        reported: BTreeSet::new(),
        result: SchemaValidationResult::default(),
    };

    for hook in &tree.hooks.post_create {
        checker.check_text(hook, &[], None);
    }
    checker.node(&tree.root, "", &[]);
    checker.result
}

struct Checker {
    defined: BTreeSet<String>,
    max_repeat_count: u64,
    /// Undefined names already reported, so each is reported once.
    reported: BTreeSet<String>,
    result: SchemaValidationResult,
}

impl Checker {
    fn node(&mut self, node: &SchemaNode, parent: &str, scope: &[String]) {
        let path = if node.is_control() {
            parent.to_string()
        } else {
            join_rel(parent, &node.name)
        };
        let shown = (!path.is_empty()).then(|| path.clone());

        self.check_text(&node.name, scope, shown.clone());
        for (_, value) in &node.attributes {
            self.check_text(value, scope, shown.clone());
        }

        let mut inner_scope = scope.to_vec();
        match &node.kind {
            NodeKind::File(source) => {
                for text in [&source.content, &source.generate_config, &source.url]
                    .into_iter()
                    .flatten()
                {
                    self.check_text(text, scope, shown.clone());
                }
                if let Some(url) = &source.url {
                    self.check_url(url, shown.clone());
                }
            }
            NodeKind::Repeat { count, as_var } => {
                self.check_text(count, scope, shown.clone());
                self.check_count(count, shown.clone());
                inner_scope.push(as_var.clone());
                inner_scope.push(format!("{as_var}_1"));
            }
            NodeKind::Folder | NodeKind::If { .. } | NodeKind::Else => {}
        }

        self.check_duplicates(&node.children, &path);
        for child in &node.children {
            self.node(child, &path, &inner_scope);
        }
    }

    fn check_text(&mut self, text: &str, scope: &[String], path: Option<String>) {
        for reference in find_variable_refs(text) {
            let name = reference.name;
            if is_builtin(&name)
                || self.defined.contains(&name)
                || scope.contains(&name)
                || self.reported.contains(&name)
            {
                continue;
            }
            self.result.add_warning(
                IssueKind::UndefinedVariable,
                format!("Variable %{name}% is referenced but not defined"),
                path.clone(),
                Some(name.clone()),
            );
            self.reported.insert(name);
        }
    }

    /// Control nodes are not siblings of anything on disk; their own children
    /// are checked as a separate group.
    fn check_duplicates(&mut self, children: &[SchemaNode], path: &str) {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for child in children.iter().filter(|c| !c.is_control()) {
            let count = seen.entry(child.name.as_str()).or_insert(0);
            *count += 1;
            if *count == 2 {
                let location = if path.is_empty() { "the root" } else { path };
                self.result.add_warning(
                    IssueKind::DuplicateName,
                    format!("Duplicate name '{}' found in {location}", child.name),
                    Some(path.to_string()),
                    Some(child.name.clone()),
                );
            }
        }
    }

    fn check_url(&mut self, url: &str, path: Option<String>) {
        if url.contains('%') {
            return;
        }
        if let Err(e) = url::Url::parse(url.trim()) {
            self.result.add_warning(
                IssueKind::InvalidUrl,
                format!("Invalid URL format: {e}"),
                path,
                Some(url.to_string()),
            );
        }
    }

    fn check_count(&mut self, count: &str, path: Option<String>) {
        if count.contains('%') {
            return;
        }
        let message = match count.trim().parse::<i64>() {
            Err(_) => format!("Repeat count '{count}' is not an integer"),
            Ok(n) if n < 0 => format!("Repeat count {n} is negative"),
            Ok(n) if n.unsigned_abs() > self.max_repeat_count => format!(
                "Repeat count {n} exceeds the maximum of {}",
                self.max_repeat_count
            ),
            Ok(_) => return,
        };
        self.result.add_warning(
            IssueKind::InvalidRepeatCount,
            message,
            path,
            Some(count.to_string()),
        );
    }
}

/// Names a schema expects the caller to bind, sorted.
///
/// Covers placeholders and `if` conditions; built-ins and repeat iteration
/// variables inside their block are left out.
pub fn extract_variables(tree: &SchemaTree) -> Vec<String> {
    let mut names = BTreeSet::new();
    for hook in &tree.hooks.post_create {
        collect_refs(hook, &[], &mut names);
    }
    collect_node(&tree.root, &[], &mut names);
    names.into_iter().collect()
}

fn collect_node(node: &SchemaNode, scope: &[String], names: &mut BTreeSet<String>) {
    collect_refs(&node.name, scope, names);
    for (_, value) in &node.attributes {
        collect_refs(value, scope, names);
    }
    let mut inner_scope = scope.to_vec();
    match &node.kind {
        NodeKind::File(source) => {
            for text in [&source.content, &source.generate_config, &source.url]
                .into_iter()
                .flatten()
            {
                collect_refs(text, scope, names);
            }
        }
        NodeKind::If { condition_var } => {
            if !is_builtin(condition_var) && !scope.contains(condition_var) {
                names.insert(condition_var.clone());
            }
        }
        NodeKind::Repeat { count, as_var } => {
            collect_refs(count, scope, names);
            inner_scope.push(as_var.clone());
            inner_scope.push(format!("{as_var}_1"));
        }
        NodeKind::Folder | NodeKind::Else => {}
    }
    for child in &node.children {
        collect_node(child, &inner_scope, names);
    }
}

fn collect_refs(text: &str, scope: &[String], names: &mut BTreeSet<String>) {
    for reference in find_variable_refs(text) {
        if !is_builtin(&reference.name) && !scope.contains(&reference.name) {
            names.insert(reference.name);
        }
    }
}
