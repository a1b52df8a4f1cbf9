use std::collections::BTreeMap;

use console::style;
use inquire::validator::{ErrorMessage, Validation};
use inquire::CustomUserError;
use miette::{miette, Result};

use structura_core::compose::TemplateLookup;
use structura_core::config::variable::check_value;
use structura_core::config::{validate_variables, ValidationRule};
use structura_core::{extract_variables, parse_schema_with_inheritance};

/// Fill in every variable the schema references that `given` does not bind.
///
/// Base template defaults are offered as prompt defaults. With `no_prompt`
/// nothing is asked and unbound names fall back to those defaults at
/// planning time. Either way the final values must satisfy the base
/// templates' validation rules.
pub fn collect_variables(
    schema_text: &str,
    templates: &dyn TemplateLookup,
    mut given: BTreeMap<String, String>,
    no_prompt: bool,
) -> Result<BTreeMap<String, String>> {
    let resolution = parse_schema_with_inheritance(schema_text, templates)?;

    if !no_prompt {
        for name in extract_variables(&resolution.tree) {
            if given.contains_key(&name) {
                continue;
            }
            let value = prompt_variable(
                &name,
                resolution.variables.get(&name).map(String::as_str),
                resolution.validation.get(&name).cloned(),
            )?;
            given.insert(name, value);
        }
    }

    let mut effective = resolution.variables.clone();
    effective.extend(given.iter().map(|(k, v)| (k.clone(), v.clone())));
    let errors = validate_variables(&effective, &resolution.validation);
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("  {} {}", style("✗").red(), e);
        }
        return Err(miette!("{} variable(s) failed validation", errors.len()));
    }
    Ok(given)
}

fn prompt_variable(
    name: &str,
    default: Option<&str>,
    rule: Option<ValidationRule>,
) -> Result<String> {
    let mut prompt = inquire::Text::new(name);
    if let Some(default) = default {
        prompt = prompt.with_default(default);
    }
    if let Some(rule) = rule {
        prompt = prompt.with_validator(
            move |input: &str| -> std::result::Result<Validation, CustomUserError> {
                match check_value(Some(input), &rule) {
                    Ok(()) => Ok(Validation::Valid),
                    Err(msg) => Ok(Validation::Invalid(ErrorMessage::Custom(msg))),
                }
            },
        );
    }
    prompt
        .prompt()
        .map_err(|_| miette!("Prompt cancelled for variable '{name}'"))
}
