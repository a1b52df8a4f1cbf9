use std::collections::BTreeMap;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Constraints on one variable's value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationRule {
    pub required: bool,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Regular expression the whole value must match.
    pub pattern: Option<String>,
}

/// Variable defaults and rules shipped with a library template (`<name>.toml`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateVariables {
    pub variables: BTreeMap<String, String>,
    pub validation: BTreeMap<String, ValidationRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableError {
    pub name: String,
    pub message: String,
}

impl std::fmt::Display for VariableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Check one value against its rule. Lengths count characters.
pub fn check_value(value: Option<&str>, rule: &ValidationRule) -> Result<(), String> {
    let value = match value {
        Some(v) if !v.is_empty() => v,
        _ if rule.required => return Err("value is required".to_string()),
        _ => return Ok(()),
    };

    let len = value.chars().count();
    if let Some(min) = rule.min_length {
        if len < min {
            return Err(format!("must be at least {min} characters"));
        }
    }
    if let Some(max) = rule.max_length {
        if len > max {
            return Err(format!("must be at most {max} characters"));
        }
    }
    if let Some(pattern) = &rule.pattern {
        let anchored = format!("^(?:{pattern})$");
        let re = Regex::new(&anchored).map_err(|e| format!("invalid pattern '{pattern}': {e}"))?;
        if !re.is_match(value) {
            return Err(format!("must match pattern '{pattern}'"));
        }
    }
    Ok(())
}

/// Validate bound values against their rules, in rule-name order.
pub fn validate_variables(
    values: &BTreeMap<String, String>,
    rules: &BTreeMap<String, ValidationRule>,
) -> Vec<VariableError> {
    rules
        .iter()
        .filter_map(|(name, rule)| {
            check_value(values.get(name).map(String::as_str), rule)
                .err()
                .map(|message| VariableError {
                    name: name.clone(),
                    message,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rule() -> ValidationRule {
        ValidationRule {
            required: true,
            min_length: Some(2),
            max_length: Some(5),
            pattern: Some("[a-z]+".into()),
        }
    }

    #[rstest]
    #[case(None, false)]
    #[case(Some(""), false)]
    #[case(Some("a"), false)]
    #[case(Some("abcdef"), false)]
    #[case(Some("ab1"), false)]
    #[case(Some("abc"), true)]
    fn checks_rule(#[case] value: Option<&str>, #[case] ok: bool) {
        assert_eq!(check_value(value, &rule()).is_ok(), ok);
    }

    #[test]
    fn optional_empty_value_passes() {
        let rule = ValidationRule {
            min_length: Some(3),
            ..Default::default()
        };
        assert!(check_value(None, &rule).is_ok());
    }

    #[test]
    fn lengths_count_characters() {
        let rule = ValidationRule {
            max_length: Some(3),
            ..Default::default()
        };
        assert!(check_value(Some("héé"), &rule).is_ok());
    }

    #[test]
    fn validate_reports_each_failing_variable() {
        let mut rules = BTreeMap::new();
        rules.insert("NAME".to_string(), rule());
        rules.insert(
            "VERSION".to_string(),
            ValidationRule {
                pattern: Some(r"\d+\.\d+".into()),
                ..Default::default()
            },
        );
        let mut values = BTreeMap::new();
        values.insert("VERSION".to_string(), "one".to_string());

        let errors = validate_variables(&values, &rules);
        let names: Vec<_> = errors.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["NAME", "VERSION"]);
    }

    #[test]
    fn template_variables_parse_from_toml() {
        let parsed: TemplateVariables = toml::from_str(
            r#"
[variables]
AUTHOR = "Jane"

[validation.AUTHOR]
required = true
minLength = 2
"#,
        )
        .unwrap();
        assert_eq!(parsed.variables["AUTHOR"], "Jane");
        assert_eq!(parsed.validation["AUTHOR"].min_length, Some(2));
    }
}
