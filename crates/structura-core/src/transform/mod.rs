//! Placeholder substitution: `%NAME%` and `%NAME:transform:transform(arg)%`.

pub mod case;
pub mod date;
pub mod plural;

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex_lite::{Captures, Regex};

use crate::render::context::Bindings;

const REFERENCE_PATTERN: &str =
    r"%([A-Za-z_][A-Za-z0-9_]*)((?::[A-Za-z_-]+(?:\([^)%]*\))?)*)%";
const TRANSFORM_PATTERN: &str = r":([A-Za-z_-]+)(?:\(([^)%]*)\))?";

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(REFERENCE_PATTERN).expect("reference pattern is valid"))
}

fn transform_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TRANSFORM_PATTERN).expect("transform pattern is valid"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    Uppercase,
    Lowercase,
    CamelCase,
    PascalCase,
    KebabCase,
    SnakeCase,
    Plural,
    Length,
    /// Formats the current date, ignoring the variable's value.
    Format(String),
}

impl Transform {
    /// Look up a transform by name. Names are case-insensitive.
    pub fn parse(name: &str, arg: Option<&str>) -> Option<Self> {
        let transform = match name.to_ascii_lowercase().as_str() {
            "uppercase" | "upper" => Transform::Uppercase,
            "lowercase" | "lower" => Transform::Lowercase,
            "camelcase" | "camel" => Transform::CamelCase,
            "pascalcase" | "pascal" => Transform::PascalCase,
            "kebab-case" | "kebab" => Transform::KebabCase,
            "snake_case" | "snake" => Transform::SnakeCase,
            "plural" | "pluralize" => Transform::Plural,
            "length" | "len" => Transform::Length,
            "format" => Transform::Format(arg.unwrap_or("").to_string()),
            _ => return None,
        };
        Some(transform)
    }

    pub fn apply(&self, value: &str, today: NaiveDate) -> String {
        match self {
            Transform::Uppercase => value.to_uppercase(),
            Transform::Lowercase => value.to_lowercase(),
            Transform::CamelCase => case::to_camel_case(value),
            Transform::PascalCase => case::to_pascal_case(value),
            Transform::KebabCase => case::to_kebab_case(value),
            Transform::SnakeCase => case::to_snake_case(value),
            Transform::Plural => plural::pluralize(value),
            Transform::Length => value.chars().count().to_string(),
            Transform::Format(pattern) => date::format_date(today, pattern),
        }
    }
}

/// One placeholder occurrence found in a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRef {
    pub name: String,
    pub transforms: Vec<Transform>,
    /// Transform names that are not recognized; such a reference is never substituted.
    pub unknown_transforms: Vec<String>,
    /// The reference exactly as written, delimiters included.
    pub raw: String,
}

fn reference_from(caps: &Captures<'_>) -> VariableRef {
    let mut transforms = Vec::new();
    let mut unknown_transforms = Vec::new();
    if let Some(chain) = caps.get(2) {
        for t in transform_regex().captures_iter(chain.as_str()) {
            let name = &t[1];
            match Transform::parse(name, t.get(2).map(|m| m.as_str())) {
                Some(transform) => transforms.push(transform),
                None => unknown_transforms.push(name.to_string()),
            }
        }
    }
    VariableRef {
        name: caps[1].to_string(),
        transforms,
        unknown_transforms,
        raw: caps[0].to_string(),
    }
}

/// All placeholder references in `text`, in order of appearance, without duplicates.
pub fn find_variable_refs(text: &str) -> Vec<VariableRef> {
    let mut refs: Vec<VariableRef> = Vec::new();
    for caps in reference_regex().captures_iter(text) {
        let reference = reference_from(&caps);
        if !refs.iter().any(|r| r.raw == reference.raw) {
            refs.push(reference);
        }
    }
    refs
}

/// Replace every bound placeholder in `text`.
///
/// Transforms apply left to right. References to unbound variables, or with
/// an unknown transform, are left verbatim.
pub fn substitute(text: &str, bindings: &Bindings) -> String {
    substitute_with(text, bindings, |value| value)
}

/// Substitute into XML markup, escaping each value outside CDATA sections.
pub fn substitute_xml(text: &str, bindings: &Bindings) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<![CDATA[") {
        let (markup, tail) = rest.split_at(start);
        out.push_str(&substitute_with(markup, bindings, escape_xml));
        let end = tail.find("]]>").map_or(tail.len(), |i| i + 3);
        out.push_str(&substitute(&tail[..end], bindings));
        rest = &tail[end..];
    }
    out.push_str(&substitute_with(rest, bindings, escape_xml));
    out
}

fn escape_xml(value: String) -> String {
    quick_xml::escape::escape(value.as_str()).into_owned()
}

fn substitute_with(text: &str, bindings: &Bindings, finish: fn(String) -> String) -> String {
    if !text.contains('%') {
        return text.to_string();
    }
    reference_regex()
        .replace_all(text, |caps: &Captures<'_>| {
            let reference = reference_from(caps);
            match bindings.get(&reference.name) {
                Some(value) if reference.unknown_transforms.is_empty() => finish(
                    reference
                        .transforms
                        .iter()
                        .fold(value.to_string(), |acc, t| t.apply(&acc, bindings.today())),
                ),
                _ => reference.raw,
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn bindings() -> Bindings {
        let mut b = Bindings::new(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        b.insert("NAME", "my project");
        b.insert("ENTITY", "category");
        b.insert("EMPTY", "");
        b
    }

    #[rstest]
    #[case("Hello %NAME%", "Hello my project")]
    #[case("%NAME:upper%", "MY PROJECT")]
    #[case("%NAME:PascalCase%.rs", "MyProject.rs")]
    #[case("%NAME:kebab-case%", "my-project")]
    #[case("%NAME:snake_case%", "my_project")]
    #[case("%NAME:camelCase%", "myProject")]
    #[case("%ENTITY:plural%", "categories")]
    #[case("%ENTITY:pluralize:upper%", "CATEGORIES")]
    #[case("%NAME:snake:upper%", "MY_PROJECT")]
    #[case("%NAME:length%", "10")]
    #[case("%NAME:format(YYYY)%", "2024")]
    #[case("%NAME:format%", "2024-01-15")]
    #[case("[%EMPTY%]", "[]")]
    #[case("%MISSING% stays", "%MISSING% stays")]
    #[case("%NAME:shout%", "%NAME:shout%")]
    #[case("100% of %NAME%", "100% of my project")]
    #[case("%NAME%%ENTITY%", "my projectcategory")]
    fn substitutes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(substitute(input, &bindings()), expected);
    }

    #[test]
    fn finds_references_once_each() {
        let refs = find_variable_refs("%A% %B:upper% %A% %C:nope%");
        let names: Vec<_> = refs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert_eq!(refs[1].transforms, [Transform::Uppercase]);
        assert_eq!(refs[2].unknown_transforms, ["nope"]);
    }

    #[test]
    fn xml_substitution_escapes_markup_but_not_cdata() {
        let mut b = bindings();
        b.insert("V", "a<b & \"c\"");
        assert_eq!(
            substitute_xml(r#"<column default="%V%"/><sql><![CDATA[%V%]]></sql>%V%"#, &b),
            r#"<column default="a&lt;b &amp; &quot;c&quot;"/><sql><![CDATA[a<b & "c"]]></sql>a&lt;b &amp; &quot;c&quot;"#
        );
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let mut b = bindings();
        b.insert("A", "%NAME%");
        assert_eq!(substitute("%A%", &b), "%NAME%");
    }
}
