use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

/// Variables every schema may reference without declaring them.
pub const BUILTIN_VARIABLES: &[&str] = &["DATE", "YEAR", "MONTH", "DAY", "PROJECT_NAME"];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_VARIABLES.contains(&name)
}

/// Variable name to value table used for substitution and conditions.
///
/// Names are stored without `%` delimiters; `"%NAME%"` and `"NAME"` refer to
/// the same binding. `today` is the date `format(...)` renders, captured once
/// so that one expansion is reproducible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bindings {
    values: BTreeMap<String, String>,
    today: NaiveDate,
}

impl Bindings {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            values: BTreeMap::new(),
            today,
        }
    }

    /// Bindings dated with the local calendar day.
    pub fn today_local() -> Self {
        Self::new(chrono::Local::now().date_naive())
    }

    pub fn from_map(values: &BTreeMap<String, String>, today: NaiveDate) -> Self {
        let mut bindings = Self::new(today);
        for (name, value) in values {
            bindings.insert(name, value.clone());
        }
        bindings
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values.insert(normalize_name(name), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(normalize_name(name).as_str()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Present and not `""`, `"false"` or `"0"` (trimmed, case-insensitive).
    pub fn is_truthy(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| {
            let v = v.trim().to_ascii_lowercase();
            !(v.is_empty() || v == "false" || v == "0")
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Add `DATE`, `YEAR`, `MONTH`, `DAY` and, when given, `PROJECT_NAME`.
    /// Values the caller already bound are kept.
    pub fn with_builtins(mut self, project_name: Option<&str>) -> Self {
        let today = self.today;
        let mut defaults = vec![
            ("DATE", today.format("%Y-%m-%d").to_string()),
            ("YEAR", today.year().to_string()),
            ("MONTH", format!("{:02}", today.month())),
            ("DAY", format!("{:02}", today.day())),
        ];
        if let Some(project) = project_name {
            defaults.push(("PROJECT_NAME", project.to_string()));
        }
        for (name, value) in defaults {
            self.values.entry(name.to_string()).or_insert(value);
        }
        self
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().trim_matches('%').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 4).unwrap()
    }

    #[test]
    fn delimiters_are_optional() {
        let mut b = Bindings::new(day());
        b.insert("%NAME%", "x");
        assert_eq!(b.get("NAME"), Some("x"));
        assert_eq!(b.get("%NAME%"), Some("x"));
    }

    #[rstest]
    #[case(Some("true"), true)]
    #[case(Some("yes"), true)]
    #[case(Some("1"), true)]
    #[case(Some(""), false)]
    #[case(Some("  "), false)]
    #[case(Some("false"), false)]
    #[case(Some("FALSE"), false)]
    #[case(Some("0"), false)]
    #[case(None, false)]
    fn truthiness(#[case] value: Option<&str>, #[case] expected: bool) {
        let mut b = Bindings::new(day());
        if let Some(v) = value {
            b.insert("X", v);
        }
        assert_eq!(b.is_truthy("X"), expected);
    }

    #[test]
    fn builtins_do_not_override_caller_values() {
        let mut b = Bindings::new(day());
        b.insert("YEAR", "1999");
        let b = b.with_builtins(Some("demo"));
        assert_eq!(b.get("YEAR"), Some("1999"));
        assert_eq!(b.get("DATE"), Some("2025-07-04"));
        assert_eq!(b.get("MONTH"), Some("07"));
        assert_eq!(b.get("PROJECT_NAME"), Some("demo"));
    }
}
