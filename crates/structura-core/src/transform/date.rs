use chrono::NaiveDate;

/// Expand a date pattern over `date`.
///
/// Tokens are `YYYY`, `YY`, `MMMM`, `MMM`, `MM`, `DD` and `D`, matched
/// longest first while scanning left to right; everything else is literal.
/// `iso`, `us` and `eu` name common patterns.
pub fn format_date(date: NaiveDate, pattern: &str) -> String {
    let pattern = match pattern.trim().to_ascii_lowercase().as_str() {
        "" | "iso" => "YYYY-MM-DD",
        "us" => "MM/DD/YYYY",
        "eu" => "DD/MM/YYYY",
        _ => pattern,
    };

    const TOKENS: &[(&str, &str)] = &[
        ("YYYY", "%Y"),
        ("YY", "%y"),
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        ("DD", "%d"),
        ("D", "%-d"),
    ];

    let mut strftime = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;
    'scan: while let Some(c) = rest.chars().next() {
        for (token, directive) in TOKENS {
            if let Some(after) = rest.strip_prefix(token) {
                strftime.push_str(directive);
                rest = after;
                continue 'scan;
            }
        }
        if c == '%' {
            strftime.push_str("%%");
        } else {
            strftime.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }
    date.format(&strftime).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[rstest]
    #[case("YYYY-MM-DD", "2024-03-05")]
    #[case("iso", "2024-03-05")]
    #[case("us", "03/05/2024")]
    #[case("EU", "05/03/2024")]
    #[case("MMMM D, YYYY", "March 5, 2024")]
    #[case("MMM YY", "Mar 24")]
    #[case("YYYYMMDD", "20240305")]
    #[case("Q1 100%", "Q1 100%")]
    fn formats(#[case] pattern: &str, #[case] expected: &str) {
        assert_eq!(format_date(day(), pattern), expected);
    }

    #[test]
    fn year_digits_are_not_reinterpreted() {
        // "YYYY" must not leave "YY" to match inside the produced year.
        assert_eq!(format_date(day(), "YYYY/YY"), "2024/24");
    }
}
