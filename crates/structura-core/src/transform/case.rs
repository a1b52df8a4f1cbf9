/// Split on `_`, `-`, spaces and lower-to-upper boundaries; words come back lowercase.
pub fn split_into_words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in s.chars() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current).to_lowercase());
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current).to_lowercase());
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current.to_lowercase());
    }
    words
}

pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

pub fn to_camel_case(s: &str) -> String {
    let mut words = split_into_words(s).into_iter();
    let Some(first) = words.next() else {
        return String::new();
    };
    words.fold(first, |mut acc, w| {
        acc.push_str(&capitalize_first(&w));
        acc
    })
}

pub fn to_pascal_case(s: &str) -> String {
    split_into_words(s)
        .iter()
        .map(|w| capitalize_first(w))
        .collect()
}

pub fn to_kebab_case(s: &str) -> String {
    split_into_words(s).join("-")
}

pub fn to_snake_case(s: &str) -> String {
    split_into_words(s).join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("hello world", "helloWorld", "HelloWorld", "hello-world", "hello_world")]
    #[case("HelloWorld", "helloWorld", "HelloWorld", "hello-world", "hello_world")]
    #[case("my-cool_app", "myCoolApp", "MyCoolApp", "my-cool-app", "my_cool_app")]
    #[case("HTTPServer", "httpserver", "Httpserver", "httpserver", "httpserver")]
    #[case("version2Beta", "version2Beta", "Version2Beta", "version2-beta", "version2_beta")]
    #[case("", "", "", "", "")]
    fn converts_case(
        #[case] input: &str,
        #[case] camel: &str,
        #[case] pascal: &str,
        #[case] kebab: &str,
        #[case] snake: &str,
    ) {
        assert_eq!(to_camel_case(input), camel);
        assert_eq!(to_pascal_case(input), pascal);
        assert_eq!(to_kebab_case(input), kebab);
        assert_eq!(to_snake_case(input), snake);
    }
}
