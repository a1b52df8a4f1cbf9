use super::case::capitalize_first;

const IRREGULAR: &[(&str, &str)] = &[
    ("child", "children"),
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("tooth", "teeth"),
    ("foot", "feet"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("ox", "oxen"),
    ("fish", "fish"),
    ("sheep", "sheep"),
    ("deer", "deer"),
    ("moose", "moose"),
    ("series", "series"),
    ("species", "species"),
    ("aircraft", "aircraft"),
    ("offspring", "offspring"),
    ("cactus", "cacti"),
    ("focus", "foci"),
    ("fungus", "fungi"),
    ("nucleus", "nuclei"),
    ("syllabus", "syllabi"),
    ("analysis", "analyses"),
    ("diagnosis", "diagnoses"),
    ("thesis", "theses"),
    ("crisis", "crises"),
    ("phenomenon", "phenomena"),
    ("criterion", "criteria"),
    ("datum", "data"),
    ("index", "indices"),
    ("appendix", "appendices"),
    ("life", "lives"),
    ("wife", "wives"),
    ("knife", "knives"),
    ("elf", "elves"),
    ("shelf", "shelves"),
    ("self", "selves"),
    ("half", "halves"),
    ("calf", "calves"),
    ("loaf", "loaves"),
    ("wolf", "wolves"),
    ("leaf", "leaves"),
];

/// Words ending in consonant + `o` that take a plain `s`.
const O_TAKES_S: &[&str] = &[
    "photo", "piano", "halo", "studio", "video", "radio", "ratio", "portfolio", "patio", "cello",
    "memo", "solo", "euro", "auto", "pro", "disco", "limo", "info", "demo", "logo", "motto",
    "repo", "typo", "todo",
];

/// Words ending in `f`/`fe` that take a plain `s`.
const F_TAKES_S: &[&str] = &[
    "roof", "chief", "belief", "brief", "cliff", "proof", "reef", "grief", "safe", "chef", "fief",
    "gulf", "surf", "turf", "motif", "sheriff", "tariff", "plaintiff", "bailiff",
];

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Naive English pluralization of the last word in `s`.
pub fn pluralize(s: &str) -> String {
    let (head, word) = match s.rfind(' ') {
        Some(pos) => s.split_at(pos + 1),
        None => ("", s),
    };
    if word.is_empty() {
        return s.to_string();
    }
    format!("{head}{}", pluralize_word(word))
}

fn pluralize_word(word: &str) -> String {
    let lower = word.to_lowercase();

    if let Some((_, plural)) = IRREGULAR.iter().find(|(singular, _)| *singular == lower) {
        let capitalized = word.chars().next().is_some_and(char::is_uppercase);
        return if capitalized {
            capitalize_first(plural)
        } else {
            (*plural).to_string()
        };
    }

    let chars: Vec<char> = word.chars().collect();
    let lower_chars: Vec<char> = lower.chars().collect();
    let n = chars.len();
    let before_last = if n > 1 { Some(lower_chars[n - 2]) } else { None };

    if lower.ends_with('y') && before_last.is_some_and(|c| !is_vowel(c)) {
        let stem: String = chars[..n - 1].iter().collect();
        return format!("{stem}ies");
    }

    if ["s", "x", "z", "ch", "sh"].iter().any(|end| lower.ends_with(end)) {
        return format!("{word}es");
    }

    if lower.ends_with('o')
        && before_last.is_some_and(|c| !is_vowel(c))
        && !O_TAKES_S.contains(&lower.as_str())
    {
        return format!("{word}es");
    }

    if !F_TAKES_S.contains(&lower.as_str()) {
        if lower.ends_with("fe") && n > 2 {
            let stem: String = chars[..n - 2].iter().collect();
            return format!("{stem}ves");
        }
        if lower.ends_with('f') && n > 1 {
            let stem: String = chars[..n - 1].iter().collect();
            return format!("{stem}ves");
        }
    }

    format!("{word}s")
}
