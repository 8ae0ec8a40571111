use once_cell::sync::Lazy;
use regex::Regex;

use crate::data::tables::DEFAULT_TAG_TYPE;

static LOWER_COLON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_]+:[a-z_]+").expect("valid namespace pattern"));

static PROBLEM_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[=+/&<>;'"?%#$@,. \t\r\n]"#).expect("valid problem chars pattern"));

/// Splits `addr:street` into `("addr", "street")`. Only the first colon
/// separates; keys without a lowercase namespace get the default type.
pub fn decompose(key: &str) -> (String, String) {
    if LOWER_COLON.is_match(key) {
        if let Some((tag_type, rest)) = key.split_once(':') {
            return (tag_type.to_string(), rest.to_string());
        }
    }
    (DEFAULT_TAG_TYPE.to_string(), key.to_string())
}

pub fn has_problem_chars(text: &str) -> bool {
    PROBLEM_CHARS.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(tag_type: &str, key: &str) -> (String, String) {
        (tag_type.to_string(), key.to_string())
    }

    #[test]
    fn namespaced_keys_are_split() {
        assert_eq!(decompose("addr:street"), pair("addr", "street"));
        assert_eq!(decompose("addr:full:extra"), pair("addr", "full:extra"));
        assert_eq!(decompose("addr:postal_code"), pair("addr", "postal_code"));
    }

    #[test]
    fn plain_keys_are_regular() {
        assert_eq!(decompose("name"), pair("regular", "name"));
        assert_eq!(decompose("tipo_via"), pair("regular", "tipo_via"));
    }

    #[test]
    fn keys_outside_the_namespace_pattern_are_regular() {
        assert_eq!(decompose("Addr:street"), pair("regular", "Addr:street"));
        assert_eq!(decompose("addr:"), pair("regular", "addr:"));
        assert_eq!(decompose("name:ES"), pair("regular", "name:ES"));
        assert_eq!(decompose("seamark:1:colour"), pair("regular", "seamark:1:colour"));
    }

    #[test]
    fn problem_chars_are_flagged() {
        assert!(has_problem_chars("addr street"));
        assert!(has_problem_chars("fixme?"));
        assert!(has_problem_chars("a.b"));
        assert!(!has_problem_chars("addr:street"));
        assert!(!has_problem_chars("tipo_via"));
    }
}
