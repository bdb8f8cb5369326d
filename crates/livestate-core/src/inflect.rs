#![forbid(unsafe_code)]

//! Name inflection for event and field accessors.
//!
//! `foo_bar` camelizes to `FooBar`, which is how the accessor names for a
//! declared event (`onFooBar` / `triggerFooBar`) and for a deferred setter
//! (`setFooBarLater`) are derived.

/// Turn `words_with_underscores` into `WordsWithUnderscores`.
///
/// With `lower_first`, the first letter is lowercased (`wordsWithUnderscores`).
#[must_use]
pub fn camelize(s: &str, lower_first: bool) -> String {
    let camel: String = s.split('_').map(capitalize).collect();
    if lower_first {
        uncapitalize(&camel)
    } else {
        camel
    }
}

/// Turn `CamelCase` (or `kebab-case`) into `camel_case`.
#[must_use]
pub fn underscore(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(char::is_ascii_lowercase);
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        match c {
            '-' => out.push('_'),
            _ => out.push(c.to_ascii_lowercase()),
        }
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn uncapitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camelize_event_names() {
        assert_eq!(camelize("foo_bar", false), "FooBar");
        assert_eq!(camelize("change", false), "Change");
        assert_eq!(camelize("number_attr_change", false), "NumberAttrChange");
    }

    #[test]
    fn camelize_lower_first() {
        assert_eq!(camelize("profile_url", true), "profileUrl");
    }

    #[test]
    fn camelize_empty() {
        assert_eq!(camelize("", false), "");
    }

    #[test]
    fn underscore_camel_case() {
        assert_eq!(underscore("FooBar"), "foo_bar");
        assert_eq!(underscore("fooBar2Baz"), "foo_bar2_baz");
    }

    #[test]
    fn underscore_acronyms_and_dashes() {
        assert_eq!(underscore("HTMLParser"), "html_parser");
        assert_eq!(underscore("content-type"), "content_type");
    }
}
