//! Template Compiler
//!
//! Expands `{c<N>}` positional clip tokens and `{captureName}` tokens in a
//! template body. Positional references past the end of the clip list render
//! empty; named tokens without a capture stay verbatim so the caller can show
//! what is unresolved.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::tokens;

/// Render `content` against the given clips (1-based) and optional captures
pub fn generate_text(
    content: &str,
    clip_contents: &[String],
    captures: Option<&HashMap<String, String>>,
) -> String {
    tokens::tokenize(content).render(|name| {
        if let Some(index) = tokens::clip_index(name) {
            let clip = usize::try_from(index - 1)
                .ok()
                .and_then(|i| clip_contents.get(i))
                .map(String::as_str)
                .unwrap_or("");
            return Some(Cow::Borrowed(clip));
        }
        captures
            .and_then(|c| c.get(name))
            .map(|value| Cow::Borrowed(value.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clips(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn captures(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_positional_tokens() {
        assert_eq!(generate_text("{c1}-{c2}", &clips(&["a", "b"]), None), "a-b");
    }

    #[test]
    fn test_out_of_range_positional_is_empty() {
        assert_eq!(generate_text("{c5}", &clips(&["a"]), None), "");
        assert_eq!(generate_text("x{c2}y", &[], None), "xy");
        assert_eq!(generate_text("{c99999999999999999999999}", &clips(&["a"]), None), "");
    }

    #[test]
    fn test_unresolved_named_token_is_verbatim() {
        assert_eq!(generate_text("{email}", &[], Some(&HashMap::new())), "{email}");
        assert_eq!(generate_text("{email}", &[], None), "{email}");
    }

    #[test]
    fn test_named_tokens_from_captures() {
        let caps = captures(&[("first", "Ada"), ("last", "Lovelace")]);
        assert_eq!(
            generate_text("Dear {first} {last}, re: {c1}", &clips(&["invoice"]), Some(&caps)),
            "Dear Ada Lovelace, re: invoice"
        );
    }

    #[test]
    fn test_no_tokens_returns_content_unchanged() {
        let content = "Plain text with } stray and { open braces and \\{escaped}";
        assert_eq!(generate_text(content, &clips(&["a"]), None), content);
    }

    #[test]
    fn test_repeated_tokens_replaced_identically() {
        assert_eq!(generate_text("{c1}{c1}{c1}", &clips(&["ab"]), None), "ababab");
    }

    #[test]
    fn test_values_are_not_reparsed() {
        let caps = captures(&[("a", "{c1}")]);
        assert_eq!(generate_text("{a}|{c1}", &clips(&["{a}"]), Some(&caps)), "{c1}|{a}");
    }

    #[test]
    fn test_positional_wins_over_capture_named_like_clip() {
        let caps = captures(&[("c1", "from-capture")]);
        assert_eq!(generate_text("{c1}", &clips(&["from-clip"]), Some(&caps)), "from-clip");
    }

    #[test]
    fn test_c0_is_a_named_token() {
        let caps = captures(&[("c0", "zero")]);
        assert_eq!(generate_text("{c0}", &clips(&["a"]), Some(&caps)), "zero");
        assert_eq!(generate_text("{c0}", &clips(&["a"]), None), "{c0}");
    }

    #[test]
    fn test_multiline_clips() {
        let out = generate_text("Q:\n{c1}\nA:\n{c2}", &clips(&["line1\nline2", "ok"]), None);
        assert_eq!(out, "Q:\nline1\nline2\nA:\nok");
    }
}
