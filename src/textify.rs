//! HTML to plain text conversion
//!
//! Summaries, excerpts, and the text-oriented renderers all need body HTML
//! reduced to readable text. This is a tag-level transform, not a browser:
//! script/style subtrees are dropped, remaining tags stripped, entities
//! decoded, whitespace collapsed.

use crate::utils::truncate_words;
use regex::Regex;
use std::sync::LazyLock;

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>")
        .expect("script/style pattern compiles")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern compiles"));

static WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

/// Reduce HTML to collapsed plain text, optionally truncated at a word
/// boundary with a trailing ellipsis
pub fn html_to_plaintext(html: &str, max_chars: Option<usize>) -> String {
    let text = strip_tags(html);
    match max_chars {
        Some(limit) => truncate_words(&text, limit),
        None => text,
    }
}

/// Drop script/style subtrees, strip tags, decode entities, collapse runs of
/// whitespace to single spaces
pub(crate) fn strip_tags(html: &str) -> String {
    let without_blocks = SCRIPT_STYLE_RE.replace_all(html, " ");
    let without_tags = TAG_RE.replace_all(&without_blocks, " ");
    let decoded = html_escape::decode_html_entities(without_tags.as_ref()).into_owned();
    collapse_whitespace(&decoded)
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    WS_RE.replace_all(text.trim(), " ").into_owned()
}

/// Drop script/style subtrees only, leaving other markup in place
///
/// The block-structured converters (gemtext, markdown) use this as their
/// first pass before translating the remaining tags.
pub(crate) fn strip_script_style(html: &str) -> String {
    SCRIPT_STYLE_RE.replace_all(html, " ").into_owned()
}

/// Strip tags and decode entities without collapsing whitespace
///
/// Used for preformatted blocks where line structure must survive.
pub(crate) fn strip_tags_keep_ws(html: &str) -> String {
    let without_tags = TAG_RE.replace_all(html, "");
    html_escape::decode_html_entities(without_tags.as_ref()).into_owned()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags() {
        assert_eq!(
            html_to_plaintext("<p>Hello <b>world</b></p>", None),
            "Hello world"
        );
    }

    #[test]
    fn strips_script_and_style() {
        let html = "<style>body{}</style><p>Keep</p><script>alert(1)</script>";
        assert_eq!(html_to_plaintext(html, None), "Keep");
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(
            html_to_plaintext("<p>a &amp; b &lt;c&gt;</p>", None),
            "a & b <c>"
        );
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(
            html_to_plaintext("<p>  lots   of\n\n  spaces  </p>", None),
            "lots of spaces"
        );
    }

    #[test]
    fn truncates_with_ellipsis() {
        let text = "word ".repeat(100);
        let out = html_to_plaintext(&format!("<p>{}</p>", text), Some(50));
        assert!(out.chars().count() <= 55);
        assert!(out.ends_with('\u{2026}'));
    }

    #[test]
    fn short_text_is_untouched() {
        let out = html_to_plaintext("<p>Short text</p>", Some(200));
        assert_eq!(out, "Short text");
        assert!(!out.contains('\u{2026}'));
    }

    #[test]
    fn empty_html_is_empty() {
        assert_eq!(html_to_plaintext("", None), "");
    }
}
