//! Utility functions for filenames and text shaping

/// Lowercase a label and replace every non-alphanumeric character with `-`
///
/// Used for directory and file names derived from display names and titles:
/// `"Hacker News"` becomes `"hacker-news"`.
pub fn safe_slug(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// File stem for the nth item of a group: zero-padded index plus title slug,
/// truncated so paths stay comfortably short
pub fn article_stem(index: usize, title: &str) -> String {
    let slug = safe_slug(title);
    let slug = slug.trim_matches('-');
    let truncated: String = slug.chars().take(48).collect();
    if truncated.is_empty() {
        format!("{:03}", index)
    } else {
        format!("{:03}-{}", index, truncated)
    }
}

/// Truncate at a word boundary, appending an ellipsis when text was dropped
pub fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    let trimmed = match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}\u{2026}", trimmed.trim_end())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_replaces_spaces() {
        assert_eq!(safe_slug("Hacker News"), "hacker-news");
    }

    #[test]
    fn slug_replaces_every_special_char() {
        assert_eq!(safe_slug("Kagi News / Tech"), "kagi-news---tech");
    }

    #[test]
    fn article_stem_pads_and_slugs() {
        assert_eq!(article_stem(1, "My Article"), "001-my-article");
        assert_eq!(article_stem(42, ""), "042");
    }

    #[test]
    fn article_stem_caps_length() {
        let long = "x".repeat(300);
        let stem = article_stem(7, &long);
        assert!(stem.len() <= 52);
        assert!(stem.starts_with("007-"));
    }

    #[test]
    fn truncate_keeps_short_text_untouched() {
        assert_eq!(truncate_words("short", 50), "short");
    }

    #[test]
    fn truncate_ends_with_ellipsis_on_word_boundary() {
        let text = "word ".repeat(100);
        let out = truncate_words(&text, 50);
        assert!(out.chars().count() <= 55);
        assert!(out.ends_with('\u{2026}'));
        assert!(!out.contains("  "));
    }
}
