//! Gemtext renderer
//!
//! Produces the minimal line-oriented hypertext format: one `index.gmi` per
//! source plus one `.gmi` file per item, with a date-level index at the top.
//! The body conversion is lossy on purpose: headings, links, images, quotes,
//! and preformatted blocks survive; inline styling does not.

use crate::error::RenderError;
use crate::textify;
use crate::types::{Edition, Item, SourceGroup};
use crate::utils::{article_stem, safe_slug};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static PRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<pre[^>]*>(.*?)</pre>").expect("pre pattern compiles"));
static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("h1 pattern compiles"));
static H2_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h2[^>]*>(.*?)</h2>").expect("h2 pattern compiles"));
static H3_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<h[3-6][^>]*>(.*?)</h[3-6]>").expect("h3 pattern compiles")
});
static BLOCKQUOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<blockquote[^>]*>(.*?)</blockquote>").expect("blockquote pattern compiles")
});
static IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img\s[^>]*?/?>").expect("img pattern compiles"));
static SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)src=["']([^"']+)["']"#).expect("src pattern compiles")
});
static ALT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)alt=["']([^"']*)["']"#).expect("alt pattern compiles")
});
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href=["']([^"']+)["'][^>]*>(.*?)</a>"#)
        .expect("link pattern compiles")
});
static LI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<li[^>]*>").expect("li pattern compiles"));
static BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</p>|</div>|</ul>|</ol>|</table>").expect("break pattern compiles")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern compiles"));
static BLANKS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank-run pattern compiles"));

/// Convert body HTML to gemtext lines
pub fn html_to_gemtext(html: &str) -> String {
    let text = textify::strip_script_style(html);

    // fence preformatted blocks and shield them from later passes
    let mut fences: Vec<String> = Vec::new();
    let text = PRE_RE
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let inner = textify::strip_tags_keep_ws(&caps[1]);
            fences.push(format!("\n```\n{}\n```\n", inner.trim_matches('\n')));
            format!("\u{0}{}\u{0}", fences.len() - 1)
        })
        .into_owned();

    let text = H1_RE.replace_all(&text, |c: &regex::Captures<'_>| {
        format!("\n# {}\n", textify::strip_tags(&c[1]))
    });
    let text = H2_RE.replace_all(&text, |c: &regex::Captures<'_>| {
        format!("\n## {}\n", textify::strip_tags(&c[1]))
    });
    let text = H3_RE.replace_all(&text, |c: &regex::Captures<'_>| {
        format!("\n### {}\n", textify::strip_tags(&c[1]))
    });
    let text = BLOCKQUOTE_RE.replace_all(&text, |c: &regex::Captures<'_>| {
        format!("\n> {}\n", textify::strip_tags(&c[1]))
    });
    let text = IMG_RE.replace_all(&text, |c: &regex::Captures<'_>| {
        let tag = &c[0];
        let Some(src) = SRC_RE.captures(tag).map(|s| s[1].to_string()) else {
            return String::new();
        };
        let alt = ALT_RE
            .captures(tag)
            .map(|a| a[1].to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| "image".to_string());
        format!("\n=> {} {}\n", src, alt)
    });
    let text = LINK_RE.replace_all(&text, |c: &regex::Captures<'_>| {
        format!("\n=> {} {}\n", &c[1], textify::strip_tags(&c[2]))
    });
    let text = LI_RE.replace_all(&text, "\n* ");
    let text = BREAK_RE.replace_all(&text, "\n\n");
    let text = TAG_RE.replace_all(&text, "");
    let text = html_escape::decode_html_entities(text.as_ref()).into_owned();

    // restore fenced blocks after tidying so their line structure survives
    let mut text = tidy(&text);
    for (i, fence) in fences.iter().enumerate() {
        text = text.replace(&format!("\u{0}{}\u{0}", i), fence);
    }
    text
}

/// Trim per-line whitespace and collapse runs of blank lines
fn tidy(text: &str) -> String {
    let joined: String = text
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    BLANKS_RE
        .replace_all(&joined, "\n\n")
        .trim_matches('\n')
        .to_string()
}

/// Render the edition as gemtext; returns the format directory
pub async fn render(edition: &Edition, run_dir: &Path) -> Result<PathBuf, RenderError> {
    let fmt_dir = run_dir.join("gemtext");

    for group in &edition.groups {
        let group_dir = fmt_dir.join(safe_slug(&group.source_id));
        create_dir(&group_dir).await?;

        write_file(&group_dir.join("index.gmi"), &source_index(group, edition)).await?;

        for (i, item) in group.items.iter().enumerate() {
            let path = group_dir.join(format!("{}.gmi", article_stem(i + 1, &item.title)));
            write_file(&path, &article_gmi(item)).await?;
        }
    }

    create_dir(&fmt_dir).await?;
    write_file(&fmt_dir.join("index.gmi"), &date_index(edition)).await?;

    Ok(fmt_dir)
}

fn date_index(edition: &Edition) -> String {
    let mut out = format!("# News for {}\n\n", edition.date_str());
    for group in &edition.groups {
        out.push_str(&format!(
            "=> {}/index.gmi {} ({} articles)\n",
            safe_slug(&group.source_id),
            group.display_name,
            group.items.len()
        ));
    }
    if edition.groups.is_empty() {
        out.push_str("No sources produced items for this edition.\n");
    }
    out
}

fn source_index(group: &SourceGroup, edition: &Edition) -> String {
    let mut out = format!(
        "# {}\nas of {}\n\n",
        group.display_name,
        edition.date_str()
    );
    for (i, item) in group.items.iter().enumerate() {
        out.push_str(&format!(
            "=> {}.gmi {} ({})\n",
            article_stem(i + 1, &item.title),
            item.title,
            item.display_date().format("%Y-%m-%d")
        ));
    }
    out.push_str("\n=> ../index.gmi all sources\n");
    out
}

fn article_gmi(item: &Item) -> String {
    let mut out = format!(
        "# {}\n{} | {}\n",
        item.title,
        item.author,
        item.display_date().format("%Y-%m-%d %H:%M UTC")
    );
    if !item.url.is_empty() {
        out.push_str(&format!("=> {} Source\n", item.url));
    }
    out.push('\n');

    // pages sit two levels below the run dir, so store paths get a prefix
    let body = html_to_gemtext(&item.body_html).replace("=> images/", "=> ../../images/");
    out.push_str(&body);
    out.push_str("\n\n=> index.gmi back\n");
    out
}

async fn create_dir(path: &Path) -> Result<(), RenderError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| RenderError::Io {
            format: "gemtext",
            path: path.to_path_buf(),
            cause: e,
        })
}

async fn write_file(path: &Path, content: &str) -> Result<(), RenderError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|e| RenderError::Io {
            format: "gemtext",
            path: path.to_path_buf(),
            cause: e,
        })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::{empty_edition, sample_edition};

    #[test]
    fn plain_paragraph_survives() {
        assert!(html_to_gemtext("<p>Hello world</p>").contains("Hello world"));
    }

    #[test]
    fn headings_map_to_line_markers() {
        let out = html_to_gemtext("<h1>Title</h1><h2>Sub</h2><h3>SubSub</h3>");
        assert!(out.contains("# Title"));
        assert!(out.contains("## Sub"));
        assert!(out.contains("### SubSub"));
    }

    #[test]
    fn links_become_gemini_link_lines() {
        let out = html_to_gemtext(r#"<a href="https://example.com">Example</a>"#);
        assert!(out.contains("=> https://example.com Example"));
    }

    #[test]
    fn images_become_link_lines() {
        let out = html_to_gemtext(r#"<img src="images/photo.jpg" alt="A photo">"#);
        assert!(out.contains("=> images/photo.jpg A photo"));
    }

    #[test]
    fn image_without_alt_gets_a_placeholder_label() {
        let out = html_to_gemtext(r#"<img src="images/x.png">"#);
        assert!(out.contains("=> images/x.png image"));
    }

    #[test]
    fn blockquotes_get_quote_prefix() {
        let out = html_to_gemtext("<blockquote>Quoted text</blockquote>");
        assert!(out.contains("> Quoted text"));
    }

    #[test]
    fn preformatted_blocks_are_fenced() {
        let out = html_to_gemtext("<pre>code here</pre>");
        assert!(out.contains("```"));
        assert!(out.contains("code here"));
    }

    #[test]
    fn pre_content_is_shielded_from_tag_stripping() {
        let out = html_to_gemtext("<pre>#include &lt;stdio.h&gt;</pre>");
        assert!(out.contains("#include <stdio.h>"));
    }

    #[test]
    fn inline_formatting_is_stripped() {
        let out = html_to_gemtext("<p><b>bold</b> and <i>italic</i></p>");
        assert!(out.contains("bold and italic"));
        assert!(!out.contains("<b>"));
    }

    #[test]
    fn no_html_tags_leak() {
        let out = html_to_gemtext(r#"<div class="story-meta"><span>100 points</span></div>"#);
        assert!(!out.contains('<'));
        assert!(out.contains("100 points"));
    }

    #[test]
    fn script_and_style_are_dropped() {
        let out = html_to_gemtext("<style>body{}</style><script>alert(1)</script><p>visible</p>");
        assert!(out.contains("visible"));
        assert!(!out.contains("alert"));
        assert!(!out.contains("body{}"));
    }

    #[test]
    fn list_items_get_bullets() {
        let out = html_to_gemtext("<ul><li>one</li><li>two</li></ul>");
        assert!(out.contains("* one"));
        assert!(out.contains("* two"));
    }

    #[tokio::test]
    async fn creates_index_and_article_files() {
        let dir = tempfile::tempdir().unwrap();
        let edition = sample_edition();
        render(&edition, dir.path()).await.unwrap();

        let group_dir = dir.path().join("gemtext/test-source");
        let index = std::fs::read_to_string(group_dir.join("index.gmi")).unwrap();
        assert!(index.contains("Test Source"));
        assert!(index.contains("First"));
        assert!(index.contains("=> 001-first.gmi"));
        assert!(index.contains("2026-02-16"));

        let files: Vec<_> = std::fs::read_dir(&group_dir).unwrap().collect();
        assert_eq!(files.len(), 3, "index + 2 articles");
    }

    #[tokio::test]
    async fn article_has_content_author_and_source_link() {
        let dir = tempfile::tempdir().unwrap();
        let edition = sample_edition();
        render(&edition, dir.path()).await.unwrap();

        let article = std::fs::read_to_string(
            dir.path().join("gemtext/test-source/002-second.gmi"),
        )
        .unwrap();
        assert!(article.contains("Article body here"));
        assert!(article.contains("testuser"));
        assert!(article.contains("=> https://example.com/test_source:2 Source"));
    }

    #[tokio::test]
    async fn local_image_paths_are_relocated() {
        let dir = tempfile::tempdir().unwrap();
        let mut edition = sample_edition();
        edition.groups[0].items[0].body_html =
            r#"<img src="images/aabb.png" alt="pic">"#.to_string();
        render(&edition, dir.path()).await.unwrap();

        let article =
            std::fs::read_to_string(dir.path().join("gemtext/test-source/001-first.gmi")).unwrap();
        assert!(article.contains("=> ../../images/aabb.png pic"));
    }

    #[tokio::test]
    async fn empty_edition_renders_valid_index() {
        let dir = tempfile::tempdir().unwrap();
        render(&empty_edition(), dir.path()).await.unwrap();
        let index = std::fs::read_to_string(dir.path().join("gemtext/index.gmi")).unwrap();
        assert!(index.starts_with("# News for 2026-02-16"));
    }
}
