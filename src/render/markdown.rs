//! Markdown renderer
//!
//! Mirrors the HTML layout with `.md` files. Body HTML is translated to
//! markdown: headings, links, images, quotes, lists, and code fences carry
//! over; inline styling is flattened to text.

use crate::error::RenderError;
use crate::textify;
use crate::types::{Edition, Item, SourceGroup};
use crate::utils::{article_stem, safe_slug};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static PRE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<pre[^>]*>(.*?)</pre>").expect("pre pattern compiles"));
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<h([1-6])[^>]*>(.*?)</h[1-6]>").expect("heading pattern compiles")
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

/// Convert body HTML to markdown text
pub fn html_to_markdown(html: &str) -> String {
    let text = textify::strip_script_style(html);

    let mut fences: Vec<String> = Vec::new();
    let text = PRE_RE
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let inner = textify::strip_tags_keep_ws(&caps[1]);
            fences.push(format!("\n```\n{}\n```\n", inner.trim_matches('\n')));
            format!("\u{0}{}\u{0}", fences.len() - 1)
        })
        .into_owned();

    let text = HEADING_RE.replace_all(&text, |c: &regex::Captures<'_>| {
        let level: usize = c[1].parse().unwrap_or(1);
        format!(
            "\n{} {}\n",
            "#".repeat(level),
            textify::strip_tags(&c[2])
        )
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
            .unwrap_or_default();
        format!("\n![{}]({})\n", alt, src)
    });
    let text = LINK_RE.replace_all(&text, |c: &regex::Captures<'_>| {
        format!("[{}]({})", textify::strip_tags(&c[2]), &c[1])
    });
    let text = LI_RE.replace_all(&text, "\n- ");
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

fn tidy(text: &str) -> String {
    let joined: String = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    BLANKS_RE
        .replace_all(&joined, "\n\n")
        .trim_matches('\n')
        .to_string()
}

/// Render the edition as markdown; returns the format directory
pub async fn render(edition: &Edition, run_dir: &Path) -> Result<PathBuf, RenderError> {
    let fmt_dir = run_dir.join("markdown");

    for group in &edition.groups {
        let group_dir = fmt_dir.join(safe_slug(&group.source_id));
        create_dir(&group_dir).await?;

        write_file(&group_dir.join("index.md"), &source_index(group, edition)).await?;

        for (i, item) in group.items.iter().enumerate() {
            let path = group_dir.join(format!("{}.md", article_stem(i + 1, &item.title)));
            write_file(&path, &article_md(item, group)).await?;
        }
    }

    create_dir(&fmt_dir).await?;
    write_file(&fmt_dir.join("index.md"), &date_index(edition)).await?;

    Ok(fmt_dir)
}

fn date_index(edition: &Edition) -> String {
    let mut out = format!("# News for {}\n\n", edition.date_str());
    for group in &edition.groups {
        out.push_str(&format!(
            "- [{}]({}/index.md) ({} articles)\n",
            group.display_name,
            safe_slug(&group.source_id),
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
        "# {}\n\nas of {}\n\n",
        group.display_name,
        edition.date_str()
    );
    for (i, item) in group.items.iter().enumerate() {
        out.push_str(&format!(
            "{}. [{}]({}.md) ({})\n",
            i + 1,
            item.title,
            article_stem(i + 1, &item.title),
            item.display_date().format("%Y-%m-%d")
        ));
    }
    out.push_str("\n[all sources](../index.md)\n");
    out
}

fn article_md(item: &Item, group: &SourceGroup) -> String {
    let mut out = format!(
        "# {}\n\n*{} | {} | {}*\n\n",
        item.title,
        item.author,
        item.display_date().format("%Y-%m-%d %H:%M UTC"),
        group.display_name
    );
    if !item.url.is_empty() {
        out.push_str(&format!("[original]({})\n\n", item.url));
    }

    let body = html_to_markdown(&item.body_html).replace("](images/", "](../../images/");
    out.push_str(&body);
    out.push_str("\n\n[back](index.md)\n");
    out
}

async fn create_dir(path: &Path) -> Result<(), RenderError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| RenderError::Io {
            format: "markdown",
            path: path.to_path_buf(),
            cause: e,
        })
}

async fn write_file(path: &Path, content: &str) -> Result<(), RenderError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|e| RenderError::Io {
            format: "markdown",
            path: path.to_path_buf(),
            cause: e,
        })
}
