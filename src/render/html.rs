//! HTML renderer
//!
//! Layout under the run directory:
//!
//! ```text
//! html/index.html                  date index linking every source
//! html/<source>/index.html         per-source item list
//! html/<source>/NNN-title.html     one page per item
//! ```
//!
//! Pages sit two levels below the run directory, so localized image paths
//! are rewritten with a `../../` prefix.

use crate::error::RenderError;
use crate::types::{Edition, Item, SourceGroup};
use crate::utils::{article_stem, safe_slug};
use html_escape::encode_text;
use std::path::{Path, PathBuf};

const STYLE: &str = "body{max-width:42em;margin:1em auto;padding:0 1em;\
font-family:serif;line-height:1.5}img{max-width:100%}\
.meta{color:#555;font-size:0.9em}blockquote{border-left:3px solid #ccc;\
margin-left:0;padding-left:1em}pre{overflow-x:auto}";

/// Render the edition as browsable HTML; returns the format directory
pub async fn render(edition: &Edition, run_dir: &Path) -> Result<PathBuf, RenderError> {
    let fmt_dir = run_dir.join("html");

    for group in &edition.groups {
        let group_dir = fmt_dir.join(safe_slug(&group.source_id));
        create_dir(&group_dir).await?;

        write_file(&group_dir.join("index.html"), &source_index(group, edition)).await?;

        for (i, item) in group.items.iter().enumerate() {
            let page = article_page(item, group);
            let path = group_dir.join(format!("{}.html", article_stem(i + 1, &item.title)));
            write_file(&path, &page).await?;
        }
    }

    create_dir(&fmt_dir).await?;
    write_file(&fmt_dir.join("index.html"), &date_index(edition)).await?;

    Ok(fmt_dir)
}

fn page_shell(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        encode_text(title),
        STYLE,
        body
    )
}

fn date_index(edition: &Edition) -> String {
    let date = edition.date_str();
    let mut body = format!("<h1>News for {}</h1>\n<ul>\n", date);
    for group in &edition.groups {
        body.push_str(&format!(
            "<li><a href=\"{}/index.html\">{}</a> ({} articles)</li>\n",
            safe_slug(&group.source_id),
            encode_text(&group.display_name),
            group.items.len()
        ));
    }
    body.push_str("</ul>\n");
    if edition.groups.is_empty() {
        body.push_str("<p>No sources produced items for this edition.</p>\n");
    }
    page_shell(&format!("News for {}", date), &body)
}

fn source_index(group: &SourceGroup, edition: &Edition) -> String {
    let mut body = format!(
        "<h1>{}</h1>\n<p class=\"meta\">as of {}</p>\n<ol>\n",
        encode_text(&group.display_name),
        edition.date_str()
    );
    for (i, item) in group.items.iter().enumerate() {
        body.push_str(&format!(
            "<li><a href=\"{}.html\">{}</a> <span class=\"meta\">{}</span></li>\n",
            article_stem(i + 1, &item.title),
            encode_text(&item.title),
            item.display_date().format("%Y-%m-%d")
        ));
    }
    body.push_str("</ol>\n<p><a href=\"../index.html\">all sources</a></p>\n");
    page_shell(&group.display_name, &body)
}

fn article_page(item: &Item, group: &SourceGroup) -> String {
    let body_html = super::relocate_images(&item.body_html, 2);
    let source_link = if item.url.is_empty() {
        String::new()
    } else {
        format!(
            " | <a href=\"{}\">original</a>",
            html_escape::encode_double_quoted_attribute(&item.url)
        )
    };
    let body = format!(
        "<h1>{}</h1>\n<p class=\"meta\">{} | {} | {}{}</p>\n\
         <div class=\"article-body\">\n{}\n</div>\n\
         <p><a href=\"index.html\">back to {}</a></p>\n",
        encode_text(&item.title),
        encode_text(&item.author),
        item.display_date().format("%Y-%m-%d %H:%M UTC"),
        encode_text(&group.display_name),
        source_link,
        body_html,
        encode_text(&group.display_name),
    );
    page_shell(&item.title, &body)
}

async fn create_dir(path: &Path) -> Result<(), RenderError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| RenderError::Io {
            format: "html",
            path: path.to_path_buf(),
            cause: e,
        })
}

async fn write_file(path: &Path, content: &str) -> Result<(), RenderError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|e| RenderError::Io {
            format: "html",
            path: path.to_path_buf(),
            cause: e,
        })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::{empty_edition, sample_edition};

    #[tokio::test]
    async fn creates_index_and_article_pages() {
        let dir = tempfile::tempdir().unwrap();
        let edition = sample_edition();
        render(&edition, dir.path()).await.unwrap();

        let source_dir = dir.path().join("html/test-source");
        let index = std::fs::read_to_string(source_dir.join("index.html")).unwrap();
        assert!(index.contains("Test Source"));
        assert!(index.contains("First"));
        assert!(index.contains("Second"));
        assert!(index.contains("2026-02-16"));

        let pages: Vec<_> = std::fs::read_dir(&source_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "index.html")
            .collect();
        assert_eq!(pages.len(), 2);
    }

    #[tokio::test]
    async fn article_page_has_content_meta_and_back_link() {
        let dir = tempfile::tempdir().unwrap();
        let edition = sample_edition();
        render(&edition, dir.path()).await.unwrap();

        let page = std::fs::read_to_string(
            dir.path().join("html/test-source/002-second.html"),
        )
        .unwrap();
        assert!(page.contains("Article body here"));
        assert!(page.contains("testuser"));
        assert!(page.contains("example.com"));
        assert!(page.contains("index.html"));
    }

    #[tokio::test]
    async fn date_index_links_every_source() {
        let dir = tempfile::tempdir().unwrap();
        let edition = sample_edition();
        render(&edition, dir.path()).await.unwrap();

        let index = std::fs::read_to_string(dir.path().join("html/index.html")).unwrap();
        assert!(index.contains("test-source/index.html"));
        assert!(index.contains("2 articles"));
    }

    #[tokio::test]
    async fn empty_edition_renders_a_valid_document() {
        let dir = tempfile::tempdir().unwrap();
        render(&empty_edition(), dir.path()).await.unwrap();

        let index = std::fs::read_to_string(dir.path().join("html/index.html")).unwrap();
        assert!(index.contains("No sources produced items"));
    }

    #[tokio::test]
    async fn rendering_twice_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let edition = sample_edition();
        render(&edition, dir.path()).await.unwrap();
        let first =
            std::fs::read_to_string(dir.path().join("html/test-source/001-first.html")).unwrap();
        render(&edition, dir.path()).await.unwrap();
        let second =
            std::fs::read_to_string(dir.path().join("html/test-source/001-first.html")).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn localized_images_resolve_from_page_depth() {
        let dir = tempfile::tempdir().unwrap();
        let mut edition = sample_edition();
        edition.groups[0].items[0].body_html =
            r#"<p><img src="images/0011223344556677.png" alt="x"></p>"#.to_string();
        render(&edition, dir.path()).await.unwrap();

        let page =
            std::fs::read_to_string(dir.path().join("html/test-source/001-first.html")).unwrap();
        assert!(page.contains(r#"src="../../images/0011223344556677.png""#));
    }

    #[tokio::test]
    async fn titles_are_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let mut edition = sample_edition();
        edition.groups[0].items[0].title = "Tags <b> & stuff".to_string();
        render(&edition, dir.path()).await.unwrap();

        let index =
            std::fs::read_to_string(dir.path().join("html/test-source/index.html")).unwrap();
        assert!(index.contains("Tags &lt;b&gt; &amp; stuff"));
    }
}
