//! EPUB renderer
//!
//! One packaged volume per run. Uses the `epub-builder` crate, which handles
//! the packaging requirements (OPF manifest, navigation, ZIP structure with
//! proper MIME type). Each item becomes its own XHTML chapter for efficient
//! navigation on e-readers, and every localized image is embedded as a
//! package-internal resource so the book works fully offline.

use crate::error::RenderError;
use crate::types::{Edition, Item};
use epub_builder::{EpubBuilder, EpubContent, ReferenceType, ZipLibrary};
use html_escape::encode_text;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

const STYLESHEET: &str = "body{font-family:serif;line-height:1.4}\
img{max-width:100%}.meta{color:#555;font-size:0.9em}\
blockquote{border-left:3px solid #ccc;margin-left:0;padding-left:1em}";

/// Render the edition as a single EPUB; returns the artifact path
pub async fn render(edition: &Edition, run_dir: &Path) -> Result<PathBuf, RenderError> {
    let bytes = build_epub(edition, run_dir)?;

    let path = run_dir.join(format!("edition-{}.epub", edition.date_str()));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| RenderError::Io {
            format: "epub",
            path: path.clone(),
            cause: e,
        })?;
    Ok(path)
}

fn build_epub(edition: &Edition, run_dir: &Path) -> Result<Vec<u8>, RenderError> {
    let zip = ZipLibrary::new().map_err(packaging)?;
    let mut builder = EpubBuilder::new(zip).map_err(packaging)?;

    builder
        .metadata("title", format!("News edition {}", edition.date_str()))
        .map_err(packaging)?;
    builder.metadata("author", "inkbound").map_err(packaging)?;
    builder.metadata("lang", "en").map_err(packaging)?;
    builder
        .metadata(
            "description",
            format!(
                "{} articles from {} sources",
                edition.item_count(),
                edition.groups.len()
            ),
        )
        .map_err(packaging)?;
    builder
        .stylesheet(STYLESHEET.as_bytes())
        .map_err(packaging)?;
    builder.inline_toc();

    builder
        .add_content(
            EpubContent::new("title.xhtml", title_page(edition).as_bytes())
                .title(format!("News edition {}", edition.date_str()))
                .reftype(ReferenceType::TitlePage),
        )
        .map_err(packaging)?;

    // embed each stored image once, no matter how many chapters use it
    let mut embedded: HashSet<String> = HashSet::new();
    for group in &edition.groups {
        for item in &group.items {
            for image in &item.images {
                let Some(rel_path) = image.local_path.as_deref() else {
                    continue;
                };
                if !embedded.insert(rel_path.to_string()) {
                    continue;
                }
                match std::fs::read(run_dir.join(rel_path)) {
                    Ok(bytes) => {
                        builder
                            .add_resource(rel_path, bytes.as_slice(), media_type(rel_path))
                            .map_err(packaging)?;
                    }
                    Err(e) => {
                        warn!(path = rel_path, error = %e, "stored image missing, chapter keeps a dangling ref");
                    }
                }
            }
        }
    }

    for group in &edition.groups {
        let section_file = format!("{}.xhtml", crate::utils::safe_slug(&group.source_id));
        builder
            .add_content(
                EpubContent::new(section_file, section_page(group, edition).as_bytes())
                    .title(group.display_name.clone())
                    .reftype(ReferenceType::Text),
            )
            .map_err(packaging)?;

        for (i, item) in group.items.iter().enumerate() {
            let file = format!(
                "{}-{}.xhtml",
                crate::utils::safe_slug(&group.source_id),
                crate::utils::article_stem(i + 1, &item.title)
            );
            builder
                .add_content(
                    EpubContent::new(file, chapter(item).as_bytes())
                        .title(item.title.clone())
                        .level(2),
                )
                .map_err(packaging)?;
        }
    }

    let mut bytes = Vec::new();
    builder.generate(&mut bytes).map_err(packaging)?;
    Ok(bytes)
}

fn packaging<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Packaging {
        format: "epub",
        reason: e.to_string(),
    }
}

fn xhtml_shell(title: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE html>\n\
         <html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head>\n\
         <title>{}</title>\n\
         <link rel=\"stylesheet\" type=\"text/css\" href=\"stylesheet.css\"/>\n\
         </head>\n<body>\n{}\n</body>\n</html>\n",
        encode_text(title),
        body
    )
}

fn title_page(edition: &Edition) -> String {
    let mut body = format!(
        "<h1>News edition</h1>\n<p class=\"meta\">as of {}</p>\n<ul>\n",
        edition.timestamp.format("%Y-%m-%d %H:%M UTC")
    );
    for group in &edition.groups {
        body.push_str(&format!(
            "<li>{}: {} articles</li>\n",
            encode_text(&group.display_name),
            group.items.len()
        ));
    }
    body.push_str("</ul>\n");
    if edition.groups.is_empty() {
        body.push_str("<p>No sources produced items for this edition.</p>\n");
    }
    xhtml_shell("News edition", &body)
}

fn section_page(group: &crate::types::SourceGroup, edition: &Edition) -> String {
    let body = format!(
        "<h1>{}</h1>\n<p class=\"meta\">{} articles, {}</p>\n",
        encode_text(&group.display_name),
        group.items.len(),
        edition.date_str()
    );
    xhtml_shell(&group.display_name, &body)
}

fn chapter(item: &Item) -> String {
    let source_line = if item.url.is_empty() {
        String::new()
    } else {
        format!(
            "<p class=\"meta\"><a href=\"{}\">original</a></p>\n",
            html_escape::encode_double_quoted_attribute(&item.url)
        )
    };
    let body = format!(
        "<h1>{}</h1>\n<p class=\"meta\">{} | {}</p>\n{}{}\n",
        encode_text(&item.title),
        encode_text(&item.author),
        item.display_date().format("%Y-%m-%d %H:%M UTC"),
        source_line,
        item.body_html
    );
    xhtml_shell(&item.title, &body)
}

fn media_type(rel_path: &str) -> &'static str {
    let lower = rel_path.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".svg") {
        "image/svg+xml"
    } else {
        "application/octet-stream"
    }
}
