//! Format renderers
//!
//! Five independent encodings of one immutable [`Edition`]. Renderers never
//! communicate, never mutate the edition, and are all attempted even when
//! one fails; the render stage runs strictly after the edition is finalized.

pub mod epub;
pub mod gemtext;
pub mod html;
pub mod markdown;
pub mod sleepscreen;

pub use sleepscreen::{CliRasterEngine, RasterEngine};

use crate::config::SleepscreenConfig;
use crate::error::RenderError;
use crate::types::{Edition, OutputFormat, RenderResult};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Everything a renderer needs besides the edition itself
pub struct RenderContext {
    /// The dated run directory; artifacts and the image store live under it
    pub run_dir: PathBuf,

    /// Raster output settings
    pub sleepscreen: SleepscreenConfig,

    /// Raster engine override; `None` means discover the CLI engine at
    /// render time (and fail that one format gracefully when absent)
    pub engine: Option<Arc<dyn RasterEngine>>,
}

/// Render every requested format as a bounded-parallel batch
///
/// Results come back in requested order. A failed format is recorded and the
/// rest continue; a cancelled run stops starting new renderers so no partial
/// artifacts appear for formats still pending.
pub async fn render_all(
    edition: &Edition,
    formats: &[OutputFormat],
    workers: usize,
    ctx: &RenderContext,
    cancel: &CancellationToken,
) -> Vec<RenderResult> {
    stream::iter(formats.iter().copied())
        .map(|format| async move {
            if cancel.is_cancelled() {
                return RenderResult {
                    format,
                    artifact: None,
                    error: Some("cancelled before rendering started".to_string()),
                };
            }
            match render_one(edition, format, ctx).await {
                Ok(artifact) => {
                    info!(format = %format, artifact = %artifact.display(), "rendered");
                    RenderResult {
                        format,
                        artifact: Some(artifact),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(format = %format, error = %e, "renderer failed, continuing");
                    cleanup_partial(format, &ctx.run_dir).await;
                    RenderResult {
                        format,
                        artifact: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .buffered(workers.max(1))
        .collect()
        .await
}

async fn render_one(
    edition: &Edition,
    format: OutputFormat,
    ctx: &RenderContext,
) -> Result<PathBuf, RenderError> {
    match format {
        OutputFormat::Html => html::render(edition, &ctx.run_dir).await,
        OutputFormat::Markdown => markdown::render(edition, &ctx.run_dir).await,
        OutputFormat::Gemtext => gemtext::render(edition, &ctx.run_dir).await,
        OutputFormat::Epub => epub::render(edition, &ctx.run_dir).await,
        OutputFormat::Sleepscreen => {
            sleepscreen::render(edition, &ctx.run_dir, &ctx.sleepscreen, ctx.engine.clone()).await
        }
    }
}

/// A failed directory-based renderer leaves no half-written tree behind;
/// single-file formats write their artifact last and need no cleanup
async fn cleanup_partial(format: OutputFormat, run_dir: &Path) {
    match format {
        OutputFormat::Html | OutputFormat::Markdown | OutputFormat::Gemtext => {
            let dir = run_dir.join(format.name());
            if dir.exists() {
                let _ = tokio::fs::remove_dir_all(&dir).await;
            }
        }
        OutputFormat::Epub | OutputFormat::Sleepscreen => {}
    }
}

/// Prefix that resolves `images/...` store paths from a page nested
/// `depth` directories below the run directory
pub(crate) fn rel_prefix(depth: usize) -> String {
    "../".repeat(depth)
}

/// Rewrite localized body image paths for a page at the given depth
pub(crate) fn relocate_images(body_html: &str, depth: usize) -> String {
    let prefix = rel_prefix(depth);
    crate::sources::rewrite_image_srcs(body_html, |src| {
        src.starts_with("images/")
            .then(|| format!("{}{}", prefix, src))
    })
}
