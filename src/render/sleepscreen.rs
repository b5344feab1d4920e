//! Sleep-screen renderer
//!
//! Composes a fixed-dimension, grayscale-friendly HTML card layout (a few
//! spotlight items with excerpts, then headline lists per source) and drives
//! an external HTML-to-raster engine to produce the final image for e-ink
//! status screens.
//!
//! The engine is modeled as a trait with a CLI implementation so tests can
//! substitute an in-process fake. The CLI engine is discovered via PATH at
//! render time; a missing binary fails this one format gracefully and never
//! the run.

use crate::config::SleepscreenConfig;
use crate::error::RenderError;
use crate::textify::html_to_plaintext;
use crate::types::{Edition, Item};
use async_trait::async_trait;
use html_escape::encode_text;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// External HTML-to-raster engine
///
/// The contract is scoped to one invocation: feed markup in, get raster
/// bytes out or an error. No engine lifecycle is managed beyond the call.
#[async_trait]
pub trait RasterEngine: Send + Sync {
    /// Short identifier for logs
    fn id(&self) -> &str;

    /// Render markup to raster bytes at the given dimensions
    async fn rasterize(&self, html: &str, width: u32, height: u32)
    -> Result<Vec<u8>, RenderError>;
}

/// CLI raster engine driving `wkhtmltoimage` (markup on stdin, PNG on stdout)
#[derive(Debug)]
pub struct CliRasterEngine {
    binary: PathBuf,
}

impl CliRasterEngine {
    /// Binary searched on PATH when no explicit path is configured
    pub const DEFAULT_BINARY: &'static str = "wkhtmltoimage";

    /// Locate the engine binary
    ///
    /// # Errors
    /// [`RenderError::EngineUnavailable`] when the binary cannot be found.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, RenderError> {
        let candidate: &Path = explicit.unwrap_or(Path::new(Self::DEFAULT_BINARY));
        let binary = which::which(candidate).map_err(|e| RenderError::EngineUnavailable {
            reason: format!("{}: {}", candidate.display(), e),
        })?;
        debug!(binary = %binary.display(), "raster engine found");
        Ok(Self { binary })
    }
}

#[async_trait]
impl RasterEngine for CliRasterEngine {
    fn id(&self) -> &str {
        Self::DEFAULT_BINARY
    }

    async fn rasterize(
        &self,
        html: &str,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, RenderError> {
        let mut child = tokio::process::Command::new(&self.binary)
            .args([
                "--quiet",
                "--width",
                &width.to_string(),
                "--height",
                &height.to_string(),
                "--format",
                "png",
                "-",
                "-",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RenderError::EngineUnavailable {
                reason: format!("failed to spawn {}: {}", self.binary.display(), e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(html.as_bytes())
                .await
                .map_err(|e| RenderError::EngineFailed {
                    reason: format!("writing markup to engine: {}", e),
                })?;
            // closing stdin signals end of input
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| RenderError::EngineFailed {
                reason: format!("waiting for engine: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::EngineFailed {
                reason: format!(
                    "exit status {}: {}",
                    output.status,
                    stderr.chars().take(200).collect::<String>()
                ),
            });
        }
        if output.stdout.is_empty() {
            return Err(RenderError::EngineFailed {
                reason: "engine produced no output".to_string(),
            });
        }
        Ok(output.stdout)
    }
}

/// Render the edition's sleep screen; returns the artifact path
pub async fn render(
    edition: &Edition,
    run_dir: &Path,
    config: &SleepscreenConfig,
    engine: Option<Arc<dyn RasterEngine>>,
) -> Result<PathBuf, RenderError> {
    let engine: Arc<dyn RasterEngine> = match engine {
        Some(engine) => engine,
        None => Arc::new(CliRasterEngine::discover(config.engine_path.as_deref())?),
    };

    let html = compose_html(edition, config);
    let bytes = engine
        .rasterize(&html, config.width, config.height)
        .await?;

    let path = run_dir.join(format!("sleepscreen-{}.png", edition.date_str()));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| RenderError::Io {
            format: "sleepscreen",
            path: path.clone(),
            cause: e,
        })?;
    Ok(path)
}

/// Build the fixed-dimension card layout fed to the raster engine
pub(crate) fn compose_html(edition: &Edition, config: &SleepscreenConfig) -> String {
    let mut body = format!(
        "<header><h1>{}</h1></header>\n",
        edition.timestamp.format("%A, %B %-d")
    );

    let spotlight: Vec<&Item> = edition
        .groups
        .iter()
        .flat_map(|g| g.items.iter())
        .take(config.spotlight_count)
        .collect();

    for item in &spotlight {
        let excerpt = if item.summary.is_empty() {
            html_to_plaintext(&item.body_html, Some(config.max_excerpt_chars))
        } else {
            crate::utils::truncate_words(&item.summary, config.max_excerpt_chars)
        };
        body.push_str(&format!(
            "<section class=\"spotlight\">\n<h2>{}</h2>\n<p class=\"excerpt\">{}</p>\n</section>\n",
            encode_text(&item.title),
            encode_text(&excerpt)
        ));
    }

    for group in &edition.groups {
        body.push_str(&format!(
            "<section class=\"card\">\n<h3>{}</h3>\n<ul>\n",
            encode_text(&group.display_name)
        ));
        for item in group.items.iter().take(config.max_headlines_per_card) {
            body.push_str(&format!("<li>{}</li>\n", encode_text(&item.title)));
        }
        body.push_str("</ul>\n</section>\n");
    }

    if edition.is_empty() {
        body.push_str("<p class=\"empty\">No news in this edition.</p>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n\
         body{{width:{}px;height:{}px;margin:0;padding:12px;box-sizing:border-box;\
         background:#fff;color:#000;font-family:serif;overflow:hidden}}\n\
         h1{{font-size:22px;border-bottom:2px solid #000;padding-bottom:4px}}\n\
         .spotlight h2{{font-size:17px;margin:8px 0 2px}}\n\
         .excerpt{{font-size:13px;color:#222;margin:0}}\n\
         .card h3{{font-size:15px;margin:10px 0 2px;border-bottom:1px solid #888}}\n\
         .card ul{{margin:2px 0;padding-left:16px;font-size:12px}}\n\
         </style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        config.width, config.height, body
    )
}
