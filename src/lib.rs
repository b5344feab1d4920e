//! # inkbound
//!
//! Offline news edition builder: fetch items from heterogeneous news
//! sources, normalize them into one content model, localize every embedded
//! image, and render the result into offline-readable formats (HTML,
//! Markdown, Gemtext, EPUB, and a rasterized sleep screen for e-ink
//! devices).
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Partial-failure tolerant** - one malformed entry, failed image,
//!   dead source, or broken renderer never takes down its siblings
//! - **Two explicit stages** - bounded-parallel fetch/localize produces an
//!   immutable edition; rendering consumes it read-only
//!
//! ## Quick Start
//!
//! ```no_run
//! use inkbound::{Config, Pipeline, SourceConfig, SourceKind};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut feed = SourceConfig::new("hn", SourceKind::HackerNews);
//!     feed.display_name = Some("Hacker News".to_string());
//!
//!     let config = Config {
//!         sources: vec![feed],
//!         ..Default::default()
//!     };
//!
//!     let pipeline = Pipeline::new(config)?;
//!     let report = pipeline.run(CancellationToken::new()).await?;
//!
//!     std::process::exit(if report.is_success() { 0 } else { 1 });
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Asset localization and the content-addressed image store
pub mod assets;
/// Configuration types
pub mod config;
/// Edition building
pub mod edition;
/// Error types
pub mod error;
/// Fetch orchestration
pub mod orchestrator;
/// Pipeline facade
pub mod pipeline;
/// Format renderers
pub mod render;
/// Retry logic with exponential backoff
pub mod retry;
/// Source adapters
pub mod sources;
/// HTML to plain text conversion
pub mod textify;
/// Canonical content model and run bookkeeping
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{
    Config, HttpConfig, RetryConfig, SleepscreenConfig, SourceConfig, SourceOptions,
    UndatedPolicy, WorkerConfig,
};
pub use error::{AssetError, Error, RenderError, Result, SourceFetchError};
pub use pipeline::Pipeline;
pub use render::{CliRasterEngine, RasterEngine};
pub use types::{
    Edition, FetchOutcome, ImageRef, Item, OutputFormat, RenderResult, RunReport, SourceGroup,
    SourceKind, SourceStatus,
};

use tokio_util::sync::CancellationToken;

/// Run the pipeline with graceful signal handling
///
/// Waits for a termination signal in the background and cancels the run
/// when one arrives; in-flight work observes the cancellation promptly and
/// no partial artifacts are left for formats still in progress.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Errors
/// Whatever [`Pipeline::run`] returns, including [`Error::Cancelled`] when
/// a signal interrupted the run.
pub async fn run_with_shutdown(pipeline: &Pipeline) -> Result<RunReport> {
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    let signal_task = tokio::spawn(async move {
        wait_for_signal().await;
        signal_cancel.cancel();
    });

    let result = pipeline.run(cancel).await;
    signal_task.abort();
    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
