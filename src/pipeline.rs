//! Pipeline facade
//!
//! Ties the stages together: fetch and localize (orchestrator), freeze
//! (edition builder), render (format batch), report. The run is an explicit
//! value chain; there is no shared mutable "current run" state, so any
//! intermediate value can be constructed directly in a test.

use crate::assets::AssetStore;
use crate::config::Config;
use crate::edition;
use crate::error::{Error, Result};
use crate::orchestrator;
use crate::render::{self, RasterEngine, RenderContext};
use crate::sources;
use crate::types::{RunReport, SourceStatus};
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One configured pipeline; each [`run`](Pipeline::run) produces one dated
/// archive under the output directory and a [`RunReport`]
pub struct Pipeline {
    config: Arc<Config>,
    client: reqwest::Client,
    engine: Option<Arc<dyn RasterEngine>>,
}

impl Pipeline {
    /// Validate the configuration and build the shared HTTP client
    ///
    /// # Errors
    /// [`Error::Config`] when the configuration fails validation.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = sources::build_client(&config.http)?;
        Ok(Self {
            config: Arc::new(config),
            client,
            engine: None,
        })
    }

    /// Substitute the raster engine (tests, alternative engines)
    #[must_use]
    pub fn with_raster_engine(mut self, engine: Arc<dyn RasterEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// The validated configuration this pipeline runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute one run: fetch, localize, build the edition, render every
    /// requested format
    ///
    /// Per-source and per-format failures are recorded in the report, never
    /// propagated; use [`RunReport::is_success`] for the exit status.
    ///
    /// # Errors
    /// [`Error::Cancelled`] when the token fires mid-run, or [`Error::Io`]
    /// when the run directory cannot be created.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunReport> {
        let timestamp = Utc::now();
        let run_dir = self
            .config
            .output_dir
            .join(timestamp.format("%Y-%m-%d").to_string());
        tokio::fs::create_dir_all(&run_dir).await?;

        info!(
            run_dir = %run_dir.display(),
            sources = self.config.enabled_sources().count(),
            formats = self.config.output_formats.len(),
            "run starting"
        );

        let store = AssetStore::new(
            run_dir.clone(),
            self.client.clone(),
            self.config.retry,
            self.config.http.max_asset_bytes,
        );

        let outcomes = orchestrator::fetch_all(&self.client, &self.config, &store, &cancel).await?;

        let edition = edition::build(&outcomes, timestamp, self.config.undated_items);
        info!(
            items = edition.item_count(),
            sources_ok = edition.groups.len(),
            sources_failed = outcomes.iter().filter(|o| o.result.is_err()).count(),
            asset_failures = store.failure_count(),
            "edition assembled"
        );

        let ctx = RenderContext {
            run_dir,
            sleepscreen: self.config.sleepscreen.clone(),
            engine: self.engine.clone(),
        };
        let renders = render::render_all(
            &edition,
            &self.config.output_formats,
            self.config.workers.render_workers,
            &ctx,
            &cancel,
        )
        .await;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let sources = outcomes
            .iter()
            .map(|outcome| SourceStatus {
                source_id: outcome.source_id.clone(),
                items: outcome.result.as_ref().map(Vec::len).unwrap_or(0),
                error: outcome.result.as_ref().err().map(ToString::to_string),
            })
            .collect();

        let report = RunReport {
            timestamp,
            sources,
            renders,
            item_count: edition.item_count(),
            asset_failures: store.failure_count(),
        };
        info!(success = report.is_success(), "run finished");
        Ok(report)
    }
}
