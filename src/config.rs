//! Configuration types for inkbound
//!
//! The pipeline consumes a [`Config`] as an opaque validated value; loading
//! it from TOML/JSON and wiring it to a CLI is the embedder's job. Every
//! field has a serde default so partial configurations deserialize cleanly.

use crate::error::{Error, Result};
use crate::types::{OutputFormat, SourceKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a pipeline run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Sources to ingest, in output order
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Root output directory; each run writes into a dated subdirectory
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Output formats to render (default: all five)
    #[serde(default = "default_output_formats")]
    pub output_formats: Vec<OutputFormat>,

    /// Worker pool sizes for the fetch and render stages
    #[serde(default)]
    pub workers: WorkerConfig,

    /// Retry behavior for network-bound operations
    #[serde(default)]
    pub retry: RetryConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Placement of items that carry no publication timestamp
    #[serde(default)]
    pub undated_items: UndatedPolicy,

    /// Settings for the rasterized e-ink output
    #[serde(default)]
    pub sleepscreen: SleepscreenConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            output_dir: default_output_dir(),
            output_formats: default_output_formats(),
            workers: WorkerConfig::default(),
            retry: RetryConfig::default(),
            http: HttpConfig::default(),
            undated_items: UndatedPolicy::default(),
            sleepscreen: SleepscreenConfig::default(),
        }
    }
}

impl Config {
    /// Validate cross-field constraints the type system cannot express
    ///
    /// # Errors
    /// Returns [`Error::Config`] on duplicate source ids, an RSS source
    /// without a feed URL, or a zero-sized worker pool.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.id.as_str()) {
                return Err(Error::Config {
                    message: format!("duplicate source id: {}", source.id),
                    key: Some("sources.id".to_string()),
                });
            }
            if source.kind == SourceKind::Rss && source.options.url.is_none() {
                return Err(Error::Config {
                    message: format!("rss source {} has no feed url", source.id),
                    key: Some("sources.url".to_string()),
                });
            }
        }
        if self.workers.source_workers == 0
            || self.workers.asset_workers == 0
            || self.workers.render_workers == 0
        {
            return Err(Error::Config {
                message: "worker pool sizes must be at least 1".to_string(),
                key: Some("workers".to_string()),
            });
        }
        Ok(())
    }

    /// Sources that are enabled for this run, in configuration order
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

/// One configured source
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Unique identifier, used for grouping and item id qualification
    pub id: String,

    /// Which adapter handles this source
    pub kind: SourceKind,

    /// Human-readable label (defaults to `id`)
    #[serde(default)]
    pub display_name: Option<String>,

    /// Disabled sources are skipped without appearing in the summary
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Source-specific knobs
    #[serde(default)]
    pub options: SourceOptions,
}

impl SourceConfig {
    /// Create a source with default options
    pub fn new(id: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            display_name: None,
            enabled: true,
            options: SourceOptions::default(),
        }
    }

    /// The label to show in rendered output
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// Source-specific options
///
/// A single struct carries the union of per-kind knobs; each adapter reads
/// the fields it understands and ignores the rest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceOptions {
    /// Feed URL (required for `Rss` sources)
    #[serde(default)]
    pub url: Option<String>,

    /// Override for the source's API base URL (used by tests; `None` means
    /// the adapter's production endpoints)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// How many front-page stories to take from the aggregator
    #[serde(default = "default_top_stories")]
    pub top_stories: usize,

    /// Whether to include discussion comments in the item body
    #[serde(default = "default_true")]
    pub include_comments: bool,

    /// Maximum comment nesting depth to keep
    #[serde(default = "default_max_comment_depth")]
    pub max_comment_depth: usize,

    /// Maximum comments kept per nesting level
    #[serde(default = "default_max_comments_per_level")]
    pub max_comments_per_level: usize,

    /// Curated-news categories to pull (empty means none)
    #[serde(default)]
    pub categories: Vec<String>,

    /// Language code for the curated news API
    #[serde(default = "default_language")]
    pub language: String,

    /// Story cap per curated-news category
    #[serde(default = "default_max_stories")]
    pub max_stories_per_category: usize,

    /// Entry cap for feed sources
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            url: None,
            endpoint: None,
            top_stories: default_top_stories(),
            include_comments: true,
            max_comment_depth: default_max_comment_depth(),
            max_comments_per_level: default_max_comments_per_level(),
            categories: Vec::new(),
            language: default_language(),
            max_stories_per_category: default_max_stories(),
            max_articles: default_max_articles(),
        }
    }
}

/// Worker pool sizes, independently configurable per stage
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Parallel source fetches (default: 4)
    #[serde(default = "default_source_workers")]
    pub source_workers: usize,

    /// Parallel asset downloads (default: 8)
    #[serde(default = "default_asset_workers")]
    pub asset_workers: usize,

    /// Parallel format renders (default: 2)
    #[serde(default = "default_render_workers")]
    pub render_workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            source_workers: default_source_workers(),
            asset_workers: default_asset_workers(),
            render_workers: default_render_workers(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// HTTP client settings shared by all adapters and the asset localizer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout (default: 30 seconds)
    #[serde(default = "default_http_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Image download size cap in bytes (default: 10 MiB)
    #[serde(default = "default_max_asset_bytes")]
    pub max_asset_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_http_timeout(),
            user_agent: default_user_agent(),
            max_asset_bytes: default_max_asset_bytes(),
        }
    }
}

/// Placement of items without a publication timestamp
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndatedPolicy {
    /// Leave undated items where the adapter placed them (default)
    #[default]
    SourceOrder,
    /// Stably move undated items after dated siblings within their source
    SortLast,
}

/// Settings for the rasterized sleep-screen output
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SleepscreenConfig {
    /// Raster width in pixels (default: 480)
    #[serde(default = "default_screen_width")]
    pub width: u32,

    /// Raster height in pixels (default: 800)
    #[serde(default = "default_screen_height")]
    pub height: u32,

    /// How many leading items get a full excerpt card (default: 2)
    #[serde(default = "default_spotlight_count")]
    pub spotlight_count: usize,

    /// Headline cap per source card (default: 10)
    #[serde(default = "default_max_headlines")]
    pub max_headlines_per_card: usize,

    /// Excerpt length cap in characters (default: 350)
    #[serde(default = "default_max_excerpt_chars")]
    pub max_excerpt_chars: usize,

    /// Explicit path to the raster engine binary (default: search PATH)
    #[serde(default)]
    pub engine_path: Option<PathBuf>,
}

impl Default for SleepscreenConfig {
    fn default() -> Self {
        Self {
            width: default_screen_width(),
            height: default_screen_height(),
            spotlight_count: default_spotlight_count(),
            max_headlines_per_card: default_max_headlines(),
            max_excerpt_chars: default_max_excerpt_chars(),
            engine_path: None,
        }
    }
}

// Serde helpers -------------------------------------------------------------

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_output_formats() -> Vec<OutputFormat> {
    vec![
        OutputFormat::Html,
        OutputFormat::Markdown,
        OutputFormat::Gemtext,
        OutputFormat::Epub,
        OutputFormat::Sleepscreen,
    ]
}

fn default_top_stories() -> usize {
    30
}

fn default_max_comment_depth() -> usize {
    3
}

fn default_max_comments_per_level() -> usize {
    10
}

fn default_language() -> String {
    "en".to_string()
}

fn default_max_stories() -> usize {
    50
}

fn default_max_articles() -> usize {
    30
}

fn default_source_workers() -> usize {
    4
}

fn default_asset_workers() -> usize {
    8
}

fn default_render_workers() -> usize {
    2
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("inkbound/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_asset_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_screen_width() -> u32 {
    480
}

fn default_screen_height() -> u32 {
    800
}

fn default_spotlight_count() -> usize {
    2
}

fn default_max_headlines() -> usize {
    10
}

fn default_max_excerpt_chars() -> usize {
    350
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_all_formats_and_sane_pools() {
        let config = Config::default();
        assert_eq!(config.output_formats.len(), 5);
        assert!(config.workers.source_workers >= 1);
        assert!(config.workers.asset_workers >= 1);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.retry.jitter);
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.sleepscreen.width, 480);
        assert_eq!(config.sleepscreen.height, 800);
        assert_eq!(config.http.max_asset_bytes, 10 * 1024 * 1024);
        assert_eq!(config.undated_items, UndatedPolicy::SourceOrder);
    }

    #[test]
    fn retry_config_round_trips_durations_as_seconds() {
        let retry = RetryConfig::default();
        let json = serde_json::to_value(retry).unwrap();
        assert_eq!(json["initial_delay"], 1);
        assert_eq!(json["max_delay"], 60);

        let back: RetryConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.initial_delay, Duration::from_secs(1));
        assert_eq!(back.max_delay, Duration::from_secs(60));
    }

    #[test]
    fn validate_rejects_duplicate_source_ids() {
        let config = Config {
            sources: vec![
                SourceConfig::new("feed", SourceKind::HackerNews),
                SourceConfig::new("feed", SourceKind::KagiNews),
            ],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate source id"));
    }

    #[test]
    fn validate_rejects_rss_without_url() {
        let config = Config {
            sources: vec![SourceConfig::new("blog", SourceKind::Rss)],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("no feed url"));
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let config = Config {
            workers: WorkerConfig {
                source_workers: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn enabled_sources_skips_disabled() {
        let mut disabled = SourceConfig::new("off", SourceKind::Rss);
        disabled.enabled = false;
        let config = Config {
            sources: vec![SourceConfig::new("on", SourceKind::HackerNews), disabled],
            ..Default::default()
        };
        let ids: Vec<_> = config.enabled_sources().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["on"]);
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let mut source = SourceConfig::new("hackernews", SourceKind::HackerNews);
        assert_eq!(source.display_name(), "hackernews");
        source.display_name = Some("Hacker News".to_string());
        assert_eq!(source.display_name(), "Hacker News");
    }
}
