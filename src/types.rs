//! Canonical content model and run bookkeeping types
//!
//! The pipeline is a value chain: source adapters produce [`Item`]s, the
//! orchestrator collects them into [`FetchOutcome`]s, the edition builder
//! freezes them into an [`Edition`], and renderers report [`RenderResult`]s.
//! The [`RunReport`] aggregates everything for the embedder's exit status.

use crate::error::SourceFetchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The closed set of supported source kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Discussion aggregator (front-page stories with comment trees)
    HackerNews,
    /// Curated news API (per-category story clusters with citations)
    KagiNews,
    /// Arbitrary RSS 2.0 or Atom feed
    Rss,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::HackerNews => write!(f, "hackernews"),
            SourceKind::KagiNews => write!(f, "kaginews"),
            SourceKind::Rss => write!(f, "rss"),
        }
    }
}

/// The closed set of output formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Structured markup: per-source index plus one page per item
    Html,
    /// Lightweight markup mirroring the HTML structure
    Markdown,
    /// Minimal hypertext for constrained readers
    Gemtext,
    /// Packaged e-book with embedded images
    Epub,
    /// Fixed-dimension raster for e-ink status screens
    Sleepscreen,
}

impl OutputFormat {
    /// Stable lowercase name, used for directories and error messages
    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Gemtext => "gemtext",
            OutputFormat::Epub => "epub",
            OutputFormat::Sleepscreen => "sleepscreen",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A reference to an embedded image
///
/// Adapters create refs with only `remote_url` set; the asset localizer
/// fills in `local_path` and `content_hash` once the bytes are stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// The image URL as found in the source content
    pub remote_url: String,

    /// Path relative to the run directory, e.g. `images/0a1b2c3d4e5f6071.png`
    #[serde(default)]
    pub local_path: Option<String>,

    /// Hex SHA-256 of the stored bytes
    #[serde(default)]
    pub content_hash: Option<String>,
}

impl ImageRef {
    /// A not-yet-localized reference
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            remote_url: url.into(),
            local_path: None,
            content_hash: None,
        }
    }

    /// Whether the localizer has resolved this reference to a stored file
    pub fn is_localized(&self) -> bool {
        self.local_path.is_some()
    }
}

/// One article/post in the canonical model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
    /// Source-qualified identifier, unique within an edition
    /// (e.g. `hackernews:39281450`)
    pub id: String,

    /// Which adapter produced this item
    pub kind: SourceKind,

    /// Item title
    pub title: String,

    /// Canonical URL of the underlying article or discussion
    pub url: String,

    /// Author or byline ("unknown" when the source carries none)
    pub author: String,

    /// Publication timestamp; absent items follow the configured policy
    pub published: Option<DateTime<Utc>>,

    /// When this run captured the item
    pub fetched: DateTime<Utc>,

    /// Plain-text summary
    pub summary: String,

    /// Renderable body content
    pub body_html: String,

    /// Embedded image references, in body order
    pub images: Vec<ImageRef>,

    /// Source-specific metadata (score, comment count, category, ...)
    /// as an open map; BTreeMap keeps render output deterministic
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Item {
    /// The timestamp renderers should display: publication date when known,
    /// otherwise the snapshot date
    pub fn display_date(&self) -> DateTime<Utc> {
        self.published.unwrap_or(self.fetched)
    }
}

/// All items from one source, in adapter-delivered order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceGroup {
    /// The source's configured identifier
    pub source_id: String,

    /// Human-readable source label
    pub display_name: String,

    /// Which adapter produced this group
    pub kind: SourceKind,

    /// Items in adapter-delivered order
    pub items: Vec<Item>,
}

/// The immutable snapshot of one run, consumed read-only by every renderer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Edition {
    /// Run timestamp, used for archive naming and "as of" text
    pub timestamp: DateTime<Utc>,

    /// Groups in configuration order
    pub groups: Vec<SourceGroup>,
}

impl Edition {
    /// The run date as `YYYY-MM-DD`, used in artifact names
    pub fn date_str(&self) -> String {
        self.timestamp.format("%Y-%m-%d").to_string()
    }

    /// Total item count across all groups
    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }

    /// Whether the run produced no items at all
    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }
}

/// Per-source fetch result, owned by the orchestrator for one run
#[derive(Debug)]
pub struct FetchOutcome {
    /// The source's configured identifier
    pub source_id: String,

    /// Human-readable source label
    pub display_name: String,

    /// Which adapter handled this source
    pub kind: SourceKind,

    /// Items on success, recorded failure reason otherwise
    pub result: std::result::Result<Vec<Item>, SourceFetchError>,
}

/// Per-source line in the run summary
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceStatus {
    /// The source's configured identifier
    pub source_id: String,

    /// Items that made it into the edition
    pub items: usize,

    /// Failure reason when the source was excluded
    pub error: Option<String>,
}

impl SourceStatus {
    /// Whether the source contributed to the edition
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-format line in the run summary
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderResult {
    /// Which format this result belongs to
    pub format: OutputFormat,

    /// Primary artifact path on success
    pub artifact: Option<PathBuf>,

    /// Failure reason when the renderer failed
    pub error: Option<String>,
}

impl RenderResult {
    /// Whether the format produced its artifact
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated outcome of one run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    /// Run timestamp (matches the edition's)
    pub timestamp: DateTime<Utc>,

    /// Per-source statuses, in configuration order
    pub sources: Vec<SourceStatus>,

    /// Per-format results, in requested order
    pub renders: Vec<RenderResult>,

    /// Items in the edition
    pub item_count: usize,

    /// Images that failed to localize after retries
    pub asset_failures: usize,
}

impl RunReport {
    /// Overall success: the edition is non-empty and at least one renderer
    /// produced its artifact. Drives the embedder's exit status.
    pub fn is_success(&self) -> bool {
        self.item_count > 0 && self.renders.iter().any(RenderResult::is_success)
    }

    /// Sources that were excluded from the edition
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceStatus> {
        self.sources.iter().filter(|s| !s.is_success())
    }

    /// Formats that failed to produce an artifact
    pub fn failed_renders(&self) -> impl Iterator<Item = &RenderResult> {
        self.renders.iter().filter(|r| !r.is_success())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(id: &str) -> Item {
        Item {
            id: id.to_string(),
            kind: SourceKind::Rss,
            title: "t".into(),
            url: "https://example.com".into(),
            author: "a".into(),
            published: None,
            fetched: Utc.with_ymd_and_hms(2026, 2, 16, 0, 0, 0).unwrap(),
            summary: String::new(),
            body_html: String::new(),
            images: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn display_date_falls_back_to_snapshot() {
        let mut it = item("feed:1");
        assert_eq!(it.display_date(), it.fetched);

        let published = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        it.published = Some(published);
        assert_eq!(it.display_date(), published);
    }

    #[test]
    fn edition_counts_across_groups() {
        let edition = Edition {
            timestamp: Utc.with_ymd_and_hms(2026, 2, 16, 6, 0, 0).unwrap(),
            groups: vec![
                SourceGroup {
                    source_id: "a".into(),
                    display_name: "A".into(),
                    kind: SourceKind::Rss,
                    items: vec![item("a:1"), item("a:2")],
                },
                SourceGroup {
                    source_id: "b".into(),
                    display_name: "B".into(),
                    kind: SourceKind::HackerNews,
                    items: vec![item("b:1")],
                },
            ],
        };
        assert_eq!(edition.item_count(), 3);
        assert!(!edition.is_empty());
        assert_eq!(edition.date_str(), "2026-02-16");
    }

    #[test]
    fn run_report_success_requires_items_and_one_render() {
        let ok_render = RenderResult {
            format: OutputFormat::Html,
            artifact: Some(PathBuf::from("out/html")),
            error: None,
        };
        let failed_render = RenderResult {
            format: OutputFormat::Sleepscreen,
            artifact: None,
            error: Some("engine unavailable".into()),
        };

        let report = RunReport {
            timestamp: Utc::now(),
            sources: vec![],
            renders: vec![ok_render.clone(), failed_render.clone()],
            item_count: 7,
            asset_failures: 0,
        };
        assert!(report.is_success());
        assert_eq!(report.failed_renders().count(), 1);

        let empty = RunReport {
            item_count: 0,
            ..report.clone()
        };
        assert!(!empty.is_success(), "empty edition is never a success");

        let all_renders_failed = RunReport {
            renders: vec![failed_render],
            ..report
        };
        assert!(!all_renders_failed.is_success());
    }

    #[test]
    fn image_ref_localization_state() {
        let mut img = ImageRef::remote("https://example.com/a.png");
        assert!(!img.is_localized());
        img.local_path = Some("images/0011223344556677.png".into());
        img.content_hash = Some("00112233".into());
        assert!(img.is_localized());
    }

    #[test]
    fn format_names_are_stable() {
        assert_eq!(OutputFormat::Html.name(), "html");
        assert_eq!(OutputFormat::Sleepscreen.to_string(), "sleepscreen");
        assert_eq!(SourceKind::KagiNews.to_string(), "kaginews");
    }
}
