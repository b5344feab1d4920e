//! Curated news API adapter
//!
//! The API is batch-oriented: the latest batch id resolves to a set of
//! categories, each of which serves story clusters. Configured categories
//! are fetched in bounded parallel with config order preserved; a failing
//! category is skipped rather than failing the source. Story text carries
//! `[domain#N]` citation markers that are resolved to superscript links
//! against the cluster's source-article list.

use crate::config::{RetryConfig, SourceConfig};
use crate::error::SourceFetchError;
use crate::textify::html_to_plaintext;
use crate::types::{Item, SourceKind};
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use tracing::{debug, warn};

const KAGI_API: &str = "https://news.kagi.com";

const SUMMARY_CHARS: usize = 280;

static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([a-zA-Z0-9._-]+(?:\.[a-zA-Z]{2,}))#(\d+)\]").expect("citation pattern compiles")
});

/// Fetch the configured categories of the latest batch as canonical items
pub async fn fetch(
    client: &reqwest::Client,
    source: &SourceConfig,
    retry: &RetryConfig,
    workers: usize,
) -> Result<Vec<Item>, SourceFetchError> {
    let base = source
        .options
        .endpoint
        .clone()
        .unwrap_or_else(|| KAGI_API.to_string());
    let base = base.trim_end_matches('/').to_string();
    let lang = &source.options.language;

    let batch_id = latest_batch_id(client, source, &base, retry).await?;
    let categories = fetch_category_map(client, source, &base, &batch_id, retry).await?;
    let categories = &categories;

    // buffered() keeps results in configured category order
    let per_category: Vec<Vec<Item>> = stream::iter(source.options.categories.iter())
        .map(|slug| {
            let base = base.clone();
            let batch_id = batch_id.clone();
            async move {
                let Some(category) = categories.get(slug.as_str()) else {
                    warn!(source = %source.id, category = %slug, "unknown category, skipping");
                    return Vec::new();
                };
                let url = format!(
                    "{}/api/batches/{}/categories/{}/stories?lang={}&limit={}",
                    base, batch_id, category.uuid, lang, source.options.max_stories_per_category
                );
                match super::get_json(client, &source.id, &url, retry).await {
                    Ok(value) => map_category(source, slug, &category.name, value),
                    Err(e) => {
                        warn!(source = %source.id, category = %slug, error = %e, "category failed, skipping");
                        Vec::new()
                    }
                }
            }
        })
        .buffered(workers.max(1))
        .collect()
        .await;

    Ok(per_category.into_iter().flatten().collect())
}

async fn latest_batch_id(
    client: &reqwest::Client,
    source: &SourceConfig,
    base: &str,
    retry: &RetryConfig,
) -> Result<String, SourceFetchError> {
    let url = format!("{}/api/batches?lang={}", base, source.options.language);
    let value = super::get_json(client, &source.id, &url, retry).await?;
    value["batches"][0]["id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SourceFetchError::Malformed {
            source_id: source.id.clone(),
            reason: "no batches available".to_string(),
        })
}

struct Category {
    uuid: String,
    name: String,
}

async fn fetch_category_map(
    client: &reqwest::Client,
    source: &SourceConfig,
    base: &str,
    batch_id: &str,
    retry: &RetryConfig,
) -> Result<HashMap<String, Category>, SourceFetchError> {
    let url = format!(
        "{}/api/batches/{}/categories?lang={}",
        base, batch_id, source.options.language
    );
    let value = super::get_json(client, &source.id, &url, retry).await?;

    let mut map = HashMap::new();
    for cat in value["categories"].as_array().into_iter().flatten() {
        let (Some(slug), Some(uuid)) = (cat["categoryId"].as_str(), cat["id"].as_str()) else {
            continue;
        };
        let name = cat["categoryName"].as_str().unwrap_or(slug).to_string();
        map.insert(
            slug.to_string(),
            Category {
                uuid: uuid.to_string(),
                name,
            },
        );
    }
    debug!(source = %source.id, categories = map.len(), "resolved category map");
    Ok(map)
}

fn map_category(
    source: &SourceConfig,
    slug: &str,
    category_name: &str,
    value: serde_json::Value,
) -> Vec<Item> {
    let Some(stories) = value.get("stories").cloned() else {
        warn!(source = %source.id, category = %slug, "payload has no stories field");
        return Vec::new();
    };
    let stories: Vec<Story> = match serde_json::from_value(stories) {
        Ok(stories) => stories,
        Err(e) => {
            warn!(source = %source.id, category = %slug, error = %e, "malformed stories payload");
            return Vec::new();
        }
    };

    stories
        .into_iter()
        .enumerate()
        .map(|(idx, story)| map_story(source, slug, category_name, idx, story))
        .collect()
}

/// One story cluster as served by the API
#[derive(Clone, Debug, Deserialize)]
struct Story {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    emoji: Option<String>,
    #[serde(default)]
    unique_domains: Option<u64>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    short_summary: Option<String>,
    #[serde(default)]
    talking_points: Vec<String>,
    #[serde(default)]
    articles: Vec<SourceArticle>,
}

/// One underlying press article inside a story cluster
#[derive(Clone, Debug, Deserialize)]
struct SourceArticle {
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

fn map_story(
    source: &SourceConfig,
    slug: &str,
    category_name: &str,
    idx: usize,
    story: Story,
) -> Item {
    let cluster_id = story
        .id
        .as_ref()
        .map(value_to_id)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("{}-{}", slug, idx));

    let cmap = CitationMap::build(&story.articles);
    let body_html = story_body(&story, category_name, &cmap);

    let first_link = story
        .articles
        .first()
        .and_then(|a| a.link.clone())
        .unwrap_or_default();

    let summary_text = story
        .short_summary
        .as_deref()
        .or(story.summary.as_deref())
        .unwrap_or_default();

    let mut metadata = BTreeMap::new();
    metadata.insert("cluster_id".to_string(), serde_json::json!(cluster_id));
    metadata.insert("category".to_string(), serde_json::json!(slug));
    if let Some(emoji) = &story.emoji {
        metadata.insert("emoji".to_string(), serde_json::json!(emoji));
    }
    metadata.insert(
        "unique_domains".to_string(),
        serde_json::json!(story.unique_domains.unwrap_or(0)),
    );

    let images = super::extract_image_refs(&body_html);

    Item {
        id: format!("{}:{}", source.id, cluster_id),
        kind: SourceKind::KagiNews,
        title: story.title.clone().unwrap_or_else(|| "Untitled".to_string()),
        url: first_link,
        author: "Kagi News".to_string(),
        published: earliest_article_date(&story.articles),
        fetched: Utc::now(),
        summary: html_to_plaintext(summary_text, Some(SUMMARY_CHARS)),
        body_html,
        images,
        metadata,
    }
}

fn value_to_id(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn story_body(story: &Story, category_name: &str, cmap: &CitationMap) -> String {
    let mut body = String::new();

    let mut meta_parts = Vec::new();
    if let Some(emoji) = &story.emoji {
        meta_parts.push(emoji.clone());
    }
    meta_parts.push(category_name.to_string());
    if let Some(n) = story.unique_domains {
        meta_parts.push(format!("{} sources", n));
    }
    body.push_str(&format!(
        "<p class=\"story-meta\">{}</p>\n",
        html_escape::encode_text(&meta_parts.join(" | "))
    ));

    if let Some(summary) = story.summary.as_deref().or(story.short_summary.as_deref()) {
        body.push_str(&format!(
            "<div class=\"story-summary\"><p>{}</p></div>\n",
            cmap.cite(summary)
        ));
    }

    if !story.talking_points.is_empty() {
        body.push_str("<ul class=\"talking-points\">\n");
        for point in &story.talking_points {
            body.push_str(&format!("<li>{}</li>\n", cmap.cite(point)));
        }
        body.push_str("</ul>\n");
    }

    if !story.articles.is_empty() {
        body.push_str("<h2>Sources</h2>\n<ol class=\"sources\">\n");
        for (i, article) in story.articles.iter().enumerate() {
            let n = i + 1;
            let title = article.title.as_deref().unwrap_or("untitled");
            let mut entry = match &article.link {
                Some(link) => format!(
                    "<a href=\"{}\">{}</a>",
                    html_escape::encode_double_quoted_attribute(link),
                    html_escape::encode_text(title)
                ),
                None => html_escape::encode_text(title).into_owned(),
            };
            if let Some(domain) = &article.domain {
                let date = article
                    .date
                    .as_deref()
                    .map(|d| format!(", {}", d))
                    .unwrap_or_default();
                entry.push_str(&format!(
                    " <span class=\"domain\">({}{})</span>",
                    html_escape::encode_text(domain),
                    html_escape::encode_text(&date)
                ));
            }
            body.push_str(&format!("<li id=\"src-{}\">{}</li>\n", n, entry));
        }
        body.push_str("</ol>\n");
    }

    body
}

/// Maps `(domain, occurrence)` to the 1-based position, URL, and title of a
/// source article, matching the numbering of the rendered Sources list
struct CitationMap {
    entries: HashMap<(String, u32), (usize, String)>,
}

impl CitationMap {
    fn build(articles: &[SourceArticle]) -> Self {
        let mut domain_counts: HashMap<&str, u32> = HashMap::new();
        let mut entries = HashMap::new();
        for (i, article) in articles.iter().enumerate() {
            let Some(domain) = article.domain.as_deref().filter(|d| !d.is_empty()) else {
                continue;
            };
            let n = domain_counts.entry(domain).or_insert(0);
            *n += 1;
            entries.insert(
                (domain.to_string(), *n),
                (i + 1, article.title.clone().unwrap_or_default()),
            );
        }
        Self { entries }
    }

    /// HTML-escape text, then replace `[domain#N]` markers with superscript
    /// anchors into the Sources list; unknown markers are left as-is
    fn cite(&self, text: &str) -> String {
        let escaped = html_escape::encode_text(text).into_owned();
        if self.entries.is_empty() {
            return escaped;
        }
        CITATION_RE
            .replace_all(&escaped, |caps: &regex::Captures<'_>| {
                let domain = &caps[1];
                let n: u32 = caps[2].parse().unwrap_or(0);
                match self.entries.get(&(domain.to_string(), n)) {
                    Some((index, title)) => format!(
                        "<sup class=\"cite\"><a href=\"#src-{}\" title=\"{}\">{}</a></sup>",
                        index,
                        html_escape::encode_double_quoted_attribute(title),
                        index
                    ),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// Earliest publication date across the cluster's source articles
fn earliest_article_date(articles: &[SourceArticle]) -> Option<DateTime<Utc>> {
    articles
        .iter()
        .filter_map(|a| a.date.as_deref())
        .filter_map(parse_iso_date)
        .min()
}

fn parse_iso_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
