//! Discussion-aggregator adapter
//!
//! Pulls the front-page story ids from the Firebase-style endpoint, then
//! fetches each story (with its comment tree) from the Algolia items API in
//! bounded parallel. Individual story failures are skipped so one dead story
//! never sinks the source; front-page ranking is preserved regardless of
//! which fetch finishes first.

use crate::config::{RetryConfig, SourceConfig, SourceOptions};
use crate::error::SourceFetchError;
use crate::textify::html_to_plaintext;
use crate::types::{Item, SourceKind};
use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

const HN_API: &str = "https://hacker-news.firebaseio.com/v0";
const ALGOLIA_API: &str = "https://hn.algolia.com/api/v1";

const SUMMARY_CHARS: usize = 280;

/// Fetch front-page stories as canonical items
pub async fn fetch(
    client: &reqwest::Client,
    source: &SourceConfig,
    retry: &RetryConfig,
    workers: usize,
) -> Result<Vec<Item>, SourceFetchError> {
    let opts = &source.options;
    let (top_url, item_base) = endpoints(opts);

    let ids: Vec<u64> = serde_json::from_value(
        super::get_json(client, &source.id, &top_url, retry).await?,
    )
    .map_err(|e| SourceFetchError::Malformed {
        source_id: source.id.clone(),
        reason: format!("top stories payload: {}", e),
    })?;

    let ids: Vec<u64> = ids.into_iter().take(opts.top_stories).collect();
    debug!(source = %source.id, count = ids.len(), "fetching stories");

    // buffered() preserves submission order, so items come back in
    // front-page ranking no matter which story resolves first
    let fetched: Vec<Option<Item>> = stream::iter(ids)
        .map(|story_id| {
            let item_base = item_base.clone();
            async move {
                match fetch_one(client, source, &item_base, story_id, retry).await {
                    Ok(item) => item,
                    Err(e) => {
                        warn!(source = %source.id, story_id, error = %e, "skipping story");
                        None
                    }
                }
            }
        })
        .buffered(workers.max(1))
        .collect()
        .await;

    Ok(fetched.into_iter().flatten().collect())
}

fn endpoints(opts: &SourceOptions) -> (String, String) {
    match &opts.endpoint {
        Some(base) => {
            let base = base.trim_end_matches('/');
            (format!("{}/topstories.json", base), format!("{}/items", base))
        }
        None => (
            format!("{}/topstories.json", HN_API),
            format!("{}/items", ALGOLIA_API),
        ),
    }
}

/// Fetch and map a single story; `Ok(None)` means "skip this entry"
async fn fetch_one(
    client: &reqwest::Client,
    source: &SourceConfig,
    item_base: &str,
    story_id: u64,
    retry: &RetryConfig,
) -> Result<Option<Item>, SourceFetchError> {
    let url = format!("{}/{}", item_base, story_id);
    let value = super::get_json(client, &source.id, &url, retry).await?;

    let story: StoryNode = match serde_json::from_value(value) {
        Ok(story) => story,
        Err(e) => {
            warn!(source = %source.id, story_id, error = %e, "malformed story payload");
            return Ok(None);
        }
    };

    if story.kind.as_deref() != Some("story") {
        return Ok(None);
    }

    Ok(Some(map_story(source, story)))
}

/// One node of the Algolia item tree; stories and comments share the shape
#[derive(Clone, Debug, Deserialize)]
struct StoryNode {
    id: u64,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    points: Option<i64>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    created_at_i: Option<i64>,
    #[serde(default)]
    children: Vec<StoryNode>,
}

fn map_story(source: &SourceConfig, story: StoryNode) -> Item {
    let opts = &source.options;

    // the full tree is counted before trimming so the displayed total
    // reflects the discussion, not what we kept
    let num_comments = count_descendants(&story.children);

    let comments = if opts.include_comments {
        trim_comments(story.children.clone(), 0, opts)
    } else {
        Vec::new()
    };

    let discussion_url = format!("https://news.ycombinator.com/item?id={}", story.id);
    let url = story
        .url
        .clone()
        .unwrap_or_else(|| discussion_url.clone());
    let score = story.points.unwrap_or(0);
    let text = story.text.clone().unwrap_or_default();

    let body_html = story_body(&url, &discussion_url, score, num_comments, &text, &comments);

    let mut metadata = std::collections::BTreeMap::new();
    metadata.insert("hn_id".to_string(), serde_json::json!(story.id));
    metadata.insert("score".to_string(), serde_json::json!(score));
    metadata.insert(
        "num_comments".to_string(),
        serde_json::json!(num_comments),
    );

    let images = super::extract_image_refs(&body_html);

    Item {
        id: format!("{}:{}", source.id, story.id),
        kind: SourceKind::HackerNews,
        title: story.title.unwrap_or_else(|| "Untitled".to_string()),
        url,
        author: story.author.unwrap_or_else(|| "anonymous".to_string()),
        published: story.created_at_i.and_then(unix_to_datetime),
        fetched: Utc::now(),
        summary: html_to_plaintext(&text, Some(SUMMARY_CHARS)),
        body_html,
        images,
        metadata,
    }
}

fn unix_to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Total comment count of the full tree
fn count_descendants(children: &[StoryNode]) -> usize {
    children
        .iter()
        .map(|c| 1 + count_descendants(&c.children))
        .sum()
}

/// Trim the comment tree to the configured depth and per-level caps,
/// dropping non-comment and empty nodes
fn trim_comments(children: Vec<StoryNode>, depth: usize, opts: &SourceOptions) -> Vec<StoryNode> {
    if depth >= opts.max_comment_depth {
        return Vec::new();
    }
    children
        .into_iter()
        .filter(|c| c.kind.as_deref() == Some("comment") && c.text.is_some())
        .take(opts.max_comments_per_level)
        .map(|mut c| {
            c.children = trim_comments(std::mem::take(&mut c.children), depth + 1, opts);
            c
        })
        .collect()
}

fn story_body(
    url: &str,
    discussion_url: &str,
    score: i64,
    num_comments: usize,
    text: &str,
    comments: &[StoryNode],
) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        "<div class=\"story-meta\"><span>{} points</span> | \
         <a href=\"{}\">{} comments</a> | <a href=\"{}\">link</a></div>\n",
        score, discussion_url, num_comments, url
    ));

    // story text is already HTML from the API
    if !text.is_empty() {
        body.push_str(&format!("<div class=\"story-text\">{}</div>\n", text));
    }

    if !comments.is_empty() {
        body.push_str("<h2>Comments</h2>\n");
        render_comments(&mut body, comments);
    }
    body
}

fn render_comments(out: &mut String, comments: &[StoryNode]) {
    for comment in comments {
        out.push_str("<div class=\"comment\">\n");
        out.push_str(&format!(
            "<p class=\"comment-meta\">{}{}</p>\n",
            html_escape::encode_text(comment.author.as_deref().unwrap_or("anonymous")),
            comment
                .created_at_i
                .and_then(unix_to_datetime)
                .map(|dt| format!(" | {}", dt.format("%Y-%m-%d %H:%M UTC")))
                .unwrap_or_default(),
        ));
        if let Some(text) = &comment.text {
            out.push_str(&format!("<div class=\"comment-text\">{}</div>\n", text));
        }
        if !comment.children.is_empty() {
            out.push_str("<div class=\"replies\">\n");
            render_comments(out, &comment.children);
            out.push_str("</div>\n");
        }
        out.push_str("</div>\n");
    }
}
