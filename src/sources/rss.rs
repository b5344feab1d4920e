//! RSS/Atom feed adapter
//!
//! Fetches the feed body once, tries to parse it as RSS 2.0, and falls back
//! to Atom. Entries are mapped to canonical items with a guid preference
//! chain (guid, then link, then title) so every item gets a stable id even
//! from sparse feeds.

use crate::config::{RetryConfig, SourceConfig};
use crate::error::SourceFetchError;
use crate::textify::html_to_plaintext;
use crate::types::{Item, SourceKind};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

const SUMMARY_CHARS: usize = 280;

/// Fetch and map one feed
pub async fn fetch(
    client: &reqwest::Client,
    source: &SourceConfig,
    retry: &RetryConfig,
) -> Result<Vec<Item>, SourceFetchError> {
    let feed_url = source
        .options
        .url
        .as_deref()
        .ok_or_else(|| SourceFetchError::Malformed {
            source_id: source.id.clone(),
            reason: "no feed url configured".to_string(),
        })?;

    let content = super::get_text(client, &source.id, feed_url, retry).await?;

    // Try parsing as RSS first, then Atom
    let items = match parse_as_rss(source, feed_url, &content) {
        Ok(items) => {
            debug!(source = %source.id, count = items.len(), "parsed as RSS");
            items
        }
        Err(rss_err) => match parse_as_atom(source, feed_url, &content) {
            Ok(items) => {
                debug!(source = %source.id, count = items.len(), "parsed as Atom");
                items
            }
            Err(atom_err) => {
                return Err(SourceFetchError::Malformed {
                    source_id: source.id.clone(),
                    reason: format!(
                        "not parseable as RSS or Atom. RSS error: {}. Atom error: {}",
                        rss_err, atom_err
                    ),
                });
            }
        },
    };

    Ok(items.into_iter().take(source.options.max_articles).collect())
}

fn parse_as_rss(
    source: &SourceConfig,
    feed_url: &str,
    content: &str,
) -> Result<Vec<Item>, rss::Error> {
    let channel = content.parse::<rss::Channel>()?;

    let items = channel
        .items()
        .iter()
        .map(|entry| {
            // Prefer guid, fall back to link, then title
            let guid = entry
                .guid()
                .map(|g| g.value().to_string())
                .or_else(|| entry.link().map(str::to_string))
                .unwrap_or_else(|| entry.title().unwrap_or("").to_string());

            let published = entry.pub_date().and_then(|raw| {
                DateTime::parse_from_rfc2822(raw)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            });

            let author = entry
                .author()
                .map(str::to_string)
                .or_else(|| {
                    entry
                        .dublin_core_ext()
                        .and_then(|dc| dc.creators().first().cloned())
                })
                .unwrap_or_else(|| "unknown".to_string());

            let description = entry.description().unwrap_or_default();
            let body_html = entry
                .content()
                .unwrap_or(description)
                .to_string();

            build_item(
                source,
                feed_url,
                guid,
                entry.title().unwrap_or("Untitled").to_string(),
                entry.link().unwrap_or_default().to_string(),
                author,
                published,
                description,
                body_html,
            )
        })
        .collect();

    Ok(items)
}

fn parse_as_atom(
    source: &SourceConfig,
    feed_url: &str,
    content: &str,
) -> Result<Vec<Item>, atom_syndication::Error> {
    let feed = atom_syndication::Feed::read_from(content.as_bytes())?;

    let items = feed
        .entries()
        .iter()
        .map(|entry| {
            let link = entry
                .links()
                .iter()
                .find(|l| l.rel() == "alternate")
                .or_else(|| entry.links().first())
                .map(|l| l.href().to_string())
                .unwrap_or_default();

            let published = entry
                .published()
                .or(Some(entry.updated()))
                .map(|dt| dt.with_timezone(&Utc));

            let author = entry
                .authors()
                .first()
                .map(|a| a.name().to_string())
                .unwrap_or_else(|| "unknown".to_string());

            let summary = entry
                .summary()
                .map(|s| s.value.clone())
                .unwrap_or_default();
            let body_html = entry
                .content()
                .and_then(|c| c.value().map(str::to_string))
                .unwrap_or_else(|| summary.clone());

            build_item(
                source,
                feed_url,
                entry.id().to_string(),
                entry.title().to_string(),
                link,
                author,
                published,
                &summary,
                body_html,
            )
        })
        .collect();

    Ok(items)
}

#[allow(clippy::too_many_arguments)]
fn build_item(
    source: &SourceConfig,
    feed_url: &str,
    guid: String,
    title: String,
    url: String,
    author: String,
    published: Option<DateTime<Utc>>,
    summary_html: &str,
    body_html: String,
) -> Item {
    let mut metadata = BTreeMap::new();
    metadata.insert("feed_url".to_string(), serde_json::json!(feed_url));
    metadata.insert("entry_id".to_string(), serde_json::json!(guid));

    let images = super::extract_image_refs(&body_html);

    Item {
        id: format!("{}:{}", source.id, guid),
        kind: SourceKind::Rss,
        title,
        url,
        author,
        published,
        fetched: Utc::now(),
        summary: html_to_plaintext(summary_html, Some(SUMMARY_CHARS)),
        body_html,
        images,
        metadata,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Blog</title>
    <link>https://blog.example.com</link>
    <description>posts</description>
    <item>
      <title>First Post</title>
      <link>https://blog.example.com/1</link>
      <guid>post-1</guid>
      <author>alice@example.com</author>
      <pubDate>Mon, 16 Feb 2026 10:30:00 GMT</pubDate>
      <description>&lt;p&gt;Hello &lt;img src="https://blog.example.com/a.png"&gt;&lt;/p&gt;</description>
    </item>
    <item>
      <title>Second Post</title>
      <link>https://blog.example.com/2</link>
      <description>no guid here</description>
    </item>
    <item>
      <description>no title, no link</description>
    </item>
  </channel>
</rss>"#;

    const ATOM_FIXTURE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <id>urn:feed</id>
  <updated>2026-02-16T10:30:00Z</updated>
  <entry>
    <title>Atom Entry</title>
    <id>urn:entry:1</id>
    <updated>2026-02-16T10:30:00Z</updated>
    <published>2026-02-15T08:00:00Z</published>
    <link rel="alternate" href="https://atom.example.com/1"/>
    <author><name>bob</name></author>
    <summary>short text</summary>
    <content type="html">&lt;p&gt;full body&lt;/p&gt;</content>
  </entry>
</feed>"#;

    fn rss_source(url: &str) -> SourceConfig {
        let mut source = SourceConfig::new("blog", SourceKind::Rss);
        source.options.url = Some(url.to_string());
        source
    }

    #[test]
    fn rss_entries_map_with_guid_preference_chain() {
        let source = rss_source("https://blog.example.com/feed");
        let items = parse_as_rss(&source, "https://blog.example.com/feed", RSS_FIXTURE).unwrap();
        assert_eq!(items.len(), 3);

        assert_eq!(items[0].id, "blog:post-1");
        assert_eq!(items[1].id, "blog:https://blog.example.com/2");
        assert_eq!(items[2].id, "blog:");

        assert_eq!(items[0].author, "alice@example.com");
        assert_eq!(items[1].author, "unknown");
        assert_eq!(items[2].title, "Untitled");
    }

    #[test]
    fn rss_dates_parse_from_rfc2822() {
        let source = rss_source("u");
        let items = parse_as_rss(&source, "u", RSS_FIXTURE).unwrap();
        let published = items[0].published.unwrap();
        assert_eq!(published.format("%Y-%m-%d %H:%M").to_string(), "2026-02-16 10:30");
        assert!(items[1].published.is_none());
    }

    #[test]
    fn rss_body_yields_image_refs_and_summary() {
        let source = rss_source("u");
        let items = parse_as_rss(&source, "u", RSS_FIXTURE).unwrap();
        assert_eq!(items[0].images.len(), 1);
        assert_eq!(items[0].images[0].remote_url, "https://blog.example.com/a.png");
        assert!(items[0].summary.contains("Hello"));
        assert!(!items[0].summary.contains('<'));
    }

    #[test]
    fn atom_entries_map_content_and_dates() {
        let source = rss_source("u");
        let items = parse_as_atom(&source, "u", ATOM_FIXTURE).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "blog:urn:entry:1");
        assert_eq!(items[0].url, "https://atom.example.com/1");
        assert_eq!(items[0].author, "bob");
        assert!(items[0].body_html.contains("full body"));
        assert_eq!(
            items[0].published.unwrap().format("%Y-%m-%d").to_string(),
            "2026-02-15"
        );
    }

    #[tokio::test]
    async fn fetch_falls_back_to_atom() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ATOM_FIXTURE))
            .mount(&server)
            .await;

        let source = rss_source(&format!("{}/feed", server.uri()));
        let client = reqwest::Client::new();
        let retry = RetryConfig {
            max_attempts: 0,
            jitter: false,
            ..Default::default()
        };

        let items = fetch(&client, &source, &retry).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Atom Entry");
    }

    #[tokio::test]
    async fn fetch_truncates_to_max_articles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS_FIXTURE))
            .mount(&server)
            .await;

        let mut source = rss_source(&format!("{}/feed", server.uri()));
        source.options.max_articles = 2;
        let client = reqwest::Client::new();
        let retry = RetryConfig {
            max_attempts: 0,
            jitter: false,
            ..Default::default()
        };

        let items = fetch(&client, &source, &retry).await.unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn unparseable_body_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string("this is not a feed"))
            .mount(&server)
            .await;

        let source = rss_source(&format!("{}/feed", server.uri()));
        let client = reqwest::Client::new();
        let retry = RetryConfig {
            max_attempts: 0,
            jitter: false,
            ..Default::default()
        };

        let err = fetch(&client, &source, &retry).await.unwrap_err();
        assert!(matches!(err, SourceFetchError::Malformed { .. }));
    }
}
