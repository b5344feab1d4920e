//! Source adapters
//!
//! One adapter per [`SourceKind`], all satisfying the same contract:
//! fetch the source's native payload, map it into canonical [`Item`]s, and
//! leave image localization to the asset store. Malformed individual entries
//! are skipped and logged; a total request failure surfaces as
//! [`SourceFetchError`] after the per-operation retry budget is spent.

pub mod hackernews;
pub mod kaginews;
pub mod rss;

use crate::config::{HttpConfig, RetryConfig, SourceConfig};
use crate::error::{Error, Result, SourceFetchError};
use crate::retry::fetch_with_retry;
use crate::types::{ImageRef, Item, SourceKind};
use regex::Regex;
use std::sync::LazyLock;

static IMG_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(<img\s[^>]*?)src=["']([^"']+)["']"#).expect("img src pattern compiles")
});

/// Build the HTTP client shared by all adapters and the asset localizer
pub fn build_client(http: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(http.timeout)
        .user_agent(http.user_agent.clone())
        .build()
        .map_err(|e| Error::Config {
            message: format!("failed to build HTTP client: {}", e),
            key: None,
        })
}

/// Fetch one source, dispatched by its configured kind
pub async fn fetch_source(
    client: &reqwest::Client,
    source: &SourceConfig,
    retry: &RetryConfig,
    workers: usize,
) -> std::result::Result<Vec<Item>, SourceFetchError> {
    match source.kind {
        SourceKind::HackerNews => hackernews::fetch(client, source, retry, workers).await,
        SourceKind::KagiNews => kaginews::fetch(client, source, retry, workers).await,
        SourceKind::Rss => rss::fetch(client, source, retry).await,
    }
}

/// Extract distinct embedded-image references from body HTML, in body order
///
/// `data:` URIs and already-local paths are not remote assets and are left
/// out of the reference list.
pub(crate) fn extract_image_refs(body_html: &str) -> Vec<ImageRef> {
    let mut seen = std::collections::HashSet::new();
    let mut refs = Vec::new();
    for caps in IMG_SRC_RE.captures_iter(body_html) {
        let url = &caps[2];
        if url.starts_with("data:") || url.starts_with("images/") {
            continue;
        }
        if seen.insert(url.to_string()) {
            refs.push(ImageRef::remote(url));
        }
    }
    refs
}

/// Rewrite `<img src>` attributes through a mapping function
///
/// The callback receives each src value and returns a replacement, or `None`
/// to leave the attribute untouched. Used by the asset localizer (remote to
/// local paths) and by renderers (local paths to format-relative paths).
pub(crate) fn rewrite_image_srcs<F>(body_html: &str, mut map: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    IMG_SRC_RE
        .replace_all(body_html, |caps: &regex::Captures<'_>| {
            match map(&caps[2]) {
                Some(new_src) => format!(r#"{}src="{}""#, &caps[1], new_src),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// GET a URL and deserialize the JSON body, with retry on transient failures
pub(crate) async fn get_json(
    client: &reqwest::Client,
    source_id: &str,
    url: &str,
    retry: &RetryConfig,
) -> std::result::Result<serde_json::Value, SourceFetchError> {
    fetch_with_retry(retry, || async move {
        let response = request(client, source_id, url).await?;
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| SourceFetchError::Malformed {
                source_id: source_id.to_string(),
                reason: format!("invalid JSON from {}: {}", url, e),
            })
    })
    .await
}

/// GET a URL and return the text body, with retry on transient failures
pub(crate) async fn get_text(
    client: &reqwest::Client,
    source_id: &str,
    url: &str,
    retry: &RetryConfig,
) -> std::result::Result<String, SourceFetchError> {
    fetch_with_retry(retry, || async move {
        let response = request(client, source_id, url).await?;
        response
            .text()
            .await
            .map_err(|e| SourceFetchError::Network {
                source_id: source_id.to_string(),
                cause: e,
            })
    })
    .await
}

async fn request(
    client: &reqwest::Client,
    source_id: &str,
    url: &str,
) -> std::result::Result<reqwest::Response, SourceFetchError> {
    let response =
        client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceFetchError::Network {
                source_id: source_id.to_string(),
                cause: e,
            })?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(SourceFetchError::Auth {
            source_id: source_id.to_string(),
        });
    }
    if !status.is_success() {
        return Err(SourceFetchError::Status {
            source_id: source_id.to_string(),
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_distinct_refs_in_body_order() {
        let html = r#"
            <p><img src="https://a.example/1.png" alt=""></p>
            <p><img class="wide" src='https://a.example/2.jpg'></p>
            <p><img src="https://a.example/1.png"></p>
        "#;
        let refs = extract_image_refs(html);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].remote_url, "https://a.example/1.png");
        assert_eq!(refs[1].remote_url, "https://a.example/2.jpg");
    }

    #[test]
    fn skips_data_uris_and_local_paths() {
        let html = r#"<img src="data:image/png;base64,AAAA"><img src="images/x.png">"#;
        assert!(extract_image_refs(html).is_empty());
    }

    #[test]
    fn rewrite_maps_only_requested_srcs() {
        let html = r#"<img src="https://a.example/1.png"> <img src="keep.png">"#;
        let out = rewrite_image_srcs(html, |src| {
            (src == "https://a.example/1.png").then(|| "images/abc.png".to_string())
        });
        assert!(out.contains(r#"src="images/abc.png""#));
        assert!(out.contains(r#"src="keep.png""#));
    }

    #[test]
    fn rewrite_preserves_other_attributes() {
        let html = r#"<img class="hero" src="https://a.example/1.png" alt="x">"#;
        let out = rewrite_image_srcs(html, |_| Some("local.png".to_string()));
        assert!(out.contains(r#"class="hero""#));
        assert!(out.contains(r#"src="local.png""#));
    }
}
