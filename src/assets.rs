//! Asset localization
//!
//! Downloads every remote image referenced by an edition's items into a
//! content-addressed store and rewrites item references to local paths.
//! Two layers of dedup:
//!
//! - **per-URL**: an in-flight registry of shared awaitable handles means a
//!   URL is downloaded at most once per run, even when many items reference
//!   it concurrently (followers await the first download's result, including
//!   its failure)
//! - **per-content**: stored files are named by SHA-256 of their bytes, so
//!   differently-URLed copies of the same image collapse to one file; the
//!   check-then-write step is serialized so two workers never write the
//!   same target concurrently
//!
//! Partial failure policy: an item keeps the images that resolved and drops
//! the references (and body tags) of the ones that did not. Only an item
//! whose every image failed yields an [`AssetError`].

use crate::config::RetryConfig;
use crate::error::AssetError;
use crate::retry::fetch_with_retry;
use crate::types::Item;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

static FULL_IMG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<img\s[^>]*?/?>").expect("img tag pattern compiles"));

static SRC_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)src=["']([^"']+)["']"#).expect("src attribute pattern compiles")
});

/// Subdirectory of the run directory holding stored images
pub const IMAGES_DIR: &str = "images";

/// A localized image: path relative to the run directory plus content hash
#[derive(Clone, Debug)]
pub struct StoredAsset {
    /// e.g. `images/0a1b2c3d4e5f6071.png`
    pub rel_path: String,
    /// Hex SHA-256 of the stored bytes
    pub hash: String,
}

/// Content-addressed image store for one run
pub struct AssetStore {
    run_dir: PathBuf,
    client: reqwest::Client,
    retry: RetryConfig,
    max_bytes: u64,
    /// URL -> shared in-flight handle; `None` inside the cell records a
    /// failed download so followers do not re-attempt it
    inflight: Mutex<HashMap<String, Arc<OnceCell<Option<StoredAsset>>>>>,
    /// hash -> rel_path guard so concurrent same-content downloads write once
    written: Mutex<HashMap<String, String>>,
    failures: AtomicUsize,
}

impl AssetStore {
    /// Create a store rooted at the run directory
    pub fn new(
        run_dir: PathBuf,
        client: reqwest::Client,
        retry: RetryConfig,
        max_bytes: u64,
    ) -> Self {
        Self {
            run_dir,
            client,
            retry,
            max_bytes,
            inflight: Mutex::new(HashMap::new()),
            written: Mutex::new(HashMap::new()),
            failures: AtomicUsize::new(0),
        }
    }

    /// Distinct image URLs that failed to localize this run
    pub fn failure_count(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// Localize every image an item references
    ///
    /// Resolved references get their `local_path`/`content_hash` filled in
    /// and the body `<img>` tags rewritten; failed references are dropped
    /// from both the list and the body.
    ///
    /// # Errors
    /// [`AssetError::AllImagesFailed`] when the item had images and none of
    /// them resolved. Items without images always succeed.
    pub async fn localize_item(&self, item: &mut Item) -> Result<(), AssetError> {
        if item.images.is_empty() {
            return Ok(());
        }

        let mut resolved: HashMap<String, StoredAsset> = HashMap::new();
        for image in &item.images {
            if let Some(asset) = self.resolve(&image.remote_url).await {
                resolved.insert(image.remote_url.clone(), asset);
            }
        }

        let attempted = item.images.len();
        item.images.retain_mut(|image| {
            match resolved.get(&image.remote_url) {
                Some(asset) => {
                    image.local_path = Some(asset.rel_path.clone());
                    image.content_hash = Some(asset.hash.clone());
                    true
                }
                None => false,
            }
        });

        item.body_html = rewrite_body(&item.body_html, &resolved);

        if item.images.is_empty() {
            return Err(AssetError::AllImagesFailed {
                item: item.id.clone(),
                count: attempted,
            });
        }
        Ok(())
    }

    /// Resolve a URL to a stored asset, downloading at most once per run
    ///
    /// Concurrent callers for the same URL coalesce onto one in-flight
    /// download; a recorded failure is shared the same way.
    pub async fn resolve(&self, url: &str) -> Option<StoredAsset> {
        let cell = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(url.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_init(|| async {
            match self.download_and_store(url).await {
                Ok(asset) => Some(asset),
                Err(e) => {
                    warn!(url, error = %e, "image failed to localize");
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    None
                }
            }
        })
        .await
        .clone()
    }

    async fn download_and_store(&self, url: &str) -> Result<StoredAsset, AssetError> {
        let (bytes, content_type) = fetch_with_retry(&self.retry, || self.download(url)).await?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let hash = format!("{:x}", hasher.finalize());

        let ext = ext_from_content_type(&content_type)
            .or_else(|| ext_from_url(url))
            .unwrap_or(".bin");
        let filename = format!("{}{}", &hash[..16], ext);
        let rel_path = format!("{}/{}", IMAGES_DIR, filename);

        // check-then-write under the store lock: the first worker with this
        // content hash writes the file, everyone else reuses it
        let mut written = self.written.lock().await;
        if let Some(existing) = written.get(&hash) {
            debug!(url, hash = %&hash[..16], "content already stored, reusing");
            return Ok(StoredAsset {
                rel_path: existing.clone(),
                hash,
            });
        }

        let dir = self.run_dir.join(IMAGES_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AssetError::Store {
                path: dir.clone(),
                cause: e,
            })?;
        let target = dir.join(&filename);
        if !target.exists() {
            tokio::fs::write(&target, &bytes)
                .await
                .map_err(|e| AssetError::Store {
                    path: target.clone(),
                    cause: e,
                })?;
        }
        written.insert(hash.clone(), rel_path.clone());
        debug!(url, path = %target.display(), "image stored");

        Ok(StoredAsset { rel_path, hash })
    }

    async fn download(&self, url: &str) -> Result<(Vec<u8>, String), AssetError> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| AssetError::Download {
                    url: url.to_string(),
                    cause: e,
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.is_empty() && !content_type.starts_with("image/") {
            return Err(AssetError::UnsupportedType {
                url: url.to_string(),
                content_type,
            });
        }

        let bytes = response.bytes().await.map_err(|e| AssetError::Download {
            url: url.to_string(),
            cause: e,
        })?;
        if bytes.len() as u64 > self.max_bytes {
            return Err(AssetError::TooLarge {
                url: url.to_string(),
                size: bytes.len() as u64,
                limit: self.max_bytes,
            });
        }

        Ok((bytes.to_vec(), content_type))
    }
}

/// Rewrite body `<img>` tags: resolved srcs point at the store, failed
/// remote srcs have their whole tag removed, local/data srcs stay untouched
fn rewrite_body(body_html: &str, resolved: &HashMap<String, StoredAsset>) -> String {
    FULL_IMG_RE
        .replace_all(body_html, |caps: &regex::Captures<'_>| {
            let tag = &caps[0];
            let Some(src_caps) = SRC_ATTR_RE.captures(tag) else {
                return tag.to_string();
            };
            let src = &src_caps[1];
            if src.starts_with("data:") || src.starts_with(&format!("{}/", IMAGES_DIR)) {
                return tag.to_string();
            }
            match resolved.get(src) {
                Some(asset) => tag.replace(src, &asset.rel_path),
                None => String::new(),
            }
        })
        .into_owned()
}

fn ext_from_content_type(content_type: &str) -> Option<&'static str> {
    const MAPPING: [(&str, &str); 5] = [
        ("image/jpeg", ".jpg"),
        ("image/png", ".png"),
        ("image/gif", ".gif"),
        ("image/webp", ".webp"),
        ("image/svg+xml", ".svg"),
    ];
    MAPPING
        .iter()
        .find(|(mime, _)| content_type.contains(mime))
        .map(|(_, ext)| *ext)
}

fn ext_from_url(url: &str) -> Option<&'static str> {
    const EXTS: [&str; 6] = [".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg"];
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    if path.ends_with(".jpeg") {
        return Some(".jpg");
    }
    EXTS.iter().find(|ext| path.ends_with(**ext)).copied()
}
