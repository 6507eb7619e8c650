//! URL grabber façade: classify a URL, collect candidate items, and hand
//! them back for selection before anything is enqueued.
//!
//! Handlers are selected by matching on the URL kind. Stream and page
//! handlers never fall back to the direct-file handler: their failures
//! yield empty results.

mod classify;
mod discovery;

use std::sync::Arc;

use crate::hls::{HlsAnalyzer, StreamType};
use crate::http::HttpClient;
use crate::naming;

pub use classify::UrlKind;
pub use discovery::{DiscoveredLink, NoDiscovery, PageDiscovery, PageLinks};

/// What a candidate item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    File,
    Media,
    Stream,
}

/// One downloadable candidate.
#[derive(Debug, Clone)]
pub struct GrabberItem {
    pub url: String,
    pub kind: ItemKind,
    pub size: Option<u64>,
    pub title: Option<String>,
    pub filename: Option<String>,
}

/// Result of grabbing one source URL.
#[derive(Debug, Clone)]
pub struct GrabberResult {
    pub items: Vec<GrabberItem>,
    pub source_url: String,
    pub kind: UrlKind,
    pub page_title: Option<String>,
    pub total_found: usize,
    pub total_filtered: usize,
}

impl GrabberResult {
    fn empty(source_url: &str, kind: UrlKind) -> Self {
        Self {
            items: Vec::new(),
            source_url: source_url.to_string(),
            kind,
            page_title: None,
            total_found: 0,
            total_filtered: 0,
        }
    }
}

pub struct Grabber {
    http: Arc<HttpClient>,
    discovery: Arc<dyn PageDiscovery>,
    analyzer: HlsAnalyzer,
}

impl Grabber {
    pub fn new(http: Arc<HttpClient>, discovery: Arc<dyn PageDiscovery>) -> Self {
        let analyzer = HlsAnalyzer::new(Arc::clone(&http));
        Self {
            http,
            discovery,
            analyzer,
        }
    }

    /// Classify `url` and yield its candidate items.
    pub async fn grab(&self, url: &str) -> GrabberResult {
        let normalized = classify::normalize_url(url);
        let kind = self.classify(&normalized).await;
        match kind {
            UrlKind::Stream => match self.stream_items(&normalized).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(url = %normalized, "HLS analysis failed: {:#}", e);
                    GrabberResult::empty(&normalized, UrlKind::Stream)
                }
            },
            UrlKind::Page => match self.page_items(&normalized).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(url = %normalized, "page discovery failed: {:#}", e);
                    GrabberResult::empty(&normalized, UrlKind::Page)
                }
            },
            UrlKind::Direct => self.direct_item(&normalized).await,
        }
    }

    /// Resolve the URL kind. `.m3u8` is a stream hint without any network
    /// round trip; everything else is probed.
    pub async fn classify(&self, normalized: &str) -> UrlKind {
        if classify::is_stream_hint(normalized) {
            return UrlKind::Stream;
        }
        let http = Arc::clone(&self.http);
        let url = normalized.to_string();
        let probe = tokio::task::spawn_blocking(move || http.probe(&url)).await;
        match probe {
            Ok(Ok(p)) => classify::kind_from_probe(normalized, &p),
            // Unreachable or unprobeable: assume a page, which degrades to
            // an empty result rather than a bogus direct download.
            _ => UrlKind::Page,
        }
    }

    async fn stream_items(&self, url: &str) -> anyhow::Result<GrabberResult> {
        let summary = self.analyzer.analyze(url).await?;
        let items: Vec<GrabberItem> = summary
            .variants
            .iter()
            .map(|v| GrabberItem {
                url: v.uri.clone(),
                kind: ItemKind::Stream,
                size: v.estimated_size,
                title: Some(format!(
                    "{} - {}",
                    v.quality_label,
                    summary.stream_type.as_str().to_uppercase()
                )),
                filename: Some(variant_filename(
                    &v.quality_label,
                    v.codecs.as_deref(),
                    summary.stream_type,
                )),
            })
            .collect();
        let count = items.len();
        Ok(GrabberResult {
            items,
            source_url: url.to_string(),
            kind: UrlKind::Stream,
            page_title: None,
            total_found: count,
            total_filtered: count,
        })
    }

    async fn page_items(&self, url: &str) -> anyhow::Result<GrabberResult> {
        let links = self.discovery.discover(url).await?;
        let items = links
            .links
            .iter()
            .map(|link| GrabberItem {
                url: link.url.clone(),
                kind: link.kind,
                size: link.size,
                title: link.title.clone(),
                filename: naming::filename_from_url_path(&link.url),
            })
            .collect();
        Ok(GrabberResult {
            items,
            source_url: url.to_string(),
            kind: UrlKind::Page,
            page_title: links.page_title,
            total_found: links.total_found,
            total_filtered: links.total_filtered,
        })
    }

    async fn direct_item(&self, url: &str) -> GrabberResult {
        // Size and filename hints are best effort; a dead probe still
        // yields the single candidate.
        let http = Arc::clone(&self.http);
        let probe_url = url.to_string();
        let probe = tokio::task::spawn_blocking(move || http.probe(&probe_url))
            .await
            .ok()
            .and_then(|r| r.ok());

        let (size, disposition) = match probe {
            Some(p) => (p.length, p.content_disposition),
            None => (None, None),
        };
        let item = GrabberItem {
            url: url.to_string(),
            kind: ItemKind::File,
            size,
            title: None,
            filename: Some(naming::derive_filename(url, disposition.as_deref())),
        };
        GrabberResult {
            items: vec![item],
            source_url: url.to_string(),
            kind: UrlKind::Direct,
            page_title: None,
            total_found: 1,
            total_filtered: 1,
        }
    }
}

/// Filename for a selected variant, e.g. `video_1080p_vod.mp4`. Audio-only
/// codecs get an `.m4a` audio name.
fn variant_filename(quality: &str, codecs: Option<&str>, stream_type: StreamType) -> String {
    let kind = stream_type.as_str();
    if let Some(codecs) = codecs {
        let c = codecs.to_ascii_lowercase();
        let audio_only = c.contains("mp4a") && !c.contains("avc") && !c.contains("h264");
        if audio_only {
            return format!("audio_{}_{}.m4a", quality, kind);
        }
    }
    format!("video_{}_{}.mp4", quality, kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_filenames() {
        assert_eq!(
            variant_filename("1080p", Some("avc1.4d,mp4a.40.2"), StreamType::Vod),
            "video_1080p_vod.mp4"
        );
        assert_eq!(
            variant_filename("128k", Some("mp4a.40.2"), StreamType::Live),
            "audio_128k_live.m4a"
        );
        assert_eq!(
            variant_filename("720p", None, StreamType::Event),
            "video_720p_event.mp4"
        );
    }
}
