//! Stream analysis: enumerate variants of a playlist without downloading.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::http::HttpClient;

use super::types::{HlsManifest, HlsVariant, StreamType};

/// What `HlsAnalyzer::analyze` learns about a playlist URL.
#[derive(Debug, Clone)]
pub struct HlsSummary {
    pub master_url: String,
    pub stream_type: StreamType,
    /// Seconds, when derivable from a media playlist.
    pub duration: Option<f64>,
    pub variants: Vec<HlsVariant>,
}

/// Fetches a playlist and reports its variants (for a master playlist) or a
/// single pseudo-variant (for a bare media playlist).
pub struct HlsAnalyzer {
    http: Arc<HttpClient>,
}

impl HlsAnalyzer {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    pub async fn analyze(&self, url: &str) -> Result<HlsSummary> {
        let manifest = self.fetch(url).await?;

        if manifest.is_master {
            let mut variants = manifest.variants;
            // Size estimates need each variant's duration, which only the
            // media playlists know. Best effort for VOD; failures leave the
            // estimate empty.
            if manifest.stream_type != StreamType::Live {
                for variant in &mut variants {
                    variant.estimated_size = self.estimate_size(variant).await;
                }
            }
            return Ok(HlsSummary {
                master_url: url.to_string(),
                stream_type: manifest.stream_type,
                duration: None,
                variants,
            });
        }

        // A bare media playlist is reported as one unnamed variant.
        let variant = HlsVariant {
            uri: url.to_string(),
            bandwidth: None,
            resolution: None,
            codecs: None,
            audio_group: None,
            subtitle_group: None,
            quality_label: "media".to_string(),
            estimated_size: None,
        };
        Ok(HlsSummary {
            master_url: url.to_string(),
            stream_type: manifest.stream_type,
            duration: Some(manifest.duration),
            variants: vec![variant],
        })
    }

    async fn estimate_size(&self, variant: &HlsVariant) -> Option<u64> {
        let bandwidth = variant.bandwidth?;
        let media = self.fetch(&variant.uri).await.ok()?;
        if media.duration <= 0.0 {
            return None;
        }
        Some((bandwidth as f64 * media.duration / 8.0) as u64)
    }

    async fn fetch(&self, url: &str) -> Result<HlsManifest> {
        let http = Arc::clone(&self.http);
        let target = url.to_string();
        let body = tokio::task::spawn_blocking(move || http.fetch_bytes(&target))
            .await
            .context("playlist fetch join")??;
        Ok(HlsManifest::parse(&String::from_utf8_lossy(&body), url)?)
    }
}
