//! Segment fetch loop and sequential merge for one HLS variant.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use crate::error::QdmError;
use crate::http::HttpClient;

use super::types::{HlsManifest, StreamType};

/// Downloads a media playlist's segments in order and merges them into one
/// output file. Pause is observed between segments.
pub struct HlsDownloader {
    http: Arc<HttpClient>,
}

impl HlsDownloader {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    /// Fetch every segment of the media playlist at `media_url` and merge
    /// them into `output_path` in playlist order.
    ///
    /// Returns Ok(true) on a complete merge and Ok(false) when the pause
    /// token tripped between segments (nothing is merged in that case).
    /// Any segment failure aborts the whole download; there is no partial
    /// success. LIVE playlists are refused: without an endlist the segment
    /// list can grow without bound.
    pub async fn download_variant(
        &self,
        media_url: &str,
        output_path: &Path,
        pause: Arc<AtomicBool>,
        mut on_progress: impl FnMut(u64, Option<u64>),
    ) -> Result<bool> {
        let manifest = self.fetch_manifest(media_url).await?;
        if manifest.is_master {
            return Err(QdmError::InvalidManifest(format!(
                "{} is a master playlist, expected a media playlist",
                media_url
            ))
            .into());
        }
        if manifest.stream_type == StreamType::Live {
            return Err(QdmError::InvalidManifest(format!(
                "{} is a live stream (no #EXT-X-ENDLIST); refusing unbounded download",
                media_url
            ))
            .into());
        }

        let scratch = tempfile::Builder::new()
            .prefix("qdm-hls-")
            .tempdir()
            .context("create HLS scratch dir")?;

        let total_segments = manifest.segments.len();
        let mut downloaded: u64 = 0;
        let mut parts: Vec<PathBuf> = Vec::with_capacity(total_segments);

        for (i, segment) in manifest.segments.iter().enumerate() {
            if pause.load(Ordering::Relaxed) {
                tracing::info!(
                    "HLS download paused after segment {}/{}",
                    i,
                    total_segments
                );
                return Ok(false);
            }

            let body = self.fetch_segment(&segment.uri).await?;
            let part = scratch.path().join(format!("segment_{:05}.ts", i));
            tokio::fs::write(&part, &body)
                .await
                .with_context(|| format!("write segment {}", part.display()))?;
            downloaded += body.len() as u64;
            parts.push(part);
            on_progress(downloaded, None);
        }

        merge_segments(&parts, output_path).await?;
        tracing::debug!(
            segments = total_segments,
            bytes = downloaded,
            path = %output_path.display(),
            "HLS variant merged"
        );
        Ok(true)
    }

    async fn fetch_manifest(&self, media_url: &str) -> Result<HlsManifest> {
        let http = Arc::clone(&self.http);
        let url = media_url.to_string();
        let body = tokio::task::spawn_blocking(move || http.fetch_bytes(&url))
            .await
            .context("manifest fetch join")??;
        let text = String::from_utf8_lossy(&body);
        Ok(HlsManifest::parse(&text, media_url)?)
    }

    async fn fetch_segment(&self, uri: &str) -> Result<Vec<u8>> {
        let http = Arc::clone(&self.http);
        let _lease = http.lease(uri).await;
        let url = uri.to_string();
        let body = tokio::task::spawn_blocking(move || http.fetch_bytes(&url))
            .await
            .context("segment fetch join")??;
        Ok(body)
    }
}

/// Concatenate segment files into `output_path` in the given order.
async fn merge_segments(parts: &[PathBuf], output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut out = tokio::fs::File::create(output_path)
        .await
        .with_context(|| format!("create {}", output_path.display()))?;
    for part in parts {
        let data = tokio::fs::read(part)
            .await
            .with_context(|| format!("read segment {}", part.display()))?;
        out.write_all(&data).await?;
    }
    out.flush().await?;
    Ok(())
}
