//! HLS playlist model.

/// Playlist kind. Absent `#EXT-X-ENDLIST` means the stream is still being
/// extended (LIVE); `#EXT-X-PLAYLIST-TYPE:EVENT` marks an append-only event
/// stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Vod,
    Live,
    Event,
}

impl StreamType {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamType::Vod => "vod",
            StreamType::Live => "live",
            StreamType::Event => "event",
        }
    }
}

/// One rendition of a master playlist.
#[derive(Debug, Clone)]
pub struct HlsVariant {
    /// Absolute URL of the media playlist.
    pub uri: String,
    /// Bits per second, from BANDWIDTH.
    pub bandwidth: Option<u64>,
    /// "WxH" as advertised, e.g. "1920x1080".
    pub resolution: Option<String>,
    pub codecs: Option<String>,
    pub audio_group: Option<String>,
    pub subtitle_group: Option<String>,
    /// Human label like "1080p", derived from resolution or bandwidth.
    pub quality_label: String,
    /// `bandwidth * duration / 8` for VOD variants, when both are known.
    pub estimated_size: Option<u64>,
}

/// One media segment of a media playlist.
#[derive(Debug, Clone)]
pub struct HlsSegment {
    /// Absolute URL.
    pub uri: String,
    /// Seconds, from EXTINF.
    pub duration: f64,
}

/// Parsed playlist: a master playlist carries variants, a media playlist
/// carries segments.
#[derive(Debug, Clone)]
pub struct HlsManifest {
    pub version: Option<u32>,
    pub is_master: bool,
    pub stream_type: StreamType,
    /// Seconds, from EXT-X-TARGETDURATION.
    pub target_duration: u64,
    /// Sum of segment durations, seconds.
    pub duration: f64,
    pub variants: Vec<HlsVariant>,
    pub segments: Vec<HlsSegment>,
}

/// Quality label from resolution height, falling back to bandwidth bins.
pub fn quality_label(resolution: Option<&str>, bandwidth: Option<u64>) -> String {
    if let Some(height) = resolution.and_then(resolution_height) {
        let label = match height {
            h if h >= 2160 => "4K",
            h if h >= 1440 => "1440p",
            h if h >= 1080 => "1080p",
            h if h >= 720 => "720p",
            h if h >= 480 => "480p",
            _ => "360p",
        };
        return label.to_string();
    }
    match bandwidth {
        Some(b) if b >= 8_000_000 => "1080p+".to_string(),
        Some(b) if b >= 5_000_000 => "1080p".to_string(),
        Some(b) if b >= 2_500_000 => "720p".to_string(),
        Some(b) if b >= 1_000_000 => "480p".to_string(),
        Some(_) => "360p".to_string(),
        None => "unknown".to_string(),
    }
}

fn resolution_height(resolution: &str) -> Option<u32> {
    let (_, h) = resolution.split_once(['x', 'X'])?;
    h.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_from_resolution() {
        assert_eq!(quality_label(Some("3840x2160"), None), "4K");
        assert_eq!(quality_label(Some("2560x1440"), None), "1440p");
        assert_eq!(quality_label(Some("1920x1080"), None), "1080p");
        assert_eq!(quality_label(Some("1280x720"), None), "720p");
        assert_eq!(quality_label(Some("854x480"), None), "480p");
        assert_eq!(quality_label(Some("640x360"), None), "360p");
    }

    #[test]
    fn labels_fall_back_to_bandwidth() {
        assert_eq!(quality_label(None, Some(9_000_000)), "1080p+");
        assert_eq!(quality_label(None, Some(5_000_000)), "1080p");
        assert_eq!(quality_label(None, Some(2_500_000)), "720p");
        assert_eq!(quality_label(None, Some(1_000_000)), "480p");
        assert_eq!(quality_label(None, Some(500_000)), "360p");
        assert_eq!(quality_label(None, None), "unknown");
    }

    #[test]
    fn resolution_wins_over_bandwidth() {
        assert_eq!(quality_label(Some("1280x720"), Some(9_000_000)), "720p");
    }

    #[test]
    fn malformed_resolution_falls_through() {
        assert_eq!(quality_label(Some("garbage"), Some(5_000_000)), "1080p");
    }
}
