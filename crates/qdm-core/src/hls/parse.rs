//! m3u8 playlist decoding.

use crate::error::{QdmError, QdmResult};

use super::types::{quality_label, HlsManifest, HlsSegment, HlsVariant, StreamType};

impl HlsManifest {
    /// Parse an m3u8 document. Relative URIs resolve against `base_url`.
    pub fn parse(content: &str, base_url: &str) -> QdmResult<HlsManifest> {
        let lines: Vec<&str> = content.lines().map(str::trim).collect();
        if lines.first().map_or(true, |l| !l.starts_with("#EXTM3U")) {
            return Err(QdmError::InvalidManifest(
                "missing #EXTM3U header".to_string(),
            ));
        }

        let mut manifest = HlsManifest {
            version: None,
            is_master: false,
            stream_type: StreamType::Live,
            target_duration: 0,
            duration: 0.0,
            variants: Vec::new(),
            segments: Vec::new(),
        };
        let mut saw_endlist = false;
        let mut event_type = false;

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];
            if line.is_empty() {
                i += 1;
                continue;
            }

            if let Some(v) = line.strip_prefix("#EXT-X-VERSION:") {
                manifest.version = v.trim().parse().ok();
            } else if let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") {
                manifest.is_master = true;
                if let Some((uri, next)) = next_uri_line(&lines, i + 1) {
                    manifest
                        .variants
                        .push(parse_variant(attrs, &resolve(uri, base_url)));
                    i = next;
                }
            } else if let Some(v) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
                manifest.target_duration = v.trim().parse().unwrap_or(0);
            } else if let Some(v) = line.strip_prefix("#EXT-X-PLAYLIST-TYPE:") {
                event_type = v.trim().eq_ignore_ascii_case("EVENT");
            } else if line.starts_with("#EXT-X-ENDLIST") {
                saw_endlist = true;
            } else if let Some(v) = line.strip_prefix("#EXTINF:") {
                let duration: f64 = v
                    .split(',')
                    .next()
                    .and_then(|d| d.trim().parse().ok())
                    .unwrap_or(0.0);
                if let Some((uri, next)) = next_uri_line(&lines, i + 1) {
                    manifest.duration += duration;
                    manifest.segments.push(HlsSegment {
                        uri: resolve(uri, base_url),
                        duration,
                    });
                    i = next;
                }
            }
            i += 1;
        }

        // Liveness is a media-playlist property: a master playlist never
        // carries an endlist, so it reads as VOD.
        manifest.stream_type = if saw_endlist || manifest.is_master {
            StreamType::Vod
        } else if event_type {
            StreamType::Event
        } else {
            StreamType::Live
        };
        Ok(manifest)
    }
}

/// First non-comment, non-empty line at or after `from`; returns the line
/// and its index.
fn next_uri_line<'a>(lines: &[&'a str], from: usize) -> Option<(&'a str, usize)> {
    lines[from.min(lines.len())..]
        .iter()
        .enumerate()
        .find(|(_, l)| !l.is_empty() && !l.starts_with('#'))
        .map(|(off, l)| (*l, from + off))
}

fn resolve(uri: &str, base_url: &str) -> String {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return uri.to_string();
    }
    url::Url::parse(base_url)
        .and_then(|b| b.join(uri))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| uri.to_string())
}

fn parse_variant(attrs: &str, uri: &str) -> HlsVariant {
    let mut bandwidth = None;
    let mut resolution = None;
    let mut codecs = None;
    let mut audio_group = None;
    let mut subtitle_group = None;

    for (key, value) in split_attributes(attrs) {
        match key.to_ascii_uppercase().as_str() {
            "BANDWIDTH" => bandwidth = value.parse::<u64>().ok(),
            "RESOLUTION" => resolution = Some(value.clone()),
            "CODECS" => codecs = Some(value.clone()),
            "AUDIO" => audio_group = Some(value.clone()),
            "SUBTITLES" => subtitle_group = Some(value.clone()),
            _ => {}
        }
    }

    let quality = quality_label(resolution.as_deref(), bandwidth);
    HlsVariant {
        uri: uri.to_string(),
        bandwidth,
        resolution,
        codecs,
        audio_group,
        subtitle_group,
        quality_label: quality,
        estimated_size: None,
    }
}

/// Split an attribute list on commas outside double quotes, yielding
/// `(KEY, unquoted value)` pairs. Quotes matter: CODECS values contain
/// commas.
fn split_attributes(attrs: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in attrs.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                pairs.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        pairs.push(current);
    }

    pairs
        .iter()
        .filter_map(|p| {
            let (k, v) = p.split_once('=')?;
            Some((k.trim().to_string(), v.trim().trim_matches('"').to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://cdn.example.com/streams/show/master.m3u8";

    #[test]
    fn rejects_non_hls_content() {
        let err = HlsManifest::parse("<html></html>", BASE).unwrap_err();
        assert!(matches!(err, QdmError::InvalidManifest(_)));
        assert!(HlsManifest::parse("", BASE).is_err());
    }

    #[test]
    fn master_playlist_variants() {
        let m3u8 = "#EXTM3U\n\
            #EXT-X-VERSION:3\n\
            #EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720,CODECS=\"avc1.4d401f,mp4a.40.2\"\n\
            720/index.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=6000000,RESOLUTION=1920x1080,AUDIO=\"aud1\"\n\
            https://other.example.com/1080.m3u8\n";
        let m = HlsManifest::parse(m3u8, BASE).unwrap();
        assert!(m.is_master);
        assert_eq!(m.version, Some(3));
        assert_eq!(m.stream_type, StreamType::Vod);
        assert_eq!(m.variants.len(), 2);

        let v0 = &m.variants[0];
        assert_eq!(v0.uri, "https://cdn.example.com/streams/show/720/index.m3u8");
        assert_eq!(v0.bandwidth, Some(2_500_000));
        assert_eq!(v0.resolution.as_deref(), Some("1280x720"));
        assert_eq!(v0.codecs.as_deref(), Some("avc1.4d401f,mp4a.40.2"));
        assert_eq!(v0.quality_label, "720p");

        let v1 = &m.variants[1];
        assert_eq!(v1.uri, "https://other.example.com/1080.m3u8");
        assert_eq!(v1.audio_group.as_deref(), Some("aud1"));
        assert_eq!(v1.quality_label, "1080p");
    }

    #[test]
    fn media_playlist_segments_and_duration() {
        let m3u8 = "#EXTM3U\n\
            #EXT-X-TARGETDURATION:10\n\
            #EXTINF:9.5,\n\
            seg0.ts\n\
            #EXTINF:10.0,\n\
            seg1.ts\n\
            #EXTINF:4.25,\n\
            seg2.ts\n\
            #EXT-X-ENDLIST\n";
        let m = HlsManifest::parse(m3u8, BASE).unwrap();
        assert!(!m.is_master);
        assert_eq!(m.stream_type, StreamType::Vod);
        assert_eq!(m.target_duration, 10);
        assert_eq!(m.segments.len(), 3);
        assert!((m.duration - 23.75).abs() < 1e-9);
        assert_eq!(
            m.segments[0].uri,
            "https://cdn.example.com/streams/show/seg0.ts"
        );
        assert_eq!(m.segments[2].duration, 4.25);
    }

    #[test]
    fn missing_endlist_means_live() {
        let m3u8 = "#EXTM3U\n#EXTINF:6.0,\nseg0.ts\n";
        let m = HlsManifest::parse(m3u8, BASE).unwrap();
        assert_eq!(m.stream_type, StreamType::Live);
    }

    #[test]
    fn event_playlist_type() {
        let m3u8 = "#EXTM3U\n#EXT-X-PLAYLIST-TYPE:EVENT\n#EXTINF:6.0,\nseg0.ts\n";
        let m = HlsManifest::parse(m3u8, BASE).unwrap();
        assert_eq!(m.stream_type, StreamType::Event);
    }

    #[test]
    fn comments_between_extinf_and_uri_are_skipped() {
        let m3u8 = "#EXTM3U\n\
            #EXTINF:5.0,\n\
            #EXT-X-SOME-TAG\n\
            seg0.ts\n\
            #EXT-X-ENDLIST\n";
        let m = HlsManifest::parse(m3u8, BASE).unwrap();
        assert_eq!(m.segments.len(), 1);
        assert!(m.segments[0].uri.ends_with("seg0.ts"));
    }

    #[test]
    fn quoted_attribute_commas_do_not_split() {
        let pairs = split_attributes("BANDWIDTH=100,CODECS=\"a,b,c\",AUDIO=\"x\"");
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[1], ("CODECS".to_string(), "a,b,c".to_string()));
    }
}
