//! URL normalization and kind resolution.

use crate::http::Probe;

/// Resolved URL kind; one handler per kind, selected by match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    Direct,
    Page,
    Stream,
}

impl UrlKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UrlKind::Direct => "direct_file",
            UrlKind::Page => "html_page",
            UrlKind::Stream => "stream_hint",
        }
    }
}

/// Add a scheme when missing and strip the fragment.
pub(super) fn normalize_url(raw: &str) -> String {
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    match url::Url::parse(&with_scheme) {
        Ok(mut u) => {
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => with_scheme,
    }
}

/// `.m3u8` path suffix marks a stream hint without probing.
pub(super) fn is_stream_hint(url: &str) -> bool {
    url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase().ends_with(".m3u8"))
        .unwrap_or(false)
}

/// Kind from probe metadata: HTML content types are pages; attachment
/// dispositions, file-ish extensions, and file-ish content types are
/// direct files; everything else defaults to a page.
pub(super) fn kind_from_probe(url: &str, probe: &Probe) -> UrlKind {
    let content_type = probe
        .content_type
        .as_deref()
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("text/html") || content_type.starts_with("application/xhtml+xml") {
        return UrlKind::Page;
    }

    if let Some(disposition) = probe.content_disposition.as_deref() {
        let d = disposition.to_ascii_lowercase();
        if d.contains("attachment") || d.contains("filename=") {
            return UrlKind::Direct;
        }
    }

    if path_has_file_extension(url) {
        return UrlKind::Direct;
    }

    const FILE_TYPES: [&str; 8] = [
        "application/",
        "image/",
        "video/",
        "audio/",
        "text/plain",
        "text/csv",
        "text/javascript",
        "text/css",
    ];
    if FILE_TYPES.iter().any(|p| content_type.starts_with(p)) {
        return UrlKind::Direct;
    }

    UrlKind::Page
}

fn path_has_file_extension(url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(url) else {
        return false;
    };
    let path = parsed.path();
    let Some(last) = path.rsplit('/').next() else {
        return false;
    };
    match last.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && !ext.is_empty() && ext.len() <= 9,
        None => false,
    }
}
