//! Response-header collection and parsing.

/// Collects raw header lines from libcurl's header callback. Redirects
/// produce multiple header blocks; only the last block is kept.
#[derive(Debug, Default)]
pub(crate) struct HeaderCollector {
    lines: Vec<String>,
}

impl HeaderCollector {
    /// Feed one raw header line. A status line starts a fresh block.
    pub(crate) fn push(&mut self, raw: &[u8]) {
        let Ok(s) = std::str::from_utf8(raw) else {
            return;
        };
        let line = s.trim_end();
        if line.starts_with("HTTP/") {
            self.lines.clear();
        }
        self.lines.push(line.to_string());
    }

    pub(crate) fn block(&self) -> HeaderBlock {
        HeaderBlock::parse(&self.lines)
    }
}

/// Parsed view of one response header block.
#[derive(Debug, Clone, Default)]
pub(crate) struct HeaderBlock {
    pub status: u32,
    pub content_length: Option<u64>,
    pub accept_ranges: bool,
    pub chunked: bool,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub content_range_total: Option<u64>,
}

impl HeaderBlock {
    pub(crate) fn parse(lines: &[String]) -> HeaderBlock {
        let mut block = HeaderBlock::default();
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix("HTTP/") {
                // "HTTP/1.1 206 Partial Content"
                block.status = rest
                    .split_whitespace()
                    .nth(1)
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(0);
                continue;
            }
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                block.content_length = value.parse::<u64>().ok();
            } else if name.eq_ignore_ascii_case("accept-ranges") {
                block.accept_ranges = value.eq_ignore_ascii_case("bytes");
            } else if name.eq_ignore_ascii_case("transfer-encoding") {
                block.chunked = value.to_ascii_lowercase().contains("chunked");
            } else if name.eq_ignore_ascii_case("content-type") {
                block.content_type = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("content-disposition") {
                block.content_disposition = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("content-range") {
                block.content_range_total = content_range_total(value);
            }
        }
        block
    }

    /// Total transfer size as seen by a request starting at `start_byte`:
    /// the `Content-Range` total when present, else `Content-Length` offset
    /// by the resume position (the length only covers the remainder).
    pub(crate) fn total_hint(&self, start_byte: u64) -> Option<u64> {
        self.content_range_total
            .or_else(|| self.content_length.map(|len| len + start_byte))
    }
}

/// Parse the `/<total>` suffix of a `Content-Range` value, e.g.
/// `bytes 100-199/1000` → 1000. A `*` total yields None.
fn content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse::<u64>().ok()
}
