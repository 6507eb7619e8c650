//! Local naming for downloads.
//!
//! Owns every name a task puts on disk: the logical filename (from the
//! Content-Disposition header or the URL path), the short task tag that
//! keys staging files and fallback output names, and Linux sanitization.

/// Used when neither the URL path nor Content-Disposition yields a name.
const DEFAULT_FILENAME: &str = "download.bin";

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

const TAG_LEN: usize = 8;

/// Short per-task tag mixed into staging names (`<name>.<tag>.part`) and
/// tag-based fallback names, so two tasks that derive the same logical
/// filename never share files on disk.
pub fn task_tag(task_id: &str) -> String {
    task_id.chars().take(TAG_LEN).collect()
}

/// Derive the logical local filename for `url`. A Content-Disposition
/// filename wins over the URL path; the result is sanitized, with
/// `download.bin` as the last resort.
pub fn derive_filename(url: &str, content_disposition: Option<&str>) -> String {
    let hinted = content_disposition
        .and_then(disposition_filename)
        .or_else(|| filename_from_url_path(url));
    match hinted.as_deref().map(sanitize) {
        Some(name) if !name.is_empty() => name,
        _ => DEFAULT_FILENAME.to_string(),
    }
}

/// Last non-empty path segment of `url`, or None for root/unparseable URLs.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    (segment != "." && segment != "..").then(|| segment.to_string())
}

/// Filename from a Content-Disposition value. The RFC 5987 `filename*=`
/// parameter (percent-encoded, with an optional language tag) takes
/// precedence over a plain `filename=`; only the UTF-8 charset is
/// accepted.
fn disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in value.split(';') {
        let Some((key, v)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => extended = decode_extended_value(v.trim()),
            "filename" => plain = Some(unquote(v.trim())),
            _ => {}
        }
    }

    extended.or(plain).filter(|name| !name.is_empty())
}

/// RFC 5987 `charset'language'value`: the charset must be UTF-8, the
/// language tag is ignored, the value is percent-decoded.
fn decode_extended_value(v: &str) -> Option<String> {
    let mut parts = v.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;
    if !charset.eq_ignore_ascii_case("utf-8") {
        return None;
    }
    Some(percent_decode(encoded))
}

fn percent_decode(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit()
        {
            let byte = u8::from_str_radix(&encoded[i + 1..i + 3], 16).unwrap_or(b'%');
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Strip one level of surrounding double quotes and unescape `\"`.
fn unquote(v: &str) -> String {
    v.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(v)
        .replace("\\\"", "\"")
}

/// Linux-safe name: path separators, control characters, and whitespace
/// collapse into single underscores; leading and trailing dots, spaces,
/// and underscores are trimmed; the result is clipped to NAME_MAX bytes on
/// a character boundary.
fn sanitize(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '/' | '\\' | '\0') || c.is_control() || c.is_whitespace() {
            if !name.ends_with('_') {
                name.push('_');
            }
        } else {
            name.push(c);
        }
    }
    clip(name.trim_matches(['.', '_', ' ']), NAME_MAX).to_string()
}

fn clip(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = 0;
    for (i, c) in s.char_indices() {
        let next = i + c.len_utf8();
        if next > max {
            break;
        }
        end = next;
    }
    &s[..end]
}
