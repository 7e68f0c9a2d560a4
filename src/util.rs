use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

const DEFAULT_DOCUMENT_NAME: &str = "document";

#[inline]
pub(crate) fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs())
}

/// Generate a fresh identifier of the form `<prefix>_<32 hex chars>`.
pub(crate) fn generate_id(prefix: &str) -> String {
    let uuid = uuid::Uuid::new_v4();
    let mut out = String::with_capacity(prefix.len() + 33);
    out.push_str(prefix);
    out.push('_');
    out.push_str(uuid.simple().encode_lower(&mut uuid::Uuid::encode_buffer()));
    out
}

#[inline]
pub(crate) fn base64_encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// A parsed `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DataUri<'a> {
    pub media_type: &'a str,
    pub is_base64: bool,
    pub data: &'a str,
}

/// Split a `data:[<media-type>][;base64],<data>` URI. Returns `None` for other URLs.
pub(crate) fn parse_data_uri(url: &str) -> Option<DataUri<'_>> {
    let rest = url.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let (media_type, is_base64) = match header.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (header, false),
    };
    // Drop parameters such as `;charset=utf-8`.
    let media_type = media_type.split(';').next().unwrap_or_default();
    Some(DataUri {
        media_type,
        is_base64,
        data,
    })
}

/// Build `data:<media_type>;base64,<data>` from already-encoded data.
pub(crate) fn format_data_uri(media_type: &str, base64_data: &str) -> String {
    let mut out = String::with_capacity(media_type.len() + base64_data.len() + 13);
    out.push_str("data:");
    out.push_str(media_type);
    out.push_str(";base64,");
    out.push_str(base64_data);
    out
}

/// Return the lowercase extension of a file name, if any.
pub(crate) fn file_extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Normalize a document name to the vendor's allowed character set.
///
/// Allowed: alphanumerics, single spaces, hyphens, parentheses, square brackets.
/// The extension is removed (the document format carries it), other characters
/// become spaces, whitespace runs collapse, and an empty result becomes `document`.
#[must_use]
pub fn normalize_document_name(name: &str) -> String {
    let stem = match file_extension(name) {
        Some(ext) => &name[..name.len() - ext.len() - 1],
        None => name,
    };

    let mut out = String::with_capacity(stem.len());
    let mut pending_space = false;
    for ch in stem.chars() {
        let allowed = ch.is_alphanumeric() || matches!(ch, '-' | '(' | ')' | '[' | ']');
        if allowed {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else {
            pending_space = true;
        }
    }

    if out.is_empty() {
        DEFAULT_DOCUMENT_NAME.to_string()
    } else {
        out
    }
}
