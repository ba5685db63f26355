//! File and directory naming for the local filesystem backend.
//!
//! Stored names are `{stem}` or `{stem}.{ext}` where the stem matches
//! `[A-Za-z0-9_-]+` and the extension `[A-Za-z0-9_-]{1,16}`. Subdirectories
//! match `[A-Za-z0-9_-]+`. Tokens are `"{subdir}/{filename}"`.

use crate::types::DataToken;
use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static FILE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+(\.[A-Za-z0-9_-]{1,16})?$").expect("valid file name regex")
});
static SUBDIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid subdir regex"));
static EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,16}$").expect("valid extension regex"));

/// Extensions never kept from an original name, even when preserving names.
pub const BLACKLISTED_EXTENSIONS: &[&str] = &[
    "asp", "aspx", "bat", "cgi", "cmd", "com", "dll", "exe", "htaccess", "jar", "jsp", "msi",
    "phar", "php", "php3", "php4", "php5", "php7", "phps", "pht", "phtml", "pl", "py", "scr",
    "sh", "shtml", "vbs",
];

/// Longest stem accepted from an original name.
pub const MAX_ORIGINAL_STEM: usize = 64;

pub fn is_valid_file_name(name: &str) -> bool {
    FILE_NAME.is_match(name)
}

pub fn is_valid_subdir(name: &str) -> bool {
    SUBDIR.is_match(name)
}

/// Split a local token into `(subdir, filename)`.
pub fn parse_token(data: &DataToken) -> Option<(&str, &str)> {
    let (subdir, file_name) = data.as_str().split_once('/')?;
    if is_valid_subdir(subdir) && is_valid_file_name(file_name) {
        Some((subdir, file_name))
    } else {
        None
    }
}

pub fn make_token(subdir: &str, file_name: &str) -> DataToken {
    DataToken::new(format!("{}/{}", subdir, file_name))
}

/// Lowercased extension if it matches the allowed charset and length.
pub fn sanitize_extension(extension: &str) -> Option<String> {
    let lowered = extension.to_ascii_lowercase();
    if EXTENSION.is_match(&lowered) {
        Some(lowered)
    } else {
        None
    }
}

pub fn is_blacklisted(extension: &str) -> bool {
    let lowered = extension.to_ascii_lowercase();
    BLACKLISTED_EXTENSIONS.contains(&lowered.as_str())
}

/// Random lowercase alphanumeric string.
pub fn random_name(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len.max(1))
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

pub fn with_extension(stem: &str, extension: Option<&str>) -> String {
    match extension {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    }
}

/// Sanitized version of a client-supplied name, or `None` when it cannot be
/// kept safely.
///
/// The name is NFC-normalized, reduced to its last path segment, and
/// whitespace becomes `_`. Names with other characters outside the stored
/// charset, over-long stems, and blacklisted extensions are rejected.
pub fn sanitize_original_name(name: &str) -> Option<String> {
    let normalized: String = name.nfc().collect();
    let base = normalized
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    let base: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();

    let (stem, extension) = match base.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (base.as_str(), None),
    };
    if stem.is_empty() || stem.len() > MAX_ORIGINAL_STEM {
        return None;
    }
    let extension = match extension {
        Some(ext) => {
            if is_blacklisted(ext) {
                return None;
            }
            Some(sanitize_extension(ext)?)
        }
        None => None,
    };
    let candidate = with_extension(stem, extension.as_deref());
    if is_valid_file_name(&candidate) {
        Some(candidate)
    } else {
        None
    }
}
