//! Magnet URI construction and parsing.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

static BTIH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"xt=urn:btih:([a-fA-F0-9]{40})").unwrap());

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MagnetError {
    #[error("not a magnet URI")]
    NotMagnet,

    #[error("magnet URI has no urn:btih info hash")]
    MissingHash,
}

/// Fields recovered from a magnet URI.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnetInfo {
    /// 40 lowercase hex characters.
    pub info_hash: String,
    pub display_name: Option<String>,
    pub trackers: Vec<String>,
}

/// Builds a magnet URI from an info hash, optional display name and
/// tracker URLs (at most 10 carried to keep the link short).
///
/// Assembled by hand so the colons in `urn:btih:` are never percent
/// encoded; only the `dn` and `tr` values are.
pub fn build(info_hash: &str, display_name: Option<&str>, trackers: &[String]) -> String {
    let mut uri = format!("magnet:?xt=urn:btih:{}", info_hash.to_lowercase());
    if let Some(name) = display_name {
        uri.push_str("&dn=");
        uri.push_str(&urlencoding::encode(name));
    }
    for tracker in trackers.iter().take(10) {
        uri.push_str("&tr=");
        uri.push_str(&urlencoding::encode(tracker));
    }
    uri
}

/// Parses a magnet URI. The `xt` parameter must carry a 40-hex
/// `urn:btih` hash; its absence fails the parse.
pub fn parse(uri: &str) -> Result<MagnetInfo, MagnetError> {
    if !uri.starts_with("magnet:") {
        return Err(MagnetError::NotMagnet);
    }

    let mut info_hash = None;
    let mut display_name = None;
    let mut trackers = Vec::new();

    let query = uri.splitn(2, '?').nth(1).unwrap_or("");
    for param in query.split('&') {
        let mut parts = param.splitn(2, '=');
        let key = parts.next().unwrap_or("");
        let value = parts.next().unwrap_or("");
        match key {
            "xt" => {
                if let Some(hex) = value.strip_prefix("urn:btih:") {
                    if hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                        info_hash = Some(hex.to_lowercase());
                    }
                }
            }
            "dn" => {
                display_name = urlencoding::decode(value)
                    .map(|s| s.into_owned())
                    .ok()
                    .filter(|s| !s.is_empty());
            }
            "tr" => {
                if let Ok(tracker) = urlencoding::decode(value) {
                    if !tracker.is_empty() {
                        trackers.push(tracker.into_owned());
                    }
                }
            }
            _ => {}
        }
    }

    let info_hash = info_hash.ok_or(MagnetError::MissingHash)?;
    Ok(MagnetInfo {
        info_hash,
        display_name,
        trackers,
    })
}

/// Scans any string for a `urn:btih` info hash and returns it lowercased.
/// This is the dedup key extraction used across the pipeline.
pub fn extract_hash(uri: &str) -> Option<String> {
    BTIH_RE
        .captures(uri)
        .map(|caps| caps[1].to_lowercase())
}

/// True if the string looks like a usable magnet link.
pub fn is_valid(uri: &str) -> bool {
    uri.starts_with("magnet:") && uri.contains("xt=urn:btih:")
}
