//! Utility helpers shared by the normalizer and the collector.
//!
//! IMPORTANT:
//! - No feed-specific control flow lives here.
//! - Everything in this module is pure and deterministic.
//!
use sha1::{Digest, Sha1};

/// Lowercase hex SHA-1 digest of the UTF-8 bytes of `input`.
///
/// Always 40 characters long.
pub fn sha1_hex(input: &str) -> String {
    hex::encode(Sha1::digest(input.as_bytes()))
}

/// Returns everything after the last occurrence of `marker`.
///
/// Examples:
/// - ("at://did:plc:x/app.bsky.feed.post/abc", "/app.bsky.feed.post/") -> "abc"
/// - ("at://did:plc:x/app.bsky.feed.like/abc", "/app.bsky.feed.post/") -> unchanged
///
pub fn after_last_marker<'a>(uri: &'a str, marker: &str) -> &'a str {
    match uri.rfind(marker) {
        Some(idx) => &uri[idx + marker.len()..],
        None => uri,
    }
}

/// Length in characters (Unicode scalar values), not bytes.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
