//! Event normalizer
//!
//! Two steps:
//! - `PostCommit::from_event` decides whether an event is a
//!   newly created post. Nothing else ever reaches `normalize`.
//! - `normalize` turns a `PostCommit` into a `NormalizedItem`
//!   and cannot fail.

use anyhow::{Result, anyhow};
use serde_json::Value;

use crate::{
    schema::{CommitOperation, DOMAIN, NormalizedItem, POST_COLLECTION, RawEvent},
    util,
};

/// Path segment that precedes a post's record key in an AT URI.
pub const POST_URI_MARKER: &str = "/app.bsky.feed.post/";

/// A `create` commit on the post collection.
///
/// Only constructible through `from_event`.
#[derive(Debug, Clone)]
pub struct PostCommit {
    did: String,
    rkey: String,
    record: Value,
}

impl PostCommit {
    /// Filters a decoded event down to a post creation.
    ///
    /// RETURNS:
    /// - `Ok(None)` for events without a commit, other collections,
    ///   and update/delete operations
    /// - `Err` when a post creation lacks `did` or `rkey`
    pub fn from_event(event: RawEvent) -> Result<Option<Self>> {
        let Some(commit) = event.commit else {
            return Ok(None);
        };
        if commit.collection != POST_COLLECTION || commit.operation != CommitOperation::Create {
            return Ok(None);
        }

        let did = event
            .did
            .ok_or_else(|| anyhow!("post commit without did"))?;
        let rkey = commit
            .rkey
            .ok_or_else(|| anyhow!("post commit without rkey (did={did})"))?;

        Ok(Some(Self {
            did,
            rkey,
            record: commit.record.unwrap_or(Value::Null),
        }))
    }

    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn rkey(&self) -> &str {
        &self.rkey
    }
}

/// Builds the canonical item for one post creation.
///
/// Missing optional fields degrade to empty strings.
pub fn normalize(post: &PostCommit) -> NormalizedItem {
    let record = &post.record;

    let external_parent_id = record
        .pointer("/reply/parent/uri")
        .map(|uri| util::after_last_marker(&text_of(uri), POST_URI_MARKER).to_string())
        .unwrap_or_default();

    NormalizedItem {
        content: record.get("text").map(text_of).unwrap_or_default(),
        author: util::sha1_hex(&post.did),
        created_at: record.get("createdAt").map(text_of).unwrap_or_default(),
        domain: DOMAIN.to_string(),
        external_id: post.rkey.clone(),
        external_parent_id,
        url: format!("https://{}/profile/{}/post/{}", DOMAIN, post.did, post.rkey),
    }
}

/// Strings pass through, null is empty, anything else is rendered as JSON.
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
