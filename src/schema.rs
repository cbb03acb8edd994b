use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Collection NSID of Bluesky posts.
pub const POST_COLLECTION: &str = "app.bsky.feed.post";

/// Constant `domain` of every item produced by this source.
pub const DOMAIN: &str = "bsky.app";

// ------------------------------------------------------------
// Jetstream event (inbound)
// ------------------------------------------------------------
//
// One decoded frame of the Jetstream feed.
//
// Only `commit` events matter. Identity and account events
// carry no `commit` and are ignored by the pipeline.
//
// All fields are optional so that any well-formed JSON object
// decodes; presence checks happen in the normalizer.
//
#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    /// Repository DID of the author (e.g. "did:plc:...")
    #[serde(default)]
    pub did: Option<String>,

    /// Event kind ("commit", "identity", "account")
    #[serde(default)]
    pub kind: Option<String>,

    /// Server timestamp in microseconds
    #[serde(default)]
    pub time_us: Option<i64>,

    #[serde(default)]
    pub commit: Option<Commit>,
}

/// One record-level change.
#[derive(Debug, Clone, Deserialize)]
pub struct Commit {
    pub collection: String,
    pub operation: CommitOperation,

    /// Record key within the collection
    #[serde(default)]
    pub rkey: Option<String>,

    #[serde(default)]
    pub rev: Option<String>,

    #[serde(default)]
    pub cid: Option<String>,

    /// Record body; absent on deletes
    #[serde(default)]
    pub record: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitOperation {
    Create,
    Update,
    Delete,

    /// Anything the feed may add later
    #[serde(other)]
    Unknown,
}

// ------------------------------------------------------------
// Normalized item (outbound)
// ------------------------------------------------------------
//
// Canonical record handed to the caller.
//
// IMPORTANT:
// - `author` is the SHA-1 hex digest of the DID, never the DID
// - `url` embeds the raw DID (kept as the feed publishes it)
// - `external_parent_id` is empty for non-replies
//
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub content: String,
    pub author: String,
    pub created_at: String,
    pub domain: String,
    pub external_id: String,
    pub external_parent_id: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_commit_event() {
        let raw = r#"{
            "did": "did:plc:abc",
            "time_us": 1725911162329308,
            "kind": "commit",
            "commit": {
                "rev": "3l3qo2vutsw2b",
                "operation": "create",
                "collection": "app.bsky.feed.post",
                "rkey": "3l3qo2vuowo2b",
                "record": {
                    "$type": "app.bsky.feed.post",
                    "text": "hello",
                    "createdAt": "2024-09-09T19:46:02.102Z"
                },
                "cid": "bafyrei"
            }
        }"#;
        let event: RawEvent = serde_json::from_str(raw).unwrap();
        let commit = event.commit.unwrap();
        assert_eq!(commit.operation, CommitOperation::Create);
        assert_eq!(commit.collection, POST_COLLECTION);
        assert_eq!(commit.rkey.as_deref(), Some("3l3qo2vuowo2b"));
        assert_eq!(event.did.as_deref(), Some("did:plc:abc"));
    }

    #[test]
    fn identity_event_has_no_commit() {
        let raw = r#"{"did":"did:plc:abc","kind":"identity","identity":{"handle":"a.bsky.social"}}"#;
        let event: RawEvent = serde_json::from_str(raw).unwrap();
        assert!(event.commit.is_none());
    }

    #[test]
    fn unknown_operation_is_tolerated() {
        let raw = r#"{"did":"d","commit":{"collection":"app.bsky.feed.post","operation":"archive"}}"#;
        let event: RawEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.commit.unwrap().operation, CommitOperation::Unknown);
    }
}
