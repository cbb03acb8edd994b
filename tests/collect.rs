use std::sync::Arc;
use std::time::Duration;

use bluesky_firehose_collector::{
    CollectionPolicy, EndpointPool, FanOut, NormalizedItem, Preset, RunParameters, SequentialRetry,
    feed::{ReplayEnd, ReplayScript, ReplayTransport},
};
use futures_util::StreamExt;
use serde_json::{Value, json};

fn create_post(did: &str, rkey: &str, record: Value) -> String {
    json!({
        "did": did,
        "time_us": 1737367200000000_i64,
        "kind": "commit",
        "commit": {
            "rev": "3lg5vh2w",
            "operation": "create",
            "collection": "app.bsky.feed.post",
            "rkey": rkey,
            "record": record,
            "cid": "bafyreib"
        }
    })
    .to_string()
}

fn sequential(transport: &Arc<ReplayTransport>) -> SequentialRetry {
    SequentialRetry::new(transport.clone(), EndpointPool::new(["jetstream.test"]))
        .with_attempts(1)
        .with_backoff(Duration::ZERO)
}

async fn run(policy: &dyn CollectionPolicy, options: Value) -> Vec<NormalizedItem> {
    let params = RunParameters::resolve(Some(&options), Preset::Standard);
    policy.collect(params).collect().await
}

#[tokio::test]
async fn single_post_is_emitted_then_stream_ends() {
    let script = ReplayScript::text([create_post("did:plc:a", "r1", json!({"text": "hi"}))]);
    let transport = Arc::new(ReplayTransport::new().with_default(script.ending(ReplayEnd::Hang)));
    let items = run(
        &sequential(&transport),
        json!({"maximum_items_to_collect": 1, "min_post_length": 0}),
    )
    .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].content, "hi");
    assert_eq!(transport.closes(), 1);
}

#[tokio::test]
async fn delete_operation_yields_nothing() {
    let delete = json!({
        "did": "did:plc:a",
        "kind": "commit",
        "commit": {"operation": "delete", "collection": "app.bsky.feed.post", "rkey": "r1"}
    })
    .to_string();
    let transport = Arc::new(ReplayTransport::new().with_default(ReplayScript::text([delete])));

    let items = run(&sequential(&transport), json!({"min_post_length": 0})).await;
    assert!(items.is_empty());
}

#[tokio::test]
async fn reply_parent_uri_is_reduced_to_record_key() {
    let reply = create_post(
        "did:plc:a",
        "r2",
        json!({
            "text": "agreed",
            "reply": {
                "root": {"uri": "at://did:plc:x/app.bsky.feed.post/root0", "cid": "c0"},
                "parent": {"uri": "at://did:plc:x/app.bsky.feed.post/abc123", "cid": "c1"}
            }
        }),
    );
    let transport = Arc::new(ReplayTransport::new().with_default(ReplayScript::text([reply])));

    let items = run(&sequential(&transport), json!({"min_post_length": 0})).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].external_parent_id, "abc123");
    assert_eq!(items[0].external_id, "r2");
}

#[tokio::test]
async fn missing_text_is_empty_and_dropped_by_length_gate() {
    let record = json!({"createdAt": "2025-01-20T10:00:00Z"});
    let script = ReplayScript::text([create_post("did:plc:a", "r3", record)]);

    let transport = Arc::new(ReplayTransport::new().with_default(script.clone()));
    let items = run(&sequential(&transport), json!({"min_post_length": 0})).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].content, "");
    assert_eq!(items[0].created_at, "2025-01-20T10:00:00Z");

    let transport = Arc::new(ReplayTransport::new().with_default(script));
    let items = run(&sequential(&transport), json!({"min_post_length": 1})).await;
    assert!(items.is_empty());
}

#[tokio::test]
async fn malformed_frame_does_not_stop_the_session() {
    let transport = Arc::new(ReplayTransport::new().with_default(ReplayScript::text([
        "{\"did\": \"did:plc:a\", \"commit\": ".to_string(),
        create_post("did:plc:a", "r4", json!({"text": "valid post"})),
    ])));

    let items = run(&sequential(&transport), json!({"min_post_length": 0})).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].content, "valid post");
}

#[tokio::test]
async fn items_carry_hashed_author_and_raw_did_url() {
    let did = "did:plc:h6xouawngwws7ozzjpxufyf4";
    let frame = create_post(did, "3lg5vh2vzis2q", json!({"text": "hello bluesky"}));
    let transport = Arc::new(ReplayTransport::new().with_default(ReplayScript::text([frame])));

    let items = run(&sequential(&transport), json!({})).await;
    let item = &items[0];

    assert_eq!(item.author.len(), 40);
    assert!(item.author.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    assert_ne!(item.author, did);
    assert_eq!(item.domain, "bsky.app");
    assert_eq!(item.url, format!("https://bsky.app/profile/{did}/post/3lg5vh2vzis2q"));
}

#[tokio::test]
async fn output_respects_budget_and_length_under_both_policies() {
    let frames: Vec<String> = (0..30)
        .map(|i| {
            let text = "x".repeat(i % 9);
            create_post(&format!("did:plc:{i}"), &format!("k{i}"), json!({"text": text}))
        })
        .collect();
    let transport = Arc::new(ReplayTransport::new().with_default(ReplayScript::text(frames)));
    let options = json!({"maximum_items_to_collect": 7, "min_post_length": 4});

    let seq = SequentialRetry::new(transport.clone(), EndpointPool::new(["a", "b"]))
        .with_backoff(Duration::ZERO);
    let fan = FanOut::new(transport.clone(), EndpointPool::new(["a", "b", "c", "d"]));

    for policy in [&seq as &dyn CollectionPolicy, &fan as &dyn CollectionPolicy] {
        let items = run(policy, options.clone()).await;
        // 3 qualifying posts per connection beat the budget of 7 under both policies
        assert_eq!(items.len(), 7, "{} emitted {}", policy.name(), items.len());
        assert!(items.iter().all(|i| i.content.chars().count() >= 4));
    }
}

#[tokio::test]
async fn total_upstream_outage_is_an_empty_stream() {
    let transport = Arc::new(
        ReplayTransport::new()
            .refuse("a")
            .refuse("b")
            .refuse("c")
            .refuse("d"),
    );
    let pool = EndpointPool::new(["a", "b", "c", "d"]);

    let seq = SequentialRetry::new(transport.clone(), pool.clone()).with_backoff(Duration::ZERO);
    assert!(run(&seq, json!({})).await.is_empty());

    let fan = FanOut::new(transport.clone(), pool);
    assert!(run(&fan, json!({})).await.is_empty());
    assert_eq!(transport.connects(), 0);
}
