//! End-to-end tests for the capture flow over a real listener

mod common;

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use handoff_core::{ReplayPolicy, SessionConfig};
use serde_json::{Value, json};

const WAIT: Duration = Duration::from_secs(2);

fn location_body() -> Value {
    json!({"latitude": 28.6, "longitude": 77.2, "accuracy": 10})
}

fn submit_body() -> Value {
    json!({"provider": "north", "identifier": "9876543210", "plan": "10"})
}

fn photo_body() -> Value {
    json!({
        "image": format!("data:image/png;base64,{}", STANDARD.encode(b"\x89PNG test")),
        "attempt": "upload",
        "timestamp": "2026-01-01T00:00:00Z",
    })
}

fn device_body() -> Value {
    json!({"user_agent": "integration-test", "language": "en"})
}

#[tokio::test]
async fn issued_session_renders_flow_immediately() {
    let server = common::create_test_server().await;
    let (id, url) = server.issue("operator-d").await;

    assert_eq!(url, server.url(&format!("/capture/{}", id)));
    let response = server.client.get(&url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let page = response.text().await.unwrap();
    assert!(page.contains(&id));
    assert!(page.contains("I agree"));
    assert!(!page.contains("invalid or expired"));
}

#[tokio::test]
async fn location_then_submit_relays_twice_with_enrichment() {
    let server = common::create_test_server().await;
    let id = server.consented_session("D").await;

    let (status, body) = server.callback(&id, "location", location_body()).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"success": true}));
    let (status, _) = server.callback(&id, "submit", submit_body()).await;
    assert_eq!(status, 200);

    // consent + location + submit
    let delivered = server.sink.wait_for(3, WAIT).await;
    assert_eq!(delivered.len(), 3);
    assert!(delivered.iter().all(|n| n.destination == "D"));

    let location = &delivered[1];
    assert_eq!(location.kind, "location");
    let submit = &delivered[2];
    assert_eq!(submit.kind, "submit");
    assert!(submit.text.contains("28.60000, 77.20000"));
    assert!(submit.text.contains("Identifier: 9876543210"));
    assert!(submit.text.contains("Provider: north"));
}

#[tokio::test]
async fn photo_to_unknown_session_fails_without_relay() {
    let server = common::create_test_server().await;

    let (status, body) = server
        .callback("never-issued-0000000000", "photo", photo_body())
        .await;
    assert_eq!(status, 404);
    assert_eq!(body, json!({"success": false, "error": "Invalid session"}));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.sink.delivered().await.is_empty());
    assert_eq!(server.state.relay.stats().enqueued, 0);
}

#[tokio::test]
async fn unknown_session_is_rejected_on_every_endpoint() {
    let server = common::create_test_server().await;
    let unknown = "ffffffffffffffffffffffffffffffff";

    for (endpoint, body) in [
        ("consent", json!({"accepted": true})),
        ("photo", photo_body()),
        ("device-info", device_body()),
        ("location", location_body()),
        ("submit", submit_body()),
        ("withdraw", json!({})),
    ] {
        let (status, body) = server.callback(unknown, endpoint, body).await;
        assert_eq!(status, 404, "endpoint {}", endpoint);
        assert_eq!(body["success"], false);
    }

    let page = server
        .client
        .get(server.url(&format!("/capture/{}", unknown)))
        .send()
        .await
        .unwrap();
    assert_eq!(page.status().as_u16(), 404);

    assert!(server.state.store.is_empty().await);
    assert!(server.sink.delivered().await.is_empty());
}

/// All orderings of the four data callbacks
fn permutations(items: Vec<&'static str>) -> Vec<Vec<&'static str>> {
    if items.len() <= 1 {
        return vec![items];
    }
    let mut result = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.clone();
        let head = rest.remove(i);
        for mut tail in permutations(rest) {
            tail.insert(0, head);
            result.push(tail);
        }
    }
    result
}

#[tokio::test]
async fn accumulation_is_order_independent() {
    let server = common::create_test_server().await;
    let orders = permutations(vec!["device-info", "location", "photo", "submit"]);
    assert_eq!(orders.len(), 24);

    for order in orders {
        let id = server.consented_session("op-perm").await;
        for endpoint in &order {
            let body = match *endpoint {
                "device-info" => device_body(),
                "location" => location_body(),
                "photo" => photo_body(),
                _ => submit_body(),
            };
            let (status, _) = server.callback(&id, endpoint, body).await;
            assert_eq!(status, 200, "{:?}", order);
        }

        let session = server.state.store.get(&id).await.unwrap();
        assert!(session.device_info.is_some(), "{:?}", order);
        assert!(session.location.is_some(), "{:?}", order);
        assert_eq!(session.photos_received, 1, "{:?}", order);
        assert_eq!(session.last_identifier.as_deref(), Some("9876543210"));
        assert!(session.used);
    }
}

#[tokio::test]
async fn every_relay_targets_the_issuing_destination() {
    let server = common::create_test_server().await;
    let first = server.consented_session("dest-one").await;
    let second = server.consented_session("dest-two").await;

    for id in [&first, &second] {
        server.callback(id, "device-info", device_body()).await;
        server.callback(id, "location", location_body()).await;
        server.callback(id, "photo", photo_body()).await;
        server.callback(id, "submit", submit_body()).await;
    }

    let delivered = server.sink.wait_for(10, WAIT).await;
    assert_eq!(delivered.len(), 10);
    for notification in delivered {
        let expected = if notification.session_id == first {
            "dest-one"
        } else {
            "dest-two"
        };
        assert_eq!(notification.destination, expected);
    }
}

#[tokio::test]
async fn duplicate_submit_is_accepted_under_allow_policy() {
    let server = common::create_test_server().await;
    let id = server.consented_session("op-dup").await;

    let (first, _) = server.callback(&id, "submit", submit_body()).await;
    let (second, body) = server.callback(&id, "submit", submit_body()).await;
    assert_eq!(first, 200);
    assert_eq!(second, 200);
    assert_eq!(body["success"], true);

    let delivered = server.sink.wait_for(3, WAIT).await;
    assert_eq!(delivered.iter().filter(|n| n.kind == "submit").count(), 2);
}

#[tokio::test]
async fn duplicate_submit_is_refused_under_reject_policy() {
    let server = common::create_test_server_with_session(SessionConfig {
        replay: ReplayPolicy::Reject,
        ..SessionConfig::default()
    })
    .await;
    let id = server.consented_session("op-dup").await;

    let (first, _) = server.callback(&id, "submit", submit_body()).await;
    let (second, body) = server.callback(&id, "submit", submit_body()).await;
    assert_eq!(first, 200);
    assert_eq!(second, 409);
    assert_eq!(body["error"], "Session already used");

    tokio::time::sleep(Duration::from_millis(50)).await;
    let delivered = server.sink.delivered().await;
    assert_eq!(delivered.iter().filter(|n| n.kind == "submit").count(), 1);
}

#[tokio::test]
async fn used_session_page_says_already_submitted() {
    let server = common::create_test_server().await;
    let id = server.consented_session("op-used").await;
    server.callback(&id, "submit", submit_body()).await;

    let response = server
        .client
        .get(server.url(&format!("/capture/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
    assert!(response.text().await.unwrap().contains("already been used"));
}

#[tokio::test]
async fn withdrawal_clears_data_and_closes_the_link() {
    let server = common::create_test_server().await;
    let id = server.consented_session("op-w").await;
    server.callback(&id, "location", location_body()).await;

    let (status, _) = server.callback(&id, "withdraw", json!({})).await;
    assert_eq!(status, 200);

    let session = server.state.store.get(&id).await.unwrap();
    assert!(session.withdrawn);
    assert!(session.location.is_none());

    let (status, body) = server.callback(&id, "submit", submit_body()).await;
    assert_eq!(status, 409);
    assert_eq!(body["error"], "Session withdrawn");

    let delivered = server.sink.wait_for(3, WAIT).await;
    let notice = delivered.iter().find(|n| n.kind == "withdraw").unwrap();
    assert!(!notice.text.contains("28.6"));
}

#[tokio::test]
async fn expired_session_is_treated_as_unknown() {
    let server = common::create_test_server_with_session(SessionConfig {
        ttl_secs: 1,
        ..SessionConfig::default()
    })
    .await;
    let (id, url) = server.issue("op-ttl").await;

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let response = server.client.get(&url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let (status, _) = server
        .callback(&id, "consent", json!({"accepted": true}))
        .await;
    assert_eq!(status, 404);
}
