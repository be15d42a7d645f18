//! WebSocket hub tests: protocol shapes, unicast replies, broadcast fan-out

use std::time::Duration;

use futures_util::SinkExt;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

use crate::common::*;

#[tokio::test]
async fn test_connect_receives_snapshot() {
    let repo = TestRepo::new();
    repo.add_component("src", "Foo", &["v10", "v2", "v1_1"]);
    let addr = start_hub(repo.open().await).await;

    let (_ws, snapshot) = connect(addr).await;
    assert_eq!(versions_of(&snapshot, "Foo").unwrap(), ["v1_1", "v2", "v10"]);
    assert_eq!(snapshot["payload"]["components"][0]["path"], "src/Foo.tsx");
}

#[tokio::test]
async fn test_new_version_broadcast_then_ack() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1"]);
    let addr = start_hub(repo.open().await).await;
    let (mut ws, _) = connect(addr).await;

    send_json(&mut ws, json!({"type": "new_version", "payload": {"component": "Foo"}})).await;

    let (ack, before) = next_of_type(&mut ws, "ack").await;
    assert_eq!(ack["payload"]["version"], "v2");
    assert_eq!(ack["payload"]["message"], "created new version");
    assert!(ack["payload"].get("newVersion").is_none());

    assert_eq!(before.len(), 1, "expected the snapshot before the ack: {:?}", before);
    assert_eq!(versions_of(&before[0], "Foo").unwrap(), ["v1", "v2"]);
    assert!(repo.exists("Foo.v2.tsx"));
}

#[tokio::test]
async fn test_rename_ack_carries_both_keys() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1", "v2"]);
    let addr = start_hub(repo.open().await).await;
    let (mut ws, _) = connect(addr).await;

    send_json(
        &mut ws,
        json!({"type": "rename_version", "payload": {"component": "Foo", "version": "v2", "newVersion": "2.2"}}),
    )
    .await;

    let (ack, _) = next_of_type(&mut ws, "ack").await;
    assert_eq!(ack["payload"]["version"], "v2");
    assert_eq!(ack["payload"]["newVersion"], "v2_2");
    assert!(repo.exists("Foo.v2_2.tsx"));
}

#[tokio::test]
async fn test_errors_are_unicast() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1", "v2"]);
    let addr = start_hub(repo.open().await).await;
    let (mut requester, _) = connect(addr).await;
    let (mut observer, _) = connect(addr).await;

    send_json(
        &mut requester,
        json!({"type": "rename_version", "payload": {"component": "Foo", "version": "v2", "newVersion": "v1"}}),
    )
    .await;

    let error = next_json(&mut requester).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["payload"]["code"], "version_already_exists");
    assert!(error["payload"]["message"].as_str().unwrap().contains("v1"));

    assert!(try_next_json(&mut observer, Duration::from_millis(300)).await.is_none());
    assert!(repo.exists("Foo.v2.tsx"));
}

#[tokio::test]
async fn test_snapshot_fans_out_but_ack_does_not() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1"]);
    let addr = start_hub(repo.open().await).await;
    let (mut requester, _) = connect(addr).await;
    let (mut observer, _) = connect(addr).await;

    send_json(
        &mut requester,
        json!({"type": "duplicate_version", "payload": {"component": "Foo", "version": "v1"}}),
    )
    .await;

    let (ack, _) = next_of_type(&mut requester, "ack").await;
    assert_eq!(ack["payload"]["version"], "v1_1");
    assert_eq!(ack["payload"]["message"], "duplicated");

    let seen = next_json(&mut observer).await;
    assert_eq!(seen["type"], "components");
    assert_eq!(versions_of(&seen, "Foo").unwrap(), ["v1", "v1_1"]);
    assert!(try_next_json(&mut observer, Duration::from_millis(300)).await.is_none());
}

#[tokio::test]
async fn test_delete_last_version_over_socket() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1"]);
    let addr = start_hub(repo.open().await).await;
    let (mut ws, _) = connect(addr).await;

    send_json(
        &mut ws,
        json!({"type": "delete_version", "payload": {"component": "Foo", "version": "v1"}}),
    )
    .await;

    let error = next_json(&mut ws).await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["payload"]["code"], "last_version_delete_rejected");
    assert!(repo.exists("Foo.v1.tsx"));
}

#[tokio::test]
async fn test_malformed_messages_are_dropped() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1"]);
    let addr = start_hub(repo.open().await).await;
    let (mut ws, _) = connect(addr).await;

    ws.send(Message::Text("not json".to_string())).await.unwrap();
    send_json(&mut ws, json!({"type": "explode", "payload": {}})).await;
    send_json(&mut ws, json!({"type": "delete_version", "payload": {"component": "Foo"}})).await;
    assert!(try_next_json(&mut ws, Duration::from_millis(300)).await.is_none());

    // Connection is still usable
    send_json(&mut ws, json!({"type": "new_version", "payload": {"component": "Foo"}})).await;
    let (ack, skipped) = next_of_type(&mut ws, "ack").await;
    assert_eq!(ack["payload"]["version"], "v2");
    assert!(skipped.iter().all(|m| m["type"] != "error"));
}

#[tokio::test]
async fn test_init_over_socket() {
    let repo = TestRepo::new();
    repo.add_file("src/Card.jsx", "export default function Card() { return null; }\n");
    let addr = start_hub(repo.open().await).await;
    let (mut ws, snapshot) = connect(addr).await;
    assert_eq!(versions_of(&snapshot, "Card"), None);

    send_json(
        &mut ws,
        json!({"type": "init_component", "payload": {"component": "src/Card.jsx"}}),
    )
    .await;

    let (ack, before) = next_of_type(&mut ws, "ack").await;
    assert_eq!(ack["payload"]["component"], "Card");
    assert_eq!(ack["payload"]["message"], "initialized component");
    assert!(ack["payload"].get("version").is_none());
    assert_eq!(versions_of(&before[0], "Card").unwrap(), ["v1"]);
    assert!(repo.exists("src/Card.v1.jsx"));
    assert!(repo.exists("src/Card.versions.jsx"));
}

#[tokio::test]
async fn test_disconnected_requester_command_still_completes() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1"]);
    let addr = start_hub(repo.open().await).await;
    let (mut requester, _) = connect(addr).await;
    let (mut observer, _) = connect(addr).await;

    send_json(&mut requester, json!({"type": "new_version", "payload": {"component": "Foo"}})).await;
    drop(requester);

    let seen = next_json(&mut observer).await;
    assert_eq!(versions_of(&seen, "Foo").unwrap(), ["v1", "v2"]);
    assert!(repo.exists("Foo.v2.tsx"));
}

#[tokio::test]
async fn test_ping_is_answered() {
    let repo = TestRepo::new();
    let addr = start_hub(repo.open().await).await;
    let (mut ws, _) = connect(addr).await;

    ws.send(Message::Ping(b"hi".to_vec())).await.unwrap();
    let reply = tokio::time::timeout(RECV_TIMEOUT, async {
        use futures_util::StreamExt;
        loop {
            match ws.next().await {
                Some(Ok(Message::Pong(data))) => return data,
                Some(Ok(_)) => continue,
                other => panic!("connection ended: {:?}", other),
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(reply, b"hi".to_vec());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_burst_of_dependent_commands_applies_in_arrival_order() {
    let repo = TestRepo::new();
    repo.add_component("", "Foo", &["v1"]);
    let addr = start_hub(repo.open().await).await;
    let (mut ws, _) = connect(addr).await;

    for n in 1..=30 {
        send_json(
            &mut ws,
            json!({"type": "rename_version", "payload": {
                "component": "Foo",
                "version": format!("v{}", n),
                "newVersion": format!("v{}", n + 1),
            }}),
        )
        .await;
    }

    let mut renamed = Vec::new();
    let mut errors = Vec::new();
    while renamed.len() + errors.len() < 30 {
        let msg = next_json(&mut ws).await;
        match msg["type"].as_str() {
            Some("ack") => renamed.push(msg["payload"]["newVersion"].as_str().unwrap().to_string()),
            Some("error") => errors.push(msg["payload"]["message"].clone()),
            _ => {}
        }
    }

    assert!(errors.is_empty(), "renames applied out of order: {:?}", errors);
    renamed.sort_by_key(|v| v[1..].parse::<u32>().unwrap());
    let expected: Vec<String> = (2..=31).map(|n| format!("v{}", n)).collect();
    assert_eq!(renamed, expected);
    assert!(repo.exists("Foo.v31.tsx"));
    assert!(!repo.exists("Foo.v1.tsx"));
}
