//! Integration tests for [`RedpandaEventLog`] against a real Kafka instance.
//!
//! These tests use testcontainers to spin up Kafka and validate:
//! - Append/poll round-trip
//! - Per-key ordering
//! - Independent consumer groups
//! - Redelivery of uncommitted records after a consumer goes away
//! - Commits that are stored before the consumer is dropped
//!
//! # Running These Tests
//!
//! These tests are marked as `#[ignore]` by default because they:
//! - Require Docker to be running (for testcontainers)
//! - Take 15-60 seconds per test to spin up Kafka
//!
//! To run explicitly:
//! ```bash
//! cargo test -p bookbazaar-redpanda --test integration_tests -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use bookbazaar_core::event_log::{EventLog, LogRecord, Subscription};
use bookbazaar_redpanda::RedpandaEventLog;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::kafka::{KAFKA_PORT, Kafka};

/// Start Kafka and return the container (keep it alive) plus a ready log.
async fn start_kafka() -> (ContainerAsync<Kafka>, RedpandaEventLog) {
    let kafka = Kafka::default()
        .with_env_var("KAFKA_AUTO_CREATE_TOPICS_ENABLE", "true")
        .start()
        .await
        .expect("Failed to start Kafka container");

    let host = kafka.get_host().await.expect("Failed to get host");
    let port = kafka
        .get_host_port_ipv4(KAFKA_PORT)
        .await
        .expect("Failed to get port");
    let brokers = format!("{host}:{port}");

    let log = RedpandaEventLog::builder()
        .brokers(&brokers)
        .auto_offset_reset("earliest")
        .build()
        .expect("Failed to create event log");

    wait_for_kafka_ready(&log).await;
    (kafka, log)
}

/// Append to a warmup topic until the broker acknowledges.
async fn wait_for_kafka_ready(log: &RedpandaEventLog) {
    let max_attempts = 60;
    for attempt in 1..=max_attempts {
        if log.append("warmup-topic", "warmup", b"{}").await.is_ok() {
            tokio::time::sleep(Duration::from_millis(500)).await;
            return;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(
            attempt != max_attempts,
            "Kafka failed to become ready after {max_attempts} attempts"
        );
    }
}

/// Poll until `count` records arrived, committing each one.
async fn collect(subscription: &mut Box<dyn Subscription>, count: usize, commit: bool) -> Vec<LogRecord> {
    let mut received = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    while received.len() < count {
        assert!(
            tokio::time::Instant::now() < deadline,
            "Timeout waiting for records (got {})",
            received.len()
        );
        if let Some(record) = subscription
            .poll(Duration::from_secs(1))
            .await
            .expect("Failed to poll")
        {
            if commit {
                subscription.commit(&record).await.expect("Failed to commit");
            }
            received.push(record);
        }
    }
    received
}

#[tokio::test]
#[ignore]
async fn test_append_and_poll_round_trip() {
    let (_kafka, log) = start_kafka().await;

    let ack = log
        .append("orders-roundtrip", "42", br#"{"orderId":"o-1","bookId":42,"quantity":3}"#)
        .await
        .expect("Failed to append");
    assert!(ack.offset >= 0);

    let mut subscription = log
        .subscribe("orders-roundtrip", "roundtrip-group")
        .await
        .expect("Failed to subscribe");
    let received = collect(&mut subscription, 1, true).await;

    assert_eq!(received[0].key.as_deref(), Some("42"));
    assert_eq!(received[0].partition, ack.partition);
    assert_eq!(received[0].offset, ack.offset);
}

#[tokio::test]
#[ignore]
async fn test_same_key_keeps_write_order() {
    let (_kafka, log) = start_kafka().await;

    for payload in ["A", "B", "C"] {
        log.append("orders-ordering", "7", payload.as_bytes())
            .await
            .expect("Failed to append");
    }

    let mut subscription = log
        .subscribe("orders-ordering", "ordering-group")
        .await
        .expect("Failed to subscribe");
    let payloads: Vec<_> = collect(&mut subscription, 3, true)
        .await
        .into_iter()
        .map(|r| r.payload)
        .collect();

    assert_eq!(payloads, vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]);
}

#[tokio::test]
#[ignore]
async fn test_groups_consume_independently() {
    let (_kafka, log) = start_kafka().await;

    log.append("orders-groups", "1", b"x").await.expect("Failed to append");

    let mut billing = log
        .subscribe("orders-groups", "billing")
        .await
        .expect("Failed to subscribe billing");
    let mut shipping = log
        .subscribe("orders-groups", "shipping")
        .await
        .expect("Failed to subscribe shipping");

    assert_eq!(collect(&mut billing, 1, true).await[0].payload, b"x".to_vec());
    assert_eq!(collect(&mut shipping, 1, true).await[0].payload, b"x".to_vec());
}

#[tokio::test]
#[ignore]
async fn test_uncommitted_record_is_redelivered() {
    let (_kafka, log) = start_kafka().await;

    log.append("orders-redelivery", "9", b"r").await.expect("Failed to append");

    let mut crashed = log
        .subscribe("orders-redelivery", "redelivery-group")
        .await
        .expect("Failed to subscribe");
    let first = collect(&mut crashed, 1, false).await;
    drop(crashed);

    // Let the group rebalance after the member left.
    tokio::time::sleep(Duration::from_secs(3)).await;

    let mut restarted = log
        .subscribe("orders-redelivery", "redelivery-group")
        .await
        .expect("Failed to resubscribe");
    let second = collect(&mut restarted, 1, true).await;

    assert_eq!(first[0].offset, second[0].offset);
    assert_eq!(first[0].payload, second[0].payload);
}

#[tokio::test]
#[ignore]
async fn test_commit_is_stored_before_immediate_drop() {
    let (_kafka, log) = start_kafka().await;

    log.append("orders-commit", "5", b"first").await.expect("Failed to append");

    let mut stopping = log
        .subscribe("orders-commit", "commit-group")
        .await
        .expect("Failed to subscribe");
    let first = collect(&mut stopping, 1, true).await;
    drop(stopping);

    log.append("orders-commit", "5", b"second").await.expect("Failed to append");
    tokio::time::sleep(Duration::from_secs(3)).await;

    let mut restarted = log
        .subscribe("orders-commit", "commit-group")
        .await
        .expect("Failed to resubscribe");
    let next = collect(&mut restarted, 1, true).await;

    assert_eq!(next[0].payload, b"second".to_vec());
    assert_eq!(next[0].offset, first[0].offset + 1);
}
