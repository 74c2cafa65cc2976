//! In-memory event log for fast, deterministic tests and local runs.
//!
//! [`InMemoryEventLog`] keeps the semantics the relay depends on from a real
//! broker:
//!
//! - Topics are split into partitions; a key always maps to the same partition
//! - Every partition assigns monotonically increasing offsets
//! - Each consumer group keeps its own committed offsets (log, not queue)
//! - Within a group, partitions are assigned round-robin to live members and a
//!   partition is owned by exactly one member at a time
//! - A member that leaves (its subscription is dropped) without committing
//!   causes redelivery from the last committed offset to the next owner
//! - A partition with a delivered, uncommitted record stays with the member
//!   holding it until that member commits or polls again, so a join never
//!   hands an in-flight key to a second member
//!
//! It can also simulate a broker outage ([`InMemoryEventLog::set_available`])
//! and slow acknowledgements ([`InMemoryEventLog::set_append_latency`]).
//!
//! # Example
//!
//! ```
//! use bookbazaar_core::event_log::EventLog;
//! use bookbazaar_testing::InMemoryEventLog;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let log = InMemoryEventLog::new();
//! log.append("order.placed", "42", b"{}").await?;
//!
//! let mut subscription = log.subscribe("order.placed", "order-service").await?;
//! let record = subscription.poll(Duration::from_millis(10)).await?.unwrap();
//! subscription.commit(&record).await?;
//!
//! assert_eq!(log.committed_offset("order.placed", "order-service", record.partition), Some(1));
//! # Ok(())
//! # }
//! ```

#![allow(clippy::missing_panics_doc)] // Lock poisoning is recovered, never panics

use bookbazaar_core::event_log::{AppendAck, EventLog, EventLogError, LogFuture, LogRecord, Subscription};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Default number of partitions per topic.
pub const DEFAULT_PARTITIONS: usize = 3;

#[derive(Clone, Debug)]
struct StoredRecord {
    key: Option<String>,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct GroupState {
    /// Live members in join order.
    members: Vec<u64>,
    /// Bumped on every join/leave so members can drop stale fetch positions.
    generation: u64,
    /// Next offset to deliver, per partition.
    committed: HashMap<i32, i64>,
    /// Partitions whose last delivered record is still being processed, and by whom.
    in_flight: HashMap<i32, u64>,
}

impl GroupState {
    fn owner_of(&self, partition: i32) -> Option<u64> {
        if let Some(&holder) = self.in_flight.get(&partition) {
            if self.members.contains(&holder) {
                return Some(holder);
            }
        }
        if self.members.is_empty() {
            return None;
        }
        let index = usize::try_from(partition).unwrap_or(0) % self.members.len();
        self.members.get(index).copied()
    }

    fn assignment(&self, member: u64, partitions: usize) -> Vec<i32> {
        (0..partitions)
            .filter_map(|p| i32::try_from(p).ok())
            .filter(|&p| self.owner_of(p) == Some(member))
            .collect()
    }
}

#[derive(Debug)]
struct LogState {
    partitions: usize,
    topics: HashMap<String, Vec<Vec<StoredRecord>>>,
    groups: HashMap<(String, String), GroupState>,
    next_member: u64,
    available: bool,
    append_latency: Option<Duration>,
}

impl LogState {
    fn topic_mut(&mut self, topic: &str) -> &mut Vec<Vec<StoredRecord>> {
        let partitions = self.partitions;
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); partitions])
    }

    fn ensure_available(&self) -> Result<(), EventLogError> {
        if self.available {
            Ok(())
        } else {
            Err(EventLogError::Transport("broker unreachable".to_string()))
        }
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<LogState>,
    appended: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Partitioned, group-aware event log held entirely in memory.
///
/// Cloning is cheap and every clone shares the same log.
#[derive(Clone, Debug)]
pub struct InMemoryEventLog {
    shared: Arc<Shared>,
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEventLog {
    /// Create an empty log with [`DEFAULT_PARTITIONS`] partitions per topic.
    #[must_use]
    pub fn new() -> Self {
        Self::with_partitions(DEFAULT_PARTITIONS)
    }

    /// Create an empty log with `partitions` partitions per topic (at least one).
    #[must_use]
    pub fn with_partitions(partitions: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(LogState {
                    partitions: partitions.max(1),
                    topics: HashMap::new(),
                    groups: HashMap::new(),
                    next_member: 0,
                    available: true,
                    append_latency: None,
                }),
                appended: Notify::new(),
            }),
        }
    }

    /// Partition a key maps to.
    #[must_use]
    pub fn partition_for(&self, key: &str) -> i32 {
        let partitions = self.shared.lock().partitions;
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = hasher.finish() % partitions as u64;
        i32::try_from(index).unwrap_or(0)
    }

    /// Simulate the broker going away (`false`) or coming back (`true`).
    ///
    /// While unavailable, every operation fails with a transient transport error.
    pub fn set_available(&self, available: bool) {
        self.shared.lock().available = available;
    }

    /// Delay every acknowledgement by `latency` (`None` to acknowledge immediately).
    pub fn set_append_latency(&self, latency: Option<Duration>) {
        self.shared.lock().append_latency = latency;
    }

    /// Every record of `topic`, partition by partition, in offset order.
    #[must_use]
    pub fn records(&self, topic: &str) -> Vec<LogRecord> {
        let state = self.shared.lock();
        let Some(partitions) = state.topics.get(topic) else {
            return Vec::new();
        };

        partitions
            .iter()
            .enumerate()
            .flat_map(|(partition, records)| {
                records.iter().enumerate().map(move |(offset, stored)| LogRecord {
                    topic: topic.to_string(),
                    partition: i32::try_from(partition).unwrap_or(i32::MAX),
                    offset: i64::try_from(offset).unwrap_or(i64::MAX),
                    key: stored.key.clone(),
                    payload: stored.payload.clone(),
                })
            })
            .collect()
    }

    /// Number of records appended to `topic`.
    #[must_use]
    pub fn record_count(&self, topic: &str) -> usize {
        self.shared
            .lock()
            .topics
            .get(topic)
            .map_or(0, |partitions| partitions.iter().map(Vec::len).sum())
    }

    /// Next offset `group` will receive from `partition`, if it ever committed there.
    #[must_use]
    pub fn committed_offset(&self, topic: &str, group: &str, partition: i32) -> Option<i64> {
        self.shared
            .lock()
            .groups
            .get(&(topic.to_string(), group.to_string()))
            .and_then(|g| g.committed.get(&partition).copied())
    }

    /// Number of live members in `group`.
    #[must_use]
    pub fn member_count(&self, topic: &str, group: &str) -> usize {
        self.shared
            .lock()
            .groups
            .get(&(topic.to_string(), group.to_string()))
            .map_or(0, |g| g.members.len())
    }
}

impl EventLog for InMemoryEventLog {
    fn append<'a>(&'a self, topic: &'a str, key: &'a str, payload: &'a [u8]) -> LogFuture<'a, AppendAck> {
        Box::pin(async move {
            if topic.is_empty() {
                return Err(EventLogError::InvalidTopic("topic name is empty".to_string()));
            }

            let latency = {
                let state = self.shared.lock();
                state.ensure_available()?;
                state.append_latency
            };
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }

            let partition = self.partition_for(key);
            let ack = {
                let mut state = self.shared.lock();
                state.ensure_available()?;
                let records = state
                    .topic_mut(topic)
                    .get_mut(usize::try_from(partition).unwrap_or(0))
                    .ok_or_else(|| EventLogError::AppendFailed {
                        topic: topic.to_string(),
                        reason: format!("partition {partition} does not exist"),
                    })?;
                records.push(StoredRecord {
                    key: Some(key.to_string()),
                    payload: payload.to_vec(),
                });
                AppendAck {
                    partition,
                    offset: i64::try_from(records.len() - 1).unwrap_or(i64::MAX),
                }
            };

            self.shared.appended.notify_waiters();
            tracing::trace!(topic, key, partition = ack.partition, offset = ack.offset, "Record appended");
            Ok(ack)
        })
    }

    fn subscribe<'a>(&'a self, topic: &'a str, group: &'a str) -> LogFuture<'a, Box<dyn Subscription>> {
        Box::pin(async move {
            if topic.is_empty() {
                return Err(EventLogError::InvalidTopic("topic name is empty".to_string()));
            }

            let member = {
                let mut state = self.shared.lock();
                state.ensure_available()?;
                state.topic_mut(topic);
                let member = state.next_member;
                state.next_member += 1;

                let group_state = state
                    .groups
                    .entry((topic.to_string(), group.to_string()))
                    .or_default();
                group_state.members.push(member);
                group_state.generation += 1;
                member
            };

            tracing::debug!(topic, group, member, "Member joined group");

            Ok(Box::new(InMemorySubscription {
                shared: Arc::clone(&self.shared),
                topic: topic.to_string(),
                group: group.to_string(),
                member,
                generation: 0,
                positions: HashMap::new(),
                cursor: 0,
            }) as Box<dyn Subscription>)
        })
    }
}

/// One group member's subscription to an [`InMemoryEventLog`] topic.
struct InMemorySubscription {
    shared: Arc<Shared>,
    topic: String,
    group: String,
    member: u64,
    generation: u64,
    /// Local fetch positions for owned partitions; reset on rebalance.
    positions: HashMap<i32, i64>,
    /// Rotates the starting partition so no owned partition starves.
    cursor: usize,
}

impl InMemorySubscription {
    fn group_key(&self) -> (String, String) {
        (self.topic.clone(), self.group.clone())
    }

    /// Drop this member's holds (all of them, or only on `partition`) and any
    /// fetch position for a partition it no longer owns. Returns whether a hold
    /// was released.
    fn release(&mut self, group: &mut GroupState, partitions: usize, partition: Option<i32>) -> bool {
        let before = group.in_flight.len();
        group
            .in_flight
            .retain(|&p, holder| *holder != self.member || partition.is_some_and(|only| only != p));
        let released = group.in_flight.len() != before;

        if released {
            let owned = group.assignment(self.member, partitions);
            self.positions.retain(|p, _| owned.contains(p));
        }
        released
    }

    fn try_next(&mut self) -> Result<Option<LogRecord>, EventLogError> {
        let shared = Arc::clone(&self.shared);
        let mut guard = shared.lock();
        let state = &mut *guard;
        state.ensure_available()?;
        let partition_count = state.partitions;

        let Some(group) = state.groups.get_mut(&self.group_key()) else {
            return Err(EventLogError::BrokerUnavailable(format!(
                "group '{}' no longer exists",
                self.group
            )));
        };

        // Polling again means the member is done with what it was handed.
        if self.release(group, partition_count, None) {
            shared.appended.notify_waiters();
        }

        if group.generation != self.generation {
            self.positions.clear();
            self.generation = group.generation;
        }

        let assigned = group.assignment(self.member, partition_count);
        let Some(partitions) = state.topics.get(&self.topic) else {
            return Ok(None);
        };

        for step in 0..assigned.len() {
            let partition = assigned[(self.cursor + step) % assigned.len()];
            let committed = group.committed.get(&partition).copied().unwrap_or(0);
            let position = *self.positions.entry(partition).or_insert(committed);

            let stored = partitions
                .get(usize::try_from(partition).unwrap_or(usize::MAX))
                .and_then(|records| records.get(usize::try_from(position).unwrap_or(usize::MAX)));

            if let Some(stored) = stored {
                self.positions.insert(partition, position + 1);
                group.in_flight.insert(partition, self.member);
                self.cursor = (self.cursor + step + 1) % assigned.len();
                return Ok(Some(LogRecord {
                    topic: self.topic.clone(),
                    partition,
                    offset: position,
                    key: stored.key.clone(),
                    payload: stored.payload.clone(),
                }));
            }
        }

        Ok(None)
    }
}

impl Subscription for InMemorySubscription {
    fn poll(&mut self, timeout: Duration) -> LogFuture<'_, Option<LogRecord>> {
        Box::pin(async move {
            let deadline = Instant::now() + timeout;
            let shared = Arc::clone(&self.shared);

            loop {
                // Register interest before checking so an append in between is not missed.
                let notified = shared.appended.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if let Some(record) = self.try_next()? {
                    return Ok(Some(record));
                }

                if tokio::time::timeout_at(deadline, notified).await.is_err() {
                    return Ok(None);
                }
            }
        })
    }

    fn commit<'a>(&'a mut self, record: &'a LogRecord) -> LogFuture<'a, ()> {
        Box::pin(async move {
            let shared = Arc::clone(&self.shared);
            let mut state = shared.lock();
            state.ensure_available()?;
            let partitions = state.partitions;

            let commit_failed = |reason: &str| EventLogError::CommitFailed {
                topic: record.topic.clone(),
                partition: record.partition,
                offset: record.offset,
                reason: reason.to_string(),
            };

            let group = state
                .groups
                .get_mut(&self.group_key())
                .ok_or_else(|| commit_failed("group no longer exists"))?;

            if !group.assignment(self.member, partitions).contains(&record.partition) {
                return Err(commit_failed("partition is owned by another member"));
            }

            let next = group.committed.entry(record.partition).or_insert(0);
            *next = (*next).max(record.offset + 1);

            if self.release(group, partitions, Some(record.partition)) {
                drop(state);
                // Wake a member waiting for the partition this one just gave up.
                shared.appended.notify_waiters();
            }
            Ok(())
        })
    }
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        let key = self.group_key();
        if let Some(group) = state.groups.get_mut(&key) {
            group.members.retain(|&m| m != self.member);
            group.in_flight.retain(|_, holder| *holder != self.member);
            group.generation += 1;
        }
        drop(state);
        // Wake other members so they pick up reassigned partitions.
        self.shared.appended.notify_waiters();
        tracing::debug!(topic = %self.topic, group = %self.group, member = self.member, "Member left group");
    }
}
