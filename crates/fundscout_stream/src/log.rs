//! The message log: publishers, subscriptions, committed offsets.

use crate::error::StreamError;
use crate::topic::{StreamRecord, Topic, TopicSpec};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Owns every topic. Built once at startup; handles are cheap clones.
#[derive(Clone)]
pub struct MessageLog {
    topics: Arc<HashMap<String, Arc<Topic>>>,
}

impl MessageLog {
    pub fn new(specs: Vec<TopicSpec>) -> Self {
        let topics = specs
            .into_iter()
            .map(|spec| (spec.name.clone(), Arc::new(Topic::new(spec))))
            .collect();
        Self {
            topics: Arc::new(topics),
        }
    }

    fn topic(&self, name: &str) -> Result<Arc<Topic>, StreamError> {
        self.topics
            .get(name)
            .cloned()
            .ok_or_else(|| StreamError::UnknownTopic(name.to_string()))
    }

    pub fn partition_count(&self, topic: &str) -> Result<usize, StreamError> {
        Ok(self.topic(topic)?.partitions.len())
    }

    pub fn publisher(&self, topic: &str) -> Result<Publisher, StreamError> {
        Ok(Publisher {
            topic: self.topic(topic)?,
        })
    }

    /// Join `group` on one partition of `topic`. Delivery starts at the
    /// group's committed offset (zero for a new group).
    pub async fn subscribe(
        &self,
        topic: &str,
        group: &str,
        partition: usize,
    ) -> Result<Subscription, StreamError> {
        let topic = self.topic(topic)?;
        if partition >= topic.partitions.len() {
            return Err(StreamError::PartitionOutOfRange {
                topic: topic.spec.name.clone(),
                partition,
            });
        }
        let position = {
            let mut state = topic.partitions[partition].state.lock().await;
            let base = state.base_offset;
            *state.committed.entry(group.to_string()).or_insert(base)
        };
        Ok(Subscription {
            topic,
            group: group.to_string(),
            partition,
            position,
        })
    }

    /// Drop fully-committed records past each topic's retention window.
    pub async fn prune(&self) {
        let now = Utc::now();
        for topic in self.topics.values() {
            topic.prune(now).await;
        }
    }
}

/// Handle for appending to one topic.
#[derive(Clone)]
pub struct Publisher {
    topic: Arc<Topic>,
}

impl Publisher {
    /// Append a first-publication record. Blocks while the target partition
    /// is at capacity (back-pressure).
    pub async fn publish<T: Serialize>(&self, key: &str, value: &T) -> Result<u64, StreamError> {
        self.publish_attempt(key, 0, value).await
    }

    /// Append a re-published payload carrying its retry attempt.
    pub async fn publish_attempt<T: Serialize>(
        &self,
        key: &str,
        attempt: u32,
        value: &T,
    ) -> Result<u64, StreamError> {
        let payload = serde_json::to_value(value)?;
        self.publish_raw(key, attempt, payload).await
    }

    /// Append an already-serialized payload (retry path).
    pub async fn publish_raw(
        &self,
        key: &str,
        attempt: u32,
        payload: serde_json::Value,
    ) -> Result<u64, StreamError> {
        let idx = self.topic.partition_for(key);
        let partition = &self.topic.partitions[idx];
        loop {
            let drained = partition.drained.notified();
            {
                let mut state = partition.state.lock().await;
                if state.uncommitted_lag() < self.topic.spec.capacity {
                    let offset = state.next_offset;
                    state.next_offset += 1;
                    state.records.push_back(StreamRecord {
                        partition: idx,
                        offset,
                        key: key.to_string(),
                        attempt,
                        payload,
                        appended_at: Utc::now(),
                    });
                    partition.appended.notify_waiters();
                    trace!(
                        topic = %self.topic.spec.name,
                        partition = idx,
                        offset,
                        "appended record"
                    );
                    return Ok(offset);
                }
            }
            drained.await;
        }
    }
}

/// One consumer-group member bound to one partition.
pub struct Subscription {
    topic: Arc<Topic>,
    group: String,
    partition: usize,
    position: u64,
}

impl Subscription {
    pub fn partition(&self) -> usize {
        self.partition
    }

    /// Next record at or past this member's position. Waits for an append
    /// when the partition is drained. Cancel-safe: select against shutdown.
    pub async fn next(&mut self) -> StreamRecord {
        let partition = &self.topic.partitions[self.partition];
        loop {
            let appended = partition.appended.notified();
            {
                let state = partition.state.lock().await;
                if self.position < state.next_offset {
                    let idx = (self.position - state.base_offset) as usize;
                    let record = state.records[idx].clone();
                    self.position += 1;
                    return record;
                }
            }
            appended.await;
        }
    }

    /// Commit through `offset`: this group will not see it again, and the
    /// capacity it held is released.
    pub async fn commit(&self, offset: u64) {
        let partition = &self.topic.partitions[self.partition];
        let mut state = partition.state.lock().await;
        let entry = state.committed.entry(self.group.clone()).or_insert(0);
        if *entry <= offset {
            *entry = offset + 1;
        }
        partition.drained.notify_waiters();
    }
}
