//! Topic and partition internals.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

/// Static description of a topic, fixed at log construction.
#[derive(Debug, Clone)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: usize,
    pub retention: Duration,
    /// Uncommitted records a partition holds before publication blocks.
    pub capacity: usize,
}

/// One record on a partition.
#[derive(Debug, Clone)]
pub struct StreamRecord {
    pub partition: usize,
    pub offset: u64,
    pub key: String,
    /// Retry attempt this payload is on; 0 for first publication.
    pub attempt: u32,
    pub payload: serde_json::Value,
    pub appended_at: DateTime<Utc>,
}

pub(crate) struct PartitionState {
    /// Offset of `records[0]`; grows as retention prunes the head.
    pub base_offset: u64,
    pub next_offset: u64,
    pub records: VecDeque<StreamRecord>,
    /// Consumer group -> next offset that group will read.
    pub committed: HashMap<String, u64>,
}

pub(crate) struct Partition {
    pub state: Mutex<PartitionState>,
    /// Signalled on append; consumers wait on it.
    pub appended: Notify,
    /// Signalled on commit/prune; blocked producers wait on it.
    pub drained: Notify,
}

impl Partition {
    fn new() -> Self {
        Self {
            state: Mutex::new(PartitionState {
                base_offset: 0,
                next_offset: 0,
                records: VecDeque::new(),
                committed: HashMap::new(),
            }),
            appended: Notify::new(),
            drained: Notify::new(),
        }
    }
}

impl PartitionState {
    /// Records not yet committed by the slowest registered group. With no
    /// groups registered yet, everything retained counts as lag.
    pub fn uncommitted_lag(&self) -> usize {
        let floor = self
            .committed
            .values()
            .copied()
            .min()
            .unwrap_or(self.base_offset);
        (self.next_offset - floor.min(self.next_offset)) as usize
    }
}

pub(crate) struct Topic {
    pub spec: TopicSpec,
    pub partitions: Vec<Partition>,
}

impl Topic {
    pub fn new(spec: TopicSpec) -> Self {
        let partitions = (0..spec.partitions.max(1)).map(|_| Partition::new()).collect();
        Self { spec, partitions }
    }

    /// Map a record key onto a partition index.
    pub fn partition_for(&self, key: &str) -> usize {
        let digest = blake3::hash(key.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        (u64::from_be_bytes(prefix) % self.partitions.len() as u64) as usize
    }

    /// Drop fully-committed records older than the retention window.
    pub async fn prune(&self, now: DateTime<Utc>) {
        let horizon = match chrono::Duration::from_std(self.spec.retention) {
            Ok(d) => now - d,
            Err(_) => return,
        };
        for (idx, partition) in self.partitions.iter().enumerate() {
            let mut state = partition.state.lock().await;
            let floor = state
                .committed
                .values()
                .copied()
                .min()
                .unwrap_or(state.base_offset);
            let mut dropped = 0usize;
            loop {
                let expired = matches!(
                    state.records.front(),
                    Some(front) if front.offset < floor && front.appended_at < horizon
                );
                if !expired {
                    break;
                }
                state.records.pop_front();
                state.base_offset += 1;
                dropped += 1;
            }
            if dropped > 0 {
                debug!(
                    topic = %self.spec.name,
                    partition = idx,
                    dropped,
                    "pruned expired records"
                );
                partition.drained.notify_waiters();
            }
        }
    }
}
