//! Ordered, partitioned, in-process message log.
//!
//! The minimal broker surface the pipeline needs: named topics, a fixed
//! partition count per topic, append with key-based partitioning, consumer
//! groups with committed offsets, bounded per-partition capacity as the
//! back-pressure signal, and retention-based pruning.
//!
//! Delivery is at-least-once: a record is redelivered from the committed
//! offset unless the consumer commits past it. Consumers are expected to be
//! idempotent by a natural key. Within a partition, ordering is preserved;
//! across partitions there is no ordering at all.

mod error;
mod log;
mod topic;

pub use error::StreamError;
pub use log::{MessageLog, Publisher, Subscription};
pub use topic::{StreamRecord, TopicSpec};
