use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("unknown topic: '{0}'")]
    UnknownTopic(String),
    #[error("partition {partition} out of range for topic '{topic}'")]
    PartitionOutOfRange { topic: String, partition: usize },
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
