use fundscout_protocol::ScoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("corrupt stored value: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error("optimistic-concurrency conflict on domain '{domain}'")]
    Contention { domain: String },
}
