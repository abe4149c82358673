//! Partition-key derivation.

use crate::ids::{RequestId, SessionId};
use crate::types::SearchEngine;
use blake3::Hasher;

const SEP: u8 = 0x1f;

fn hash_parts(parts: &[&str]) -> String {
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(&[SEP]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Stable partition key for the full flight of one request.
///
/// Events for the same `(session, request, engine)` tuple hash to the same
/// partition on every stream, so one partition owns the flight end to end
/// and per-flight ordering holds across all four stages.
pub fn partition_key(session_id: SessionId, request_id: RequestId, engine: SearchEngine) -> String {
    hash_parts(&[
        &session_id.to_string(),
        &request_id.to_string(),
        engine.as_str(),
    ])
}
