//! Identifier generation for entities that own a generated id.

use std::sync::atomic::{AtomicU64, Ordering};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a unique, opaque identifier.
///
/// Hashes the prefix, the current timestamp in nanoseconds, the process id and
/// a process-wide sequence number. Output is a 40 character hex string.
pub fn generate_id(prefix: &str) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let nanos = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_default();

    let mut hasher = blake3::Hasher::new();
    hasher.update(prefix.as_bytes());
    hasher.update(&[0x00]);
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    hasher.update(&seq.to_le_bytes());

    let mut hex = hasher.finalize().to_hex().to_string();
    hex.truncate(40);
    hex
}
