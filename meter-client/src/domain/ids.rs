use std::{
    process,
    sync::atomic::{AtomicU64, Ordering},
};

use time::OffsetDateTime;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Opaque 24-hex-char record id.
///
/// Derived from the wall clock, the process id and a process-local sequence so
/// ids stay unique even when two records are created in the same nanosecond.
pub fn new_record_id() -> String {
    let mut h = blake3::Hasher::new();
    h.update(&OffsetDateTime::now_utc().unix_timestamp_nanos().to_le_bytes());
    h.update(&process::id().to_le_bytes());
    h.update(&SEQUENCE.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let mut id = h.finalize().to_hex().to_string();
    id.truncate(24);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_and_fixed_width() {
        let ids: HashSet<String> = (0..1000).map(|_| new_record_id()).collect();
        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| id.len() == 24));
    }
}
