use std::time::{SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::data_types::Timestamp;

pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or_default()
}

/// Client-side id: `<prefix>_<millis>_<index>_<random6>`.
///
/// The index is the entity's position within its creation batch, which keeps ids
/// distinct even when a batch is issued within the same millisecond; the random
/// suffix covers separate batches racing each other.
pub fn generate_id(prefix: &str, index: usize) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(Alphanumeric)
        .map(char::from)
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(6)
        .collect();

    format!("{prefix}_{}_{index}_{suffix}", now_millis())
}
