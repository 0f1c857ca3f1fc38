//! Checkout reference generation
//!
//! Format: `PE_{unix_millis}_{9 base36 chars}`. The random suffix keeps
//! concurrent initializations by the same learner within one millisecond
//! from colliding.

use chrono::Utc;
use rand::Rng;

pub const REFERENCE_PREFIX: &str = "PE_";
const SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a fresh provider reference
pub fn generate_reference() -> String {
    reference_at(Utc::now().timestamp_millis())
}

fn reference_at(millis: i64) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}{}_{}", REFERENCE_PREFIX, millis, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_reference_format() {
        let r = reference_at(1_700_000_000_123);
        assert!(r.starts_with("PE_1700000000123_"));
        let suffix = r.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(
            suffix
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
        );
    }

    #[test]
    fn test_references_unique_within_same_millisecond() {
        let refs: HashSet<String> = (0..1000).map(|_| reference_at(42)).collect();
        assert_eq!(refs.len(), 1000);
    }
}
