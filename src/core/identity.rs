use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

/// Fixed identifier attached to anonymous events and session resets.
///
/// Anonymous emissions must never carry the real installation identifier,
/// so this marker stands in for both the actor and the anonymization
/// context.
pub const ANONYMOUS_ID: &str = "0x0000000000000000";

/// Generate a fresh pseudonymous installation identifier.
///
/// One-way hash of the current timestamp and a random value, so the
/// identifier is stable for the installation but reveals nothing about the
/// device. Collisions between installations are improbable rather than
/// impossible; byte-exact reproducibility is a non-goal.
pub fn generate_analytics_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let salt: u64 = rand::random();

    let digest = Sha256::digest(format!("{millis}{salt}").as_bytes());
    digest.iter().fold("0x".to_owned(), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generated_id_shape() {
        let id = generate_analytics_id();
        assert!(id.starts_with("0x"));
        assert_eq!(66, id.len());
        assert!(id[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(generate_analytics_id(), generate_analytics_id());
    }
}
