//! Change detection between the saved and the current external IP

use crate::traits::PersistedIp;

/// Whether `current` differs from the saved IP
///
/// A missing or malformed saved value always counts as a change. Valid values
/// are compared as exact strings, so `010.0.0.1` and `10.0.0.1` differ.
pub fn changed(old: &PersistedIp, current: &str) -> bool {
    old.as_ip() != Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_malformed_always_change() {
        for ip in ["1.2.3.4", "0.0.0.0", "255.255.255.255"] {
            assert!(changed(&PersistedIp::Absent, ip));
            assert!(changed(&PersistedIp::Malformed, ip));
        }
    }

    #[test]
    fn equal_valid_is_unchanged() {
        assert!(!changed(&PersistedIp::Valid("1.2.3.4".into()), "1.2.3.4"));
    }

    #[test]
    fn different_valid_is_changed() {
        assert!(changed(&PersistedIp::Valid("1.2.3.4".into()), "1.2.3.5"));
    }

    #[test]
    fn comparison_is_not_normalized() {
        assert!(changed(&PersistedIp::Valid("010.0.0.1".into()), "10.0.0.1"));
    }
}
