//! Dotted-quad syntax check shared by the resolver and the state store
//!
//! The grammar is deliberately loose: four groups of one to three ASCII
//! digits separated by dots. Octet values are not range checked, so
//! `999.1.1.1` is accepted.

/// Longest possible dotted-quad (`255.255.255.255`)
pub const MAX_DOTTED_QUAD_LEN: usize = 15;

/// Check whether `candidate` is exactly four dot-separated groups of 1-3 digits
pub fn is_dotted_quad(candidate: &str) -> bool {
    let mut groups = 0;
    for group in candidate.split('.') {
        groups += 1;
        if groups > 4 {
            return false;
        }
        if group.is_empty() || group.len() > 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    groups == 4
}
