// # State Store Trait
//
// Defines the interface for the single persisted value: the last external IP
// that recipients were successfully told about.
//
// ## Purpose
//
// The saved IP is the baseline for change detection. It is only replaced
// after every recipient was notified, so a failed notification is retried
// on the next run against the same baseline.
//
// ## Implementations
//
// - File-based: plain text file holding only the dotted-quad
// - Memory: for embedding and tests
//
// ## Usage
//
// ```rust,ignore
// use ipwatch_core::{PersistedIp, StateStore};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* StateStore implementation */;
//
//     if let PersistedIp::Valid(ip) = store.read_previous().await {
//         println!("last notified IP: {ip}");
//     }
//
//     store.write_current("203.0.113.5").await?;
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::fmt;

/// Classified content of the save file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistedIp {
    /// A well-formed dotted-quad was saved
    Valid(String),
    /// Something was saved but it is not a dotted-quad
    Malformed,
    /// Nothing has been saved yet
    Absent,
}

impl PersistedIp {
    /// The saved address, if it is usable
    pub fn as_ip(&self) -> Option<&str> {
        match self {
            PersistedIp::Valid(ip) => Some(ip),
            PersistedIp::Malformed | PersistedIp::Absent => None,
        }
    }
}

/// Human-readable descriptor used in notifications and logs
impl fmt::Display for PersistedIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistedIp::Valid(ip) => f.write_str(ip),
            PersistedIp::Malformed => f.write_str("unknown (saved IP was malformed)"),
            PersistedIp::Absent => f.write_str("unknown (no saved IP)"),
        }
    }
}

/// Trait for state store implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O on its own storage location
///
/// ## Forbidden Capabilities
/// - ❌ Decide when to write (owned by the watcher)
/// - ❌ Locking across processes (one scheduled invoker per save path)
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read and classify the saved IP
    ///
    /// Never fails: an absent or unreadable value is a normal state on first
    /// run or after manual edits.
    async fn read_previous(&self) -> PersistedIp;

    /// Replace the saved IP
    ///
    /// The stored value is exactly `ip`, with no trailing newline.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Successfully written
    /// - `Err(Error::Write)`: Storage error
    async fn write_current(&self, ip: &str) -> Result<(), crate::Error>;
}
