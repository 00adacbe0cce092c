// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Keeps the saved IP for the lifetime of the process only. Useful for
// embedding the watcher in a long-running program and for tests.
//
// ## Crash Behavior
//
// - All state is lost on restart
// - The first run after a restart sees `Absent` and notifies again

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::state_store::{PersistedIp, StateStore};

/// In-memory state store implementation
///
/// Clones share the same value.
///
/// # Example
///
/// ```rust,no_run
/// use ipwatch_core::state::MemoryStateStore;
/// use ipwatch_core::traits::{PersistedIp, StateStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///     assert_eq!(store.read_previous().await, PersistedIp::Absent);
///
///     store.write_current("1.2.3.4").await?;
///     assert_eq!(store.saved().await.as_deref(), Some("1.2.3.4"));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<Option<String>>>,
    writes: Arc<std::sync::atomic::AtomicUsize>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds `value`
    ///
    /// The value is stored as-is, so a non dotted-quad reads back as `Malformed`.
    pub fn with_saved(value: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(value.into()))),
            writes: Arc::default(),
        }
    }

    /// The raw saved value
    pub async fn saved(&self) -> Option<String> {
        self.inner.read().await.clone()
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn read_previous(&self) -> PersistedIp {
        match self.inner.read().await.as_deref() {
            None => PersistedIp::Absent,
            Some(value) if crate::ip::is_dotted_quad(value) => {
                PersistedIp::Valid(value.to_string())
            }
            Some(_) => PersistedIp::Malformed,
        }
    }

    async fn write_current(&self, ip: &str) -> Result<(), Error> {
        *self.inner.write().await = Some(ip.to_string());
        self.writes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}
