// # ipwatch-core
//
// Core library for the external IP watcher.
//
// ## Architecture Overview
//
// This library provides the functionality for one watch run:
// - **Settings**: Operator configuration loaded from a `key=value` file
// - **IpLookup**: Trait for asking an upstream service for the external IP
// - **Mailer**: Trait for delivering one notification to one recipient
// - **StateStore**: Trait for the single saved IP
// - **resolver**: Bounded retry with syntax and blacklist checks
// - **detector**: Saved-vs-current comparison
// - **notifier**: Per-recipient delivery with aggregated outcome
// - **Watcher**: Orchestrates resolve → compare → notify → persist
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Lookup and mail transports live in their own crates
// 2. **Notify, then persist**: The saved IP only moves after every recipient was told
// 3. **Run to completion**: One sequential run per invocation, no background tasks
// 4. **Library-First**: The binary is a thin shell around `Watcher::run`

pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod ip;
pub mod notifier;
pub mod resolver;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{Recipient, Settings};
pub use engine::{RunOutcome, RunReport, WatchEvent, Watcher};
pub use error::{ConfigError, Error, Result};
pub use notifier::{NotificationOutcome, RecipientOutcome};
pub use resolver::{AttemptVerdict, ResolvedIp};
pub use state::{FileStateStore, MemoryStateStore};
pub use traits::{IpLookup, LookupAnswer, Mailer, Notification, PersistedIp, StateStore};
