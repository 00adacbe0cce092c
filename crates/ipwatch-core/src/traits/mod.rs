//! Core traits for the IP watcher
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpLookup`]: Ask an upstream service for the external address
//! - [`Mailer`]: Deliver one notification to one recipient
//! - [`StateStore`]: Keep the last notified address

pub mod ip_lookup;
pub mod mailer;
pub mod state_store;

pub use ip_lookup::{IpLookup, LookupAnswer};
pub use mailer::{Mailer, Notification};
pub use state_store::{PersistedIp, StateStore};
