//! Watcher: one run of the resolve → compare → notify → persist flow
//!
//! The Watcher is responsible for:
//! - Reading the saved IP from the StateStore
//! - Resolving the current external IP via IpLookup
//! - Notifying every recipient via Mailer when the IP changed
//! - Saving the new IP only after every recipient was notified
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!                 │   Watcher    │
//!                 └──────────────┘
//!                         │
//!     ┌───────────────┬───┴───────────┬───────────────┐
//!     │               │               │               │
//!     ▼               ▼               ▼               ▼
//! ┌──────────┐  ┌──────────┐   ┌──────────┐    ┌──────────┐
//! │StateStore│  │ IpLookup │   │  Mailer  │    │  Events  │
//! │ (read)   │  │(resolve) │   │ (notify) │    │(observe) │
//! └──────────┘  └──────────┘   └──────────┘    └──────────┘
//! ```
//!
//! ## Run Flow
//!
//! ```text
//! OldIpRead ──► NewIpResolved ──┬──► Unchanged
//!                               └──► ChangedNotifying ──┬──► Persisted
//!                                                       └──► NotPersisted
//! ```
//!
//! A resolution failure ends the run before any comparison. A failed
//! notification leaves the saved IP untouched so the next run notifies again
//! against the same baseline.

use crate::config::Settings;
use crate::detector;
use crate::error::Result;
use crate::notifier::{self, NotificationOutcome};
use crate::resolver::{self, AttemptVerdict, ResolvedIp};
use crate::traits::{IpLookup, Mailer, PersistedIp, StateStore};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

/// Capacity of the event channel returned by [`Watcher::new`]
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted by the Watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Saved IP was read and classified
    OldIpRead {
        previous: PersistedIp,
    },

    /// One resolution attempt finished
    AttemptFinished {
        attempt: u32,
        raw: Option<String>,
        verdict: AttemptVerdict,
    },

    /// Current IP accepted
    Resolved {
        ip: String,
        service: String,
        attempt: u32,
    },

    /// Every attempt was rejected
    ResolutionFailed {
        attempts: u32,
    },

    /// Current IP equals the saved one
    Unchanged {
        ip: String,
    },

    /// One recipient was handled
    RecipientNotified {
        index: usize,
        total: usize,
        address: String,
        success: bool,
    },

    /// New IP saved after a fully successful notification
    Persisted {
        ip: String,
    },

    /// Notification failed for at least one recipient; saved IP untouched
    NotPersisted {
        failed: usize,
        total: usize,
    },

    /// Notification succeeded but saving the new IP failed
    PersistFailed {
        error: String,
    },
}

/// How a run that resolved an IP ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Current IP equals the saved one; nothing sent, nothing written
    Unchanged,

    /// Every recipient notified and the new IP saved
    Persisted {
        notification: NotificationOutcome,
    },

    /// At least one recipient failed; the saved IP was left as it was
    NotPersisted {
        notification: NotificationOutcome,
    },

    /// Every recipient notified but the new IP could not be saved
    PersistFailed {
        notification: NotificationOutcome,
        error: String,
    },
}

/// Summary of one completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Saved IP as read at the start of the run
    pub previous: PersistedIp,
    /// Current IP and the service that supplied it
    pub resolved: ResolvedIp,
    /// Terminal outcome
    pub outcome: RunOutcome,
}

impl RunReport {
    /// True for "unchanged" and "changed, notified and saved"
    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            RunOutcome::Unchanged | RunOutcome::Persisted { .. }
        )
    }
}

/// Core IP watcher
///
/// Holds the three collaborators and the settings for a single run.
///
/// ## Lifecycle
///
/// 1. Create with [`Watcher::new()`]
/// 2. Call [`Watcher::run()`] once per scheduled invocation
///
/// ## Threading
///
/// Every step is awaited in sequence; the watcher never spawns tasks. It is
/// meant to be driven by a current-thread runtime.
pub struct Watcher {
    /// Upstream lookup for the current IP
    lookup: Box<dyn IpLookup>,

    /// Mail submission
    mailer: Box<dyn Mailer>,

    /// Saved IP
    state_store: Box<dyn StateStore>,

    /// Operator settings
    settings: Settings,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<WatchEvent>,
}

impl Watcher {
    /// Create a new watcher
    ///
    /// # Returns
    ///
    /// A tuple of (watcher, event_receiver) where event_receiver yields watch
    /// events. Dropping the receiver is fine; events are then discarded.
    pub fn new(
        lookup: Box<dyn IpLookup>,
        mailer: Box<dyn Mailer>,
        state_store: Box<dyn StateStore>,
        settings: Settings,
    ) -> (Self, mpsc::Receiver<WatchEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let watcher = Self {
            lookup,
            mailer,
            state_store,
            settings,
            event_tx: tx,
        };

        (watcher, rx)
    }

    /// Run once
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: An IP was resolved; the report says what happened next
    /// - `Err(Error::ExhaustedAttempts)`: No acceptable IP; nothing was compared,
    ///   sent, or written
    pub async fn run(&self) -> Result<RunReport> {
        let previous = self.state_store.read_previous().await;
        info!("Old IP = {}", previous);
        self.emit_event(WatchEvent::OldIpRead {
            previous: previous.clone(),
        });

        let resolved = match self.resolve().await {
            Ok(resolved) => resolved,
            Err(e) => {
                error!("Failed to determine current IP: {}", e);
                if let crate::Error::ExhaustedAttempts { attempts } = &e {
                    self.emit_event(WatchEvent::ResolutionFailed {
                        attempts: *attempts,
                    });
                }
                return Err(e);
            }
        };

        if !detector::changed(&previous, &resolved.ip) {
            info!("Current IP = Old IP ({}). No need to send email.", resolved.ip);
            self.emit_event(WatchEvent::Unchanged {
                ip: resolved.ip.clone(),
            });
            return Ok(RunReport {
                previous,
                resolved,
                outcome: RunOutcome::Unchanged,
            });
        }

        info!(
            "Current IP differs from old IP: {} -> {}",
            previous, resolved.ip
        );
        let notification = self.notify(&previous, &resolved).await;
        let outcome = self.finish(&resolved, notification).await;

        Ok(RunReport {
            previous,
            resolved,
            outcome,
        })
    }

    /// Resolve the current IP, emitting one event per attempt
    async fn resolve(&self) -> Result<ResolvedIp> {
        let resolved = resolver::resolve_with(
            self.settings.try_count,
            &self.settings.ip_blacklist,
            self.lookup.as_ref(),
            |attempt, answer, verdict| {
                self.emit_event(WatchEvent::AttemptFinished {
                    attempt,
                    raw: answer.map(|a| a.raw.clone()),
                    verdict: verdict.clone(),
                });
            },
        )
        .await?;

        self.emit_event(WatchEvent::Resolved {
            ip: resolved.ip.clone(),
            service: resolved.service.clone(),
            attempt: resolved.attempt,
        });
        Ok(resolved)
    }

    /// Notify every recipient, emitting one event per recipient
    async fn notify(&self, previous: &PersistedIp, resolved: &ResolvedIp) -> NotificationOutcome {
        notifier::notify_with(
            previous,
            resolved,
            &self.settings,
            self.mailer.as_ref(),
            |recipient, total| {
                self.emit_event(WatchEvent::RecipientNotified {
                    index: recipient.index,
                    total,
                    address: recipient.address.clone(),
                    success: recipient.is_success(),
                });
            },
        )
        .await
    }

    /// Save the new IP if, and only if, every recipient was notified
    async fn finish(&self, resolved: &ResolvedIp, notification: NotificationOutcome) -> RunOutcome {
        if !notification.is_success() {
            let failed = notification.failures().count();
            let total = notification.recipients.len();
            warn!(
                "{} of {} notification(s) failed; keeping saved IP so the next run retries",
                failed, total
            );
            self.emit_event(WatchEvent::NotPersisted { failed, total });
            return RunOutcome::NotPersisted { notification };
        }

        match self.state_store.write_current(&resolved.ip).await {
            Ok(()) => {
                info!("Saved new IP {}", resolved.ip);
                self.emit_event(WatchEvent::Persisted {
                    ip: resolved.ip.clone(),
                });
                RunOutcome::Persisted { notification }
            }
            Err(e) => {
                error!("Notifications were sent but saving the new IP failed: {}", e);
                self.emit_event(WatchEvent::PersistFailed {
                    error: e.to_string(),
                });
                RunOutcome::PersistFailed {
                    notification,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Emit a watch event
    fn emit_event(&self, event: WatchEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                debug!("No event listener, dropping {:?}", event);
            }
        }
    }
}
