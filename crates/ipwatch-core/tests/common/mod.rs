//! Test doubles and common utilities for watcher contract tests
//!
//! These doubles record every call so tests can assert on what the watcher
//! did, not only on what it returned.

#![allow(dead_code)]

use ipwatch_core::error::{Error, Result};
use ipwatch_core::traits::{IpLookup, LookupAnswer, Mailer, Notification};
use ipwatch_core::Settings;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// An IpLookup that plays back a fixed script of answers
///
/// `Some(raw)` answers with `raw`, `None` fails the lookup. When the script
/// runs out the last entry repeats.
pub struct ScriptedLookup {
    script: Arc<Mutex<VecDeque<Option<String>>>>,
    last: Arc<Mutex<Option<String>>>,
    call_count: Arc<AtomicUsize>,
}

impl ScriptedLookup {
    pub fn new(script: &[Option<&str>]) -> Self {
        Self {
            script: Arc::new(Mutex::new(
                script.iter().map(|s| s.map(str::to_string)).collect(),
            )),
            last: Arc::new(Mutex::new(None)),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always answers with `raw`
    pub fn always(raw: &str) -> Self {
        Self::new(&[Some(raw)])
    }

    /// Get the number of times query() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Create a new ScriptedLookup that shares script and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            script: Arc::clone(&other.script),
            last: Arc::clone(&other.last),
            call_count: Arc::clone(&other.call_count),
        }
    }
}

#[async_trait::async_trait]
impl IpLookup for ScriptedLookup {
    async fn query(&self) -> Result<LookupAnswer> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);

        let mut script = self.script.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        let next = match script.pop_front() {
            Some(entry) => {
                *last = entry.clone();
                entry
            }
            None => last.clone(),
        };

        next.map(|raw| LookupAnswer::new(raw, format!("scripted-{}", n + 1)))
            .ok_or_else(|| Error::lookup("scripted outage"))
    }

    fn lookup_name(&self) -> &'static str {
        "scripted"
    }
}

/// A Mailer that records every message and fails for chosen addresses
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<Notification>>>,
    attempts: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Make deliveries to `address` fail
    pub fn fail_for(&self, address: &str) {
        self.failing.lock().unwrap().insert(address.to_string());
    }

    /// Let deliveries to every address succeed again
    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Messages the fake server accepted
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    /// Every recipient address a send was attempted for, in order
    pub fn attempted_addresses(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    /// Create a new RecordingMailer that shares its log with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            sent: Arc::clone(&other.sent),
            attempts: Arc::clone(&other.attempts),
            failing: Arc::clone(&other.failing),
        }
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, notification: &Notification) -> Result<()> {
        self.attempts
            .lock()
            .unwrap()
            .push(notification.recipient_address.clone());

        if self
            .failing
            .lock()
            .unwrap()
            .contains(&notification.recipient_address)
        {
            return Err(Error::mail(format!(
                "550 mailbox unavailable: {}",
                notification.recipient_address
            )));
        }

        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "recording"
    }
}

/// Helper to create settings with `recipients` and `try_count`
pub fn settings_with(recipients: &[&str], try_count: u32, blacklist: &[&str]) -> Settings {
    let names: Vec<String> = (1..=recipients.len()).map(|i| format!("User {i}")).collect();
    let content = format!(
        "sender=Watcher\n\
         sender_email=watcher@example.com\n\
         sender_username=watcher\n\
         sender_password=secret\n\
         receiver={}\n\
         receiver_email={}\n\
         subject_line=IP change on {{machine}}\n\
         machine=testbox\n\
         smtp_addr=127.0.0.1:2525\n\
         save_ip_path=/nonexistent/ip.txt\n\
         try_count={}\n\
         ip_blacklist={}\n",
        names.join(","),
        recipients.join(","),
        try_count,
        blacklist.join(","),
    );
    Settings::parse(&content).expect("test settings parse")
}

/// Drain every event currently buffered in the receiver
pub fn drain_events(
    rx: &mut tokio::sync::mpsc::Receiver<ipwatch_core::WatchEvent>,
) -> Vec<ipwatch_core::WatchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
