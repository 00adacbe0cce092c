//! Change notifications
//!
//! One message per recipient, each delivered through its own
//! [`Mailer::send`] call. A failed recipient is recorded and the loop moves on;
//! the aggregate is a success only if every recipient succeeded.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{error, info};

use crate::config::{Recipient, Settings};
use crate::resolver::ResolvedIp;
use crate::traits::{Mailer, Notification, PersistedIp};

/// Delivery result for one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientOutcome {
    /// 0-based position in the recipient list
    pub index: usize,
    /// Recipient address
    pub address: String,
    /// `None` on success, the failure message otherwise
    pub error: Option<String>,
}

impl RecipientOutcome {
    /// Whether this recipient was notified
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-recipient results of one notification cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationOutcome {
    /// One entry per recipient, in configuration order
    pub recipients: Vec<RecipientOutcome>,
}

impl NotificationOutcome {
    /// Aggregate flag: true only if every recipient succeeded
    pub fn is_success(&self) -> bool {
        self.recipients.iter().all(RecipientOutcome::is_success)
    }

    /// Recipients whose delivery failed
    pub fn failures(&self) -> impl Iterator<Item = &RecipientOutcome> {
        self.recipients.iter().filter(|r| !r.is_success())
    }
}

/// Render the subject line
///
/// `{machine}`, `{old_ip}` and `{new_ip}` are substituted; all other text is
/// kept verbatim.
pub fn render_subject(template: &str, machine: &str, old: &PersistedIp, new_ip: &str) -> String {
    template
        .replace("{machine}", machine)
        .replace("{old_ip}", &old.to_string())
        .replace("{new_ip}", new_ip)
}

/// Compose the message for one recipient
pub fn compose(
    settings: &Settings,
    recipient: &Recipient,
    old: &PersistedIp,
    resolved: &ResolvedIp,
    detected_at: DateTime<Utc>,
) -> Notification {
    let body = format!(
        "The IP address of {machine} has changed:\n\
         \x20   Old IP = {old}\n\
         \x20   New IP = {new}\n\
         \x20   Reported by = {service}\n\
         \x20   Detected at = {at}\n",
        machine = settings.machine,
        old = old,
        new = resolved.ip,
        service = resolved.service,
        at = detected_at.to_rfc3339_opts(SecondsFormat::Secs, true),
    );

    Notification {
        sender_name: settings.sender.clone(),
        sender_address: settings.sender_email.clone(),
        recipient_name: recipient.name.clone(),
        recipient_address: recipient.address.clone(),
        subject: render_subject(&settings.subject_line, &settings.machine, old, &resolved.ip),
        body,
    }
}

/// Notify every recipient about the change
///
/// `on_recipient` is called after each delivery attempt with the outcome and
/// the total number of recipients.
pub async fn notify_with<F>(
    old: &PersistedIp,
    resolved: &ResolvedIp,
    settings: &Settings,
    mailer: &dyn Mailer,
    mut on_recipient: F,
) -> NotificationOutcome
where
    F: FnMut(&RecipientOutcome, usize),
{
    let total = settings.recipients.len();
    let detected_at = Utc::now();
    let mut outcome = NotificationOutcome {
        recipients: Vec::with_capacity(total),
    };

    for (index, recipient) in settings.recipients.iter().enumerate() {
        let message = compose(settings, recipient, old, resolved, detected_at);

        let result = match mailer.send(&message).await {
            Ok(()) => {
                info!(
                    "Notification {} of {} sent to {} via {}",
                    index + 1,
                    total,
                    recipient.address,
                    mailer.transport_name()
                );
                RecipientOutcome {
                    index,
                    address: recipient.address.clone(),
                    error: None,
                }
            }
            Err(e) => {
                error!(
                    "Notification {} of {} to {} failed: {}",
                    index + 1,
                    total,
                    recipient.address,
                    e
                );
                RecipientOutcome {
                    index,
                    address: recipient.address.clone(),
                    error: Some(e.to_string()),
                }
            }
        };

        on_recipient(&result, total);
        outcome.recipients.push(result);
    }

    outcome
}

/// Notify every recipient about the change
pub async fn notify(
    old: &PersistedIp,
    resolved: &ResolvedIp,
    settings: &Settings,
    mailer: &dyn Mailer,
) -> NotificationOutcome {
    notify_with(old, resolved, settings, mailer, |_, _| {}).await
}
