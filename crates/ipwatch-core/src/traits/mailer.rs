// # Mailer Trait
//
// Defines the interface for delivering one notification to one recipient.
//
// ## Implementations
//
// - SMTP with STARTTLS: `ipwatch-mail-smtp` crate

use async_trait::async_trait;

/// A fully composed notification for a single recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Sender display name
    pub sender_name: String,
    /// Sender address
    pub sender_address: String,
    /// Recipient display name
    pub recipient_name: String,
    /// Recipient address
    pub recipient_address: String,
    /// Rendered subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

/// Trait for mail submission implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Connect, authenticate, submit one message, disconnect
///
/// ## Forbidden Capabilities
/// - ❌ Reuse a connection across calls
/// - ❌ Retry on failure (the next scheduled run retries every recipient)
/// - ❌ Decide whether a notification is needed (owned by the watcher)
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one notification
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The server accepted the message
    /// - `Err(Error)`: Connection, authentication, or submission failed
    async fn send(&self, notification: &Notification) -> Result<(), crate::Error>;

    /// Get the transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}
