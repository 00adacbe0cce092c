// # SMTP Mailer
//
// This crate provides the SMTP implementation of the `Mailer` trait.
//
// ## Delivery
//
// Every call to `send()` performs a full session:
//
// 1. Connect to `smtp_addr` (`host[:port]`, port 25 when omitted)
// 2. EHLO, then STARTTLS (required; the session fails without it)
// 3. AUTH with `sender_username` / `sender_password`
// 4. Submit one message to one recipient
// 5. QUIT
//
// No connection is reused between recipients. The crate is built without
// lettre's `pool` feature, and a fresh transport is created per message.
//
// ## Security Requirements
//
// - The password NEVER appears in logs or Debug output
// - Plaintext sessions are never attempted

use async_trait::async_trait;
use ipwatch_core::traits::{Mailer, Notification};
use ipwatch_core::Settings;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

/// Port used when `smtp_addr` has none
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// SMTP-specific failures
#[derive(Error, Debug)]
pub enum SmtpError {
    /// `smtp_addr` could not be parsed
    #[error("invalid SMTP server address '{0}'")]
    InvalidServer(String),

    /// Sender or recipient address is not a valid mail address
    #[error("invalid mail address '{address}': {source}")]
    Address {
        /// The rejected address
        address: String,
        /// Parser error
        source: lettre::address::AddressError,
    },

    /// The message could not be assembled
    #[error("message build error: {0}")]
    Message(#[from] lettre::error::Error),

    /// Connection, TLS, authentication, or submission failed
    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

impl From<SmtpError> for ipwatch_core::Error {
    fn from(err: SmtpError) -> Self {
        match err {
            SmtpError::InvalidServer(_) => ipwatch_core::Error::invalid_config(err.to_string()),
            other => ipwatch_core::Error::mail(other.to_string()),
        }
    }
}

/// Split `host[:port]`
pub fn parse_server(smtp_addr: &str) -> Result<(String, u16), SmtpError> {
    let smtp_addr = smtp_addr.trim();
    let invalid = || SmtpError::InvalidServer(smtp_addr.to_string());

    let (host, port) = match smtp_addr.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
        None => (smtp_addr, DEFAULT_SMTP_PORT),
    };

    if host.is_empty() || port == 0 {
        return Err(invalid());
    }

    Ok((host.to_string(), port))
}

fn mailbox(name: &str, address: &str) -> Result<Mailbox, SmtpError> {
    let parsed: Address = address.parse().map_err(|source| SmtpError::Address {
        address: address.to_string(),
        source,
    })?;

    let name = Some(name.to_string()).filter(|n| !n.is_empty());
    Ok(Mailbox::new(name, parsed))
}

/// Assemble the RFC 5322 message for one notification
pub fn build_message(notification: &Notification) -> Result<Message, SmtpError> {
    let message = Message::builder()
        .from(mailbox(
            &notification.sender_name,
            &notification.sender_address,
        )?)
        .to(mailbox(
            &notification.recipient_name,
            &notification.recipient_address,
        )?)
        .subject(notification.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(notification.body.clone())?;

    Ok(message)
}

/// SMTP mailer
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the password.
pub struct SmtpMailer {
    /// Server host name
    host: String,

    /// Server port
    port: u16,

    /// Login name; empty means no AUTH
    username: String,

    /// Login password
    /// ⚠️ NEVER log this value
    password: String,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl SmtpMailer {
    /// Create a new SMTP mailer
    ///
    /// # Parameters
    ///
    /// - `smtp_addr`: Server as `host[:port]`
    /// - `username`: AUTH login; an empty string skips AUTH
    /// - `password`: AUTH password
    pub fn new(
        smtp_addr: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, SmtpError> {
        let (host, port) = parse_server(smtp_addr)?;

        Ok(Self {
            host,
            port,
            username: username.into(),
            password: password.into(),
        })
    }

    /// Create a mailer from watcher settings
    pub fn from_settings(settings: &Settings) -> Result<Self, SmtpError> {
        Self::new(
            &settings.smtp_addr,
            settings.sender_username.clone(),
            settings.sender_password.clone(),
        )
    }

    /// Build a single-use transport
    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, SmtpError> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)?.port(self.port);

        if !self.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.username.clone(),
                self.password.clone(),
            ));
        }

        Ok(builder.build())
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), SmtpError> {
        let message = build_message(notification)?;
        let transport = self.transport()?;

        tracing::debug!(
            "Submitting message to {} via {}:{}",
            notification.recipient_address,
            self.host,
            self.port
        );

        let response = transport.send(message).await?;
        tracing::trace!("SMTP server replied {}", response.code());
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, notification: &Notification) -> ipwatch_core::Result<()> {
        self.deliver(notification).await.map_err(Into::into)
    }

    fn transport_name(&self) -> &'static str {
        "smtp"
    }
}
