//! Operator settings for the IP watcher
//!
//! Settings come from a line-oriented `key=value` file:
//!
//! ```text
//! # comment
//! sender=Home Server
//! sender_email=server@example.com
//! sender_username=server@example.com
//! sender_password=hunter2
//! receiver=Alice, Bob
//! receiver_email=alice@example.com, bob@example.com
//! subject_line=IP change on {machine}
//! machine=homebox
//! smtp_addr=smtp.example.com:587
//! save_ip_path=/var/lib/ipwatch/ip.txt
//! try_count=5
//! ip_blacklist=192.168.1.1,10.0.0.1
//! ```
//!
//! Unknown keys abort the whole load. The loader returns either a complete,
//! validated [`Settings`] or an error; there is no partially-filled value.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// One notification recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Display name
    pub name: String,
    /// Mail address
    pub address: String,
}

/// Validated operator settings
///
/// Built once by [`Settings::load`] and passed by reference to every component.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    /// Sender display name
    pub sender: String,

    /// Sender mail address (envelope and header `From`)
    pub sender_email: String,

    /// SMTP login name
    pub sender_username: String,

    /// SMTP password
    /// ⚠️ NEVER log this value
    pub sender_password: String,

    /// Recipients, in configuration order
    pub recipients: Vec<Recipient>,

    /// Subject line; may contain `{machine}`, `{old_ip}`, `{new_ip}`
    pub subject_line: String,

    /// Label for the watched machine
    pub machine: String,

    /// Mail server as `host[:port]`
    pub smtp_addr: String,

    /// Where the last notified IP is kept
    pub save_ip_path: PathBuf,

    /// Maximum number of lookups per run
    pub try_count: u32,

    /// Addresses never accepted as the external IP
    pub ip_blacklist: HashSet<String>,
}

// Custom Debug implementation that hides the SMTP password
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("sender", &self.sender)
            .field("sender_email", &self.sender_email)
            .field("sender_username", &self.sender_username)
            .field("sender_password", &"<REDACTED>")
            .field("recipients", &self.recipients)
            .field("subject_line", &self.subject_line)
            .field("machine", &self.machine)
            .field("smtp_addr", &self.smtp_addr)
            .field("save_ip_path", &self.save_ip_path)
            .field("try_count", &self.try_count)
            .field("ip_blacklist", &self.ip_blacklist)
            .finish()
    }
}

/// Raw values collected while scanning the file
#[derive(Debug, Default)]
struct RawSettings {
    sender: Option<String>,
    sender_email: Option<String>,
    sender_username: Option<String>,
    sender_password: Option<String>,
    receiver: Option<Vec<String>>,
    receiver_email: Option<Vec<String>>,
    subject_line: Option<String>,
    machine: Option<String>,
    smtp_addr: Option<String>,
    save_ip_path: Option<String>,
    try_count: Option<String>,
    ip_blacklist: Option<Vec<String>>,
}

impl Settings {
    /// Load settings from a file
    ///
    /// # Errors
    ///
    /// - [`ConfigError::NotFound`]: `path` is not a readable file
    /// - [`ConfigError::UnrecognizedKey`]: a line carries an unknown key
    /// - [`ConfigError::Invalid`]: a value is unusable or a required key is missing
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let not_found = || ConfigError::NotFound {
            path: path.to_path_buf(),
        };

        if !path.is_file() {
            return Err(not_found());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            tracing::debug!("Failed to read config file {}: {}", path.display(), e);
            match e.kind() {
                std::io::ErrorKind::InvalidData => ConfigError::Invalid(format!(
                    "config file {} is not valid UTF-8",
                    path.display()
                )),
                _ => not_found(),
            }
        })?;

        let settings = Self::parse(&content)?;
        tracing::debug!(
            "Loaded settings from {}: {} recipient(s), try_count={}",
            path.display(),
            settings.recipients.len(),
            settings.try_count
        );
        Ok(settings)
    }

    /// Parse settings from file contents
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut raw = RawSettings::default();

        for (idx, line) in content.lines().enumerate() {
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }

            let line = line.trim_end();
            // The key runs up to the last '='
            let (key, value) = line.rsplit_once('=').unwrap_or(("", line));
            let value = value.to_string();

            match key {
                "sender" => raw.sender = Some(value),
                "sender_email" => raw.sender_email = Some(value),
                "sender_username" => raw.sender_username = Some(value),
                "sender_password" => raw.sender_password = Some(value),
                "receiver" => raw.receiver = Some(split_trimmed(&value)),
                "receiver_email" => raw.receiver_email = Some(split_trimmed(&value)),
                "subject_line" => raw.subject_line = Some(value),
                "machine" => raw.machine = Some(value),
                "smtp_addr" => raw.smtp_addr = Some(value),
                "save_ip_path" => raw.save_ip_path = Some(value),
                "try_count" => raw.try_count = Some(value),
                "ip_blacklist" => {
                    raw.ip_blacklist = Some(value.split(',').map(str::to_string).collect())
                }
                _ => {
                    return Err(ConfigError::UnrecognizedKey {
                        line_no: idx + 1,
                        line: line.to_string(),
                    });
                }
            }
        }

        raw.validate()
    }
}

impl RawSettings {
    fn validate(self) -> Result<Settings, ConfigError> {
        let sender_email = required(self.sender_email, "sender_email")?;
        let smtp_addr = required(self.smtp_addr, "smtp_addr")?;
        let save_ip_path = required(self.save_ip_path, "save_ip_path")?;
        let try_count = parse_try_count(&required(self.try_count, "try_count")?)?;

        let names = self.receiver.unwrap_or_default();
        let addresses = self.receiver_email.unwrap_or_default();

        if addresses.is_empty() {
            return Err(ConfigError::Invalid(
                "receiver_email must list at least one address".to_string(),
            ));
        }

        if names.len() != addresses.len() {
            return Err(ConfigError::Invalid(format!(
                "receiver lists {} name(s) but receiver_email lists {} address(es)",
                names.len(),
                addresses.len()
            )));
        }

        if let Some(pos) = addresses.iter().position(|a| a.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "receiver_email entry {} is empty",
                pos + 1
            )));
        }

        let recipients = names
            .into_iter()
            .zip(addresses)
            .map(|(name, address)| Recipient { name, address })
            .collect();

        Ok(Settings {
            sender: self.sender.unwrap_or_default(),
            sender_email,
            sender_username: self.sender_username.unwrap_or_default(),
            sender_password: self.sender_password.unwrap_or_default(),
            recipients,
            subject_line: self.subject_line.unwrap_or_default(),
            machine: self.machine.unwrap_or_default(),
            smtp_addr,
            save_ip_path: PathBuf::from(save_ip_path),
            try_count,
            ip_blacklist: self.ip_blacklist.unwrap_or_default().into_iter().collect(),
        })
    }
}

fn split_trimmed(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|part| part.trim_start().to_string())
        .collect()
}

fn required(value: Option<String>, key: &str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Invalid(format!("{key} is required"))),
    }
}

fn parse_try_count(value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid(format!(
            "try_count must be a positive integer, got '{value}'"
        ))),
    }
}
