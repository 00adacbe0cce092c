// # HTTP IP Lookup
//
// This crate provides an HTTP-based IpLookup for the IP watcher.
//
// ## Architecture
//
// Asks public "what is my IP" services which address the request came from.
// Each query goes to ONE service; successive queries rotate through the list
// so a resolver retry lands on a different service than the attempt before.
// The starting position is derived from the clock, which spreads scheduled
// runs across services.
//
// Services answer either with the bare address as text, or with a JSON
// object carrying it in a named field.
//
// ## What This Crate Does NOT Do
//
// - Validate the address (owned by the resolver in ipwatch-core)
// - Retry (owned by the resolver's attempt budget)

use async_trait::async_trait;
use ipwatch_core::traits::{IpLookup, LookupAnswer};
use ipwatch_core::{Error, Result};
use serde::Deserialize;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Per-request timeout for lookup services
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// How a service encodes the address in its response body
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Body is the address, possibly surrounded by whitespace
    PlainText,
    /// Body is a JSON object; the address is the string in `field`
    Json {
        /// Name of the field holding the address
        field: String,
    },
}

/// One lookup service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LookupService {
    /// URL to GET
    pub url: String,
    /// Response encoding
    #[serde(flatten)]
    pub format: ResponseFormat,
}

impl LookupService {
    /// A service that answers with plain text
    pub fn plain(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: ResponseFormat::PlainText,
        }
    }

    /// A service that answers with a JSON object
    pub fn json(url: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: ResponseFormat::Json {
                field: field.into(),
            },
        }
    }

    /// Extract the address text from a response body
    pub fn extract(&self, body: &str) -> Result<String> {
        match &self.format {
            ResponseFormat::PlainText => Ok(body.trim().to_string()),
            ResponseFormat::Json { field } => {
                let value: serde_json::Value = serde_json::from_str(body).map_err(|e| {
                    Error::lookup(format!("{}: invalid JSON response: {}", self.url, e))
                })?;

                value
                    .get(field)
                    .and_then(serde_json::Value::as_str)
                    .map(|ip| ip.trim().to_string())
                    .ok_or_else(|| {
                        Error::lookup(format!(
                            "{}: response has no string field '{}'",
                            self.url, field
                        ))
                    })
            }
        }
    }
}

/// Built-in list of IPv4-answering services
pub fn default_services() -> Vec<LookupService> {
    vec![
        LookupService::plain("https://api.ipify.org"),
        LookupService::plain("https://ipv4.icanhazip.com"),
        LookupService::plain("https://checkip.amazonaws.com"),
        LookupService::plain("https://ifconfig.me/ip"),
        LookupService::json("https://ipinfo.io/json", "ip"),
        LookupService::json("https://api.ipify.org?format=json", "ip"),
    ]
}

/// HTTP-based IP lookup
pub struct HttpIpLookup {
    /// Services to rotate through
    services: Vec<LookupService>,

    /// Index of the next service to ask
    next: AtomicUsize,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpLookup {
    /// Create a lookup over the built-in service list
    pub fn new() -> Result<Self> {
        Self::with_services(default_services())
    }

    /// Create a lookup over a custom service list
    ///
    /// # Errors
    ///
    /// Fails if `services` is empty or the HTTP client cannot be built.
    pub fn with_services(services: Vec<LookupService>) -> Result<Self> {
        if services.is_empty() {
            return Err(Error::lookup("at least one lookup service is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(concat!("ipwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::lookup(format!("Failed to build HTTP client: {}", e)))?;

        let start = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos() as usize)
            .unwrap_or(0)
            % services.len();

        Ok(Self {
            services,
            next: AtomicUsize::new(start),
            client,
        })
    }

    /// Start the rotation at a fixed position
    pub fn starting_at(self, index: usize) -> Self {
        self.next.store(index % self.services.len(), Ordering::SeqCst);
        self
    }

    /// Services in rotation order
    pub fn services(&self) -> &[LookupService] {
        &self.services
    }

    /// Pick the service for the next query and advance the rotation
    fn next_service(&self) -> &LookupService {
        let index = self.next.fetch_add(1, Ordering::SeqCst) % self.services.len();
        &self.services[index]
    }

    /// Fetch the address text from one service
    async fn fetch(&self, service: &LookupService) -> Result<String> {
        let response = self
            .client
            .get(&service.url)
            .send()
            .await
            .map_err(|e| Error::lookup(format!("{}: request failed: {}", service.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::lookup(format!(
                "{}: HTTP error: {}",
                service.url,
                response.status()
            )));
        }

        let body = response.text().await.map_err(|e| {
            Error::lookup(format!("{}: failed to read response: {}", service.url, e))
        })?;

        service.extract(&body)
    }
}

#[async_trait]
impl IpLookup for HttpIpLookup {
    async fn query(&self) -> Result<LookupAnswer> {
        let service = self.next_service();
        tracing::debug!("Querying {}", service.url);

        let raw = self.fetch(service).await?;
        Ok(LookupAnswer::new(raw, service.url.clone()))
    }

    fn lookup_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_trimmed() {
        let service = LookupService::plain("https://example.test");
        assert_eq!(service.extract("  203.0.113.5\n").unwrap(), "203.0.113.5");
    }

    #[test]
    fn plain_text_is_not_validated() {
        let service = LookupService::plain("https://example.test");
        assert_eq!(
            service.extract("<html>busy</html>").unwrap(),
            "<html>busy</html>"
        );
    }

    #[test]
    fn json_field_is_extracted() {
        let service = LookupService::json("https://example.test/json", "ip");
        let body = r#"{"ip": "198.51.100.20", "city": "Somewhere"}"#;
        assert_eq!(service.extract(body).unwrap(), "198.51.100.20");
    }

    #[test]
    fn json_without_field_is_an_error() {
        let service = LookupService::json("https://example.test/json", "ip");
        assert!(service.extract(r#"{"address": "1.2.3.4"}"#).is_err());
        assert!(service.extract("not json").is_err());
        assert!(service.extract(r#"{"ip": 42}"#).is_err());
    }

    #[test]
    fn services_deserialize_from_json() {
        let services: Vec<LookupService> = serde_json::from_str(
            r#"[
                {"url": "https://a.test", "format": "plain_text"},
                {"url": "https://b.test", "format": "json", "field": "origin"}
            ]"#,
        )
        .unwrap();

        assert_eq!(services[0], LookupService::plain("https://a.test"));
        assert_eq!(services[1], LookupService::json("https://b.test", "origin"));
    }

    #[test]
    fn rotation_visits_every_service() {
        let lookup = HttpIpLookup::with_services(vec![
            LookupService::plain("https://a.test"),
            LookupService::plain("https://b.test"),
            LookupService::plain("https://c.test"),
        ])
        .unwrap()
        .starting_at(1);

        let order: Vec<&str> = (0..4).map(|_| lookup.next_service().url.as_str()).collect();
        assert_eq!(
            order,
            vec!["https://b.test", "https://c.test", "https://a.test", "https://b.test"]
        );
    }

    #[test]
    fn empty_service_list_is_rejected() {
        assert!(HttpIpLookup::with_services(Vec::new()).is_err());
    }

    #[test]
    fn default_list_is_not_empty() {
        let lookup = HttpIpLookup::new().unwrap();
        assert!(!lookup.services().is_empty());
    }
}
