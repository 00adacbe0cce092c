// # IP Lookup Trait
//
// Defines the interface for asking an upstream service which address the
// caller appears to come from.
//
// ## Implementations
//
// - HTTP "what is my IP" services: `ipwatch-lookup-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ipwatch_core::IpLookup;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let lookup = /* IpLookup implementation */;
//
//     let answer = lookup.query().await?;
//     println!("{} says {}", answer.service, answer.raw);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// One answer from an upstream lookup service
///
/// `raw` is whatever the service returned (trimmed). It has not been
/// validated; the resolver decides whether it is usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupAnswer {
    /// Address text as reported by the service
    pub raw: String,
    /// Identifier of the service that answered (its URL for HTTP lookups)
    pub service: String,
}

impl LookupAnswer {
    /// Create a new lookup answer
    pub fn new(raw: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            service: service.into(),
        }
    }
}

/// Trait for external IP lookup implementations
///
/// # Trust Level: Untrusted
///
/// Lookup services are third parties. Their answers may be empty, HTML error
/// pages, IPv6 addresses, or the address of a captive portal.
///
/// ## Allowed Capabilities
/// - ✅ Perform one request to one service per call
/// - ✅ Trim and extract the address text from the response
///
/// ## Forbidden Capabilities
/// - ❌ Validate or filter the address (owned by the resolver)
/// - ❌ Retry on failure (owned by the resolver's attempt budget)
/// - ❌ Access the state store or the mailer
///
/// Returning `Err` is always safe: the resolver counts it as a failed attempt
/// and moves on.
#[async_trait]
pub trait IpLookup: Send + Sync {
    /// Ask one upstream service for the caller's address
    ///
    /// # Returns
    ///
    /// - `Ok(LookupAnswer)`: Raw answer and the identifier of the service
    /// - `Err(Error)`: Transient upstream failure
    async fn query(&self) -> Result<LookupAnswer, crate::Error>;

    /// Get the lookup implementation name (for logging/debugging)
    fn lookup_name(&self) -> &'static str;
}
