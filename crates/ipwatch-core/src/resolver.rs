//! External IP resolution
//!
//! Asks the lookup capability up to `max_attempts` times and accepts the
//! first answer that is a dotted-quad and not blacklisted.
//!
//! ```text
//! attempt 1 ──► lookup ──► malformed?   ──► next attempt
//!                      ──► blacklisted? ──► next attempt
//!                      ──► error?       ──► next attempt
//!                      ──► good         ──► ResolvedIp
//! ```
//!
//! There is no delay between attempts. Each attempt is logged with its verdict.

use std::collections::HashSet;
use std::fmt;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::ip::is_dotted_quad;
use crate::traits::{IpLookup, LookupAnswer};

/// An accepted external IP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIp {
    /// Dotted-quad address
    pub ip: String,
    /// Service that supplied it
    pub service: String,
    /// 1-based attempt on which it was accepted
    pub attempt: u32,
}

/// Verdict for one resolution attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptVerdict {
    /// Well-formed and not blacklisted
    Good,
    /// Well-formed but listed in the blacklist
    Blacklisted,
    /// Not a dotted-quad
    Malformed,
    /// The lookup itself failed
    Unavailable(String),
}

impl fmt::Display for AttemptVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptVerdict::Good => f.write_str("good"),
            AttemptVerdict::Blacklisted => f.write_str("bad (in blacklist)"),
            AttemptVerdict::Malformed => f.write_str("bad (malformed)"),
            AttemptVerdict::Unavailable(_) => f.write_str("bad (lookup failed)"),
        }
    }
}

/// Classify one lookup answer
///
/// The blacklist is checked first, so a listed entry is reported as
/// blacklisted even when it is not a dotted-quad.
pub fn classify(raw: &str, blacklist: &HashSet<String>) -> AttemptVerdict {
    if blacklist.contains(raw) {
        AttemptVerdict::Blacklisted
    } else if !is_dotted_quad(raw) {
        AttemptVerdict::Malformed
    } else {
        AttemptVerdict::Good
    }
}

/// Resolve the external IP
///
/// `on_attempt` is called after every attempt with the 1-based attempt number,
/// the answer (if the lookup returned one), and its verdict.
///
/// # Errors
///
/// [`Error::ExhaustedAttempts`] when no attempt produced a good address,
/// including immediately when `max_attempts` is 0.
pub async fn resolve_with<F>(
    max_attempts: u32,
    blacklist: &HashSet<String>,
    lookup: &dyn IpLookup,
    mut on_attempt: F,
) -> Result<ResolvedIp>
where
    F: FnMut(u32, Option<&LookupAnswer>, &AttemptVerdict),
{
    for attempt in 1..=max_attempts {
        let (answer, verdict) = match lookup.query().await {
            Ok(answer) => {
                let verdict = classify(&answer.raw, blacklist);
                (Some(answer), verdict)
            }
            Err(e) => (None, AttemptVerdict::Unavailable(e.to_string())),
        };

        match (&answer, &verdict) {
            (Some(a), AttemptVerdict::Good) => {
                info!("GetIP: Try {}: Good IP: {} (from {})", attempt, a.raw, a.service)
            }
            (Some(a), AttemptVerdict::Blacklisted) => warn!(
                "GetIP: Try {}: Bad IP (in blacklist): {} (from {})",
                attempt, a.raw, a.service
            ),
            (Some(a), _) => warn!(
                "GetIP: Try {}: Bad IP (malformed): {:?} (from {})",
                attempt, a.raw, a.service
            ),
            (None, AttemptVerdict::Unavailable(reason)) => warn!(
                "GetIP: Try {}: Lookup via {} failed: {}",
                attempt,
                lookup.lookup_name(),
                reason
            ),
            (None, _) => {}
        }

        on_attempt(attempt, answer.as_ref(), &verdict);

        if let (Some(answer), AttemptVerdict::Good) = (answer, verdict) {
            return Ok(ResolvedIp {
                ip: answer.raw,
                service: answer.service,
                attempt,
            });
        }
    }

    Err(Error::ExhaustedAttempts {
        attempts: max_attempts,
    })
}

/// Resolve the external IP without an attempt observer
pub async fn resolve(
    max_attempts: u32,
    blacklist: &HashSet<String>,
    lookup: &dyn IpLookup,
) -> Result<ResolvedIp> {
    resolve_with(max_attempts, blacklist, lookup, |_, _, _| {}).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Answers from a fixed script, then keeps repeating the last entry
    struct Script {
        answers: Mutex<Vec<Option<&'static str>>>,
        calls: AtomicU32,
    }

    impl Script {
        fn new(answers: Vec<Option<&'static str>>) -> Self {
            Self {
                answers: Mutex::new(answers),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl IpLookup for Script {
        async fn query(&self) -> Result<LookupAnswer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut answers = self.answers.lock().unwrap();
            let next = if answers.len() > 1 {
                answers.remove(0)
            } else {
                answers[0]
            };
            next.map(|raw| LookupAnswer::new(raw, "script"))
                .ok_or_else(|| Error::lookup("down"))
        }

        fn lookup_name(&self) -> &'static str {
            "script"
        }
    }

    fn blacklist(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn classify_orders_checks() {
        let bl = blacklist(&["10.0.0.1", "junk"]);
        assert_eq!(classify("10.0.0.1", &bl), AttemptVerdict::Blacklisted);
        // Listed entries are reported as blacklisted before the syntax check
        assert_eq!(classify("junk", &bl), AttemptVerdict::Blacklisted);
        assert_eq!(classify("other-junk", &bl), AttemptVerdict::Malformed);
        assert_eq!(classify("8.8.8.8", &bl), AttemptVerdict::Good);
    }

    #[tokio::test]
    async fn first_good_answer_wins() {
        let lookup = Script::new(vec![Some("8.8.8.8")]);
        let resolved = resolve(5, &HashSet::new(), &lookup).await.unwrap();

        assert_eq!(resolved.ip, "8.8.8.8");
        assert_eq!(resolved.service, "script");
        assert_eq!(resolved.attempt, 1);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_never_queries() {
        let lookup = Script::new(vec![Some("8.8.8.8")]);
        let err = resolve(0, &HashSet::new(), &lookup).await.unwrap_err();

        assert!(matches!(err, Error::ExhaustedAttempts { attempts: 0 }));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn lookup_errors_consume_attempts() {
        let lookup = Script::new(vec![None, None, Some("1.1.1.1")]);
        let resolved = resolve(3, &HashSet::new(), &lookup).await.unwrap();
        assert_eq!(resolved.attempt, 3);

        let lookup = Script::new(vec![None]);
        let err = resolve(2, &HashSet::new(), &lookup).await.unwrap_err();
        assert!(matches!(err, Error::ExhaustedAttempts { attempts: 2 }));
    }

    #[tokio::test]
    async fn observer_sees_every_verdict() {
        let lookup = Script::new(vec![Some("10.0.0.1"), Some("nope"), None, Some("9.9.9.9")]);
        let mut seen = Vec::new();

        resolve_with(4, &blacklist(&["10.0.0.1"]), &lookup, |n, _, v| {
            seen.push((n, v.clone()))
        })
        .await
        .unwrap();

        assert_eq!(
            seen,
            vec![
                (1, AttemptVerdict::Blacklisted),
                (2, AttemptVerdict::Malformed),
                (3, AttemptVerdict::Unavailable("IP lookup error: down".to_string())),
                (4, AttemptVerdict::Good),
            ]
        );
    }
}
