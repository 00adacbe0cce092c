// # ipwatch - External IP Change Notifier
//
// One-shot binary meant to be run periodically by a scheduler (cron, systemd
// timer). Each invocation:
//
// 1. Reads the key=value configuration file named on the command line
// 2. Reads the saved IP
// 3. Resolves the current external IP through public lookup services
// 4. Mails every recipient if the IP changed
// 5. Saves the new IP once every recipient was notified
//
// This is a THIN integration layer. Parsing, resolution, gating and
// persistence live in ipwatch-core; this file only wires the concrete
// adapters together and maps the result to an exit status.
//
// ## Environment
//
// - `IPWATCH_LOG_LEVEL`: trace, debug, info, warn or error (default info)
//
// ## Example
//
// ```bash
// ipwatch /home/bob/ipwatch/config.txt
// ```

use anyhow::Result;
use clap::{CommandFactory, Parser};
use ipwatch_core::{
    ConfigError, Error, FileStateStore, RunOutcome, RunReport, Settings, Watcher,
};
use ipwatch_lookup_http::HttpIpLookup;
use ipwatch_mail_smtp::SmtpMailer;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

/// Environment variable selecting the log level
const LOG_LEVEL_ENV: &str = "IPWATCH_LOG_LEVEL";

/// Exit codes for the possible run results
///
/// A scheduler can tell "nothing to do" (0) apart from every failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IpwatchExitCode {
    /// Unchanged, or changed + notified + saved; also help/usage
    Success = 0,
    /// Configuration file not found
    ConfigNotFound = 1,
    /// Configuration file has an unknown key
    UnrecognizedKey = 2,
    /// Configuration value (or log level) is unusable
    InvalidConfig = 3,
    /// No acceptable external IP
    ResolutionFailed = 4,
    /// At least one recipient was not notified
    NotificationFailed = 5,
    /// Notified, but the new IP was not saved
    PersistFailed = 6,
    /// Runtime could not start, or an unexpected failure
    RuntimeError = 7,
}

impl From<IpwatchExitCode> for ExitCode {
    fn from(code: IpwatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<&ConfigError> for IpwatchExitCode {
    fn from(err: &ConfigError) -> Self {
        match err {
            ConfigError::NotFound { .. } => Self::ConfigNotFound,
            ConfigError::UnrecognizedKey { .. } => Self::UnrecognizedKey,
            ConfigError::Invalid(_) => Self::InvalidConfig,
        }
    }
}

impl From<&RunReport> for IpwatchExitCode {
    fn from(report: &RunReport) -> Self {
        match report.outcome {
            RunOutcome::Unchanged | RunOutcome::Persisted { .. } => Self::Success,
            RunOutcome::NotPersisted { .. } => Self::NotificationFailed,
            RunOutcome::PersistFailed { .. } => Self::PersistFailed,
        }
    }
}

impl From<&Error> for IpwatchExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::Config(config) => config.into(),
            Error::ExhaustedAttempts { .. } => Self::ResolutionFailed,
            _ => Self::RuntimeError,
        }
    }
}

const ABOUT: &str = "\
IPWatch checks your current external IP address against a saved, previous, \
external IP address. It should be run as a scheduled task/cronjob \
periodically. If a difference in the new vs old IP address is found it will \
dispatch an email describing the change.";

const AFTER_HELP: &str = "\
[config] = path to an IPWatch configuration file

EXAMPLE USAGE: ipwatch /home/bob/ipwatch/config.txt";

/// Command line
#[derive(Debug, Parser)]
#[command(name = "ipwatch", version, about = ABOUT, after_help = AFTER_HELP)]
struct Cli {
    /// Path to an IPWatch configuration file
    #[arg(value_name = "config")]
    config: Vec<PathBuf>,
}

impl Cli {
    /// The config path, if exactly one positional argument was given
    fn config_path(self) -> Option<PathBuf> {
        let mut paths = self.config;
        if paths.len() == 1 { paths.pop() } else { None }
    }
}

/// Parse a log level name
fn parse_log_level(name: &str) -> Option<Level> {
    match name.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn print_help() {
    if let Err(e) = Cli::command().print_help() {
        eprintln!("Failed to print help: {}", e);
    }
}

fn main() -> ExitCode {
    let config_path = match Cli::try_parse() {
        Ok(cli) => cli.config_path(),
        Err(e) => {
            use clap::error::ErrorKind;
            match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = e.print();
                }
                _ => print_help(),
            }
            return IpwatchExitCode::Success.into();
        }
    };

    let Some(config_path) = config_path else {
        print_help();
        return IpwatchExitCode::Success.into();
    };

    // Initialize tracing
    let level_name = env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "info".to_string());
    let Some(log_level) = parse_log_level(&level_name) else {
        eprintln!(
            "{} '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            LOG_LEVEL_ENV, level_name
        );
        return IpwatchExitCode::InvalidConfig.into();
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return IpwatchExitCode::RuntimeError.into();
    }

    let settings = match Settings::load(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return IpwatchExitCode::from(&e).into();
        }
    };

    info!(
        "Configuration loaded from {}: machine '{}', {} recipient(s)",
        config_path.display(),
        settings.machine,
        settings.recipients.len()
    );

    // Every step is awaited in sequence, a single thread is enough
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IpwatchExitCode::RuntimeError.into();
        }
    };

    let code = rt.block_on(async {
        match run_once(settings).await {
            Ok(code) => code,
            Err(e) => {
                error!("{}", e);
                match e.downcast_ref::<Error>() {
                    Some(err) => err.into(),
                    None => IpwatchExitCode::RuntimeError,
                }
            }
        }
    });

    code.into()
}

/// Build the adapters and run the watcher once
async fn run_once(settings: Settings) -> Result<IpwatchExitCode> {
    let lookup = HttpIpLookup::new()?;
    let mailer = SmtpMailer::from_settings(&settings).map_err(Error::from)?;
    let state_store = FileStateStore::new(&settings.save_ip_path);

    // Events are only for embedders; the log already covers every step.
    // The receiver is dropped here so sends see a closed channel.
    let (watcher, _) = Watcher::new(
        Box::new(lookup),
        Box::new(mailer),
        Box::new(state_store),
        settings,
    );

    let report = match watcher.run().await {
        Ok(report) => report,
        Err(e) => return Ok((&e).into()),
    };

    info!(
        "Run finished: previous {}, current {}",
        report.previous, report.resolved.ip
    );

    Ok((&report).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipwatch_core::notifier::{NotificationOutcome, RecipientOutcome};
    use ipwatch_core::{PersistedIp, ResolvedIp};

    fn report(outcome: RunOutcome) -> RunReport {
        RunReport {
            previous: PersistedIp::Absent,
            resolved: ResolvedIp {
                ip: "203.0.113.5".to_string(),
                service: "https://api.ipify.org".to_string(),
                attempt: 1,
            },
            outcome,
        }
    }

    fn notification(failed: bool) -> NotificationOutcome {
        NotificationOutcome {
            recipients: vec![RecipientOutcome {
                index: 0,
                address: "a@example.com".to_string(),
                error: failed.then(|| "550 rejected".to_string()),
            }],
        }
    }

    #[test]
    fn exactly_one_argument_is_a_config_path() {
        let cli = Cli::try_parse_from(["ipwatch", "/etc/ipwatch.conf"]).unwrap();
        assert_eq!(cli.config_path(), Some(PathBuf::from("/etc/ipwatch.conf")));
    }

    #[test]
    fn wrong_argument_count_has_no_config_path() {
        let none = Cli::try_parse_from(["ipwatch"]).unwrap();
        assert_eq!(none.config_path(), None);

        let two = Cli::try_parse_from(["ipwatch", "a.conf", "b.conf"]).unwrap();
        assert_eq!(two.config_path(), None);
    }

    #[test]
    fn help_flag_is_reported_as_display_help() {
        let err = Cli::try_parse_from(["ipwatch", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn config_errors_map_to_distinct_codes() {
        let not_found = ConfigError::NotFound {
            path: PathBuf::from("/nope"),
        };
        let unknown = ConfigError::UnrecognizedKey {
            line_no: 3,
            line: "colour=blue".to_string(),
        };
        let invalid = ConfigError::Invalid("try_count must be positive".to_string());

        assert_eq!(IpwatchExitCode::from(&not_found), IpwatchExitCode::ConfigNotFound);
        assert_eq!(IpwatchExitCode::from(&unknown), IpwatchExitCode::UnrecognizedKey);
        assert_eq!(IpwatchExitCode::from(&invalid), IpwatchExitCode::InvalidConfig);
    }

    #[test]
    fn run_errors_map_to_codes() {
        let exhausted = Error::ExhaustedAttempts { attempts: 3 };
        assert_eq!(
            IpwatchExitCode::from(&exhausted),
            IpwatchExitCode::ResolutionFailed
        );
        assert_eq!(
            IpwatchExitCode::from(&Error::invalid_config("bad smtp_addr")),
            IpwatchExitCode::InvalidConfig
        );
        assert_eq!(
            IpwatchExitCode::from(&Error::lookup("no client")),
            IpwatchExitCode::RuntimeError
        );
    }

    #[test]
    fn only_unchanged_and_persisted_succeed() {
        assert_eq!(
            IpwatchExitCode::from(&report(RunOutcome::Unchanged)),
            IpwatchExitCode::Success
        );
        assert_eq!(
            IpwatchExitCode::from(&report(RunOutcome::Persisted {
                notification: notification(false)
            })),
            IpwatchExitCode::Success
        );
        assert_eq!(
            IpwatchExitCode::from(&report(RunOutcome::NotPersisted {
                notification: notification(true)
            })),
            IpwatchExitCode::NotificationFailed
        );
        assert_eq!(
            IpwatchExitCode::from(&report(RunOutcome::PersistFailed {
                notification: notification(false),
                error: "read-only file system".to_string(),
            })),
            IpwatchExitCode::PersistFailed
        );
    }

    #[test]
    fn log_levels_are_case_insensitive() {
        assert_eq!(parse_log_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_log_level("warn"), Some(Level::WARN));
        assert_eq!(parse_log_level("verbose"), None);
    }

    #[test]
    fn exit_code_values_are_stable() {
        let codes = [
            IpwatchExitCode::Success,
            IpwatchExitCode::ConfigNotFound,
            IpwatchExitCode::UnrecognizedKey,
            IpwatchExitCode::InvalidConfig,
            IpwatchExitCode::ResolutionFailed,
            IpwatchExitCode::NotificationFailed,
            IpwatchExitCode::PersistFailed,
            IpwatchExitCode::RuntimeError,
        ];
        for (expected, code) in codes.iter().enumerate() {
            assert_eq!(*code as u8 as usize, expected);
        }
    }
}
