use clap::{Parser, ValueEnum};
use std::num::ParseIntError;
use std::time::Duration;

use crate::remote::RequestConfig;
use crate::util::http::Uri;

/// One year
const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 3600;

fn parse_duration(s: &str) -> Result<Duration, ParseIntError> {
    let millis: u64 = s.parse()?;
    Ok(Duration::from_millis(millis))
}

/// What to do with a message once it has been written to stdout
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Disposition {
    /// Delete the message from the device queue
    Complete,
    /// Release the message so it is delivered again
    Abandon,
    /// Move the message to the dead-letter queue
    Reject,
    /// Leave the message locked until its lock expires
    Ignore,
}

impl Disposition {
    /// True if the message leaves the queue, so the next one can be
    /// fetched right away.
    pub fn removes_message(&self) -> bool {
        matches!(self, Self::Complete | Self::Reject)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Message body only, one per line
    Text,
    /// One JSON object per message, with tag and properties
    Json,
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)] // read from Cargo.toml
pub struct Cli {
    /// Device connection string, eg. "HostName=..;DeviceId=..;SharedAccessKey=.."
    #[arg(
        env = "HUBLINK_CONNECTION_STRING",
        long = "connection-string",
        value_name = "str",
        hide_env_values = true
    )]
    pub connection_string: String,

    /// Remote API endpoint URI, defaults to https://{HostName}
    #[arg(env = "HUBLINK_API_ENDPOINT", long = "api-endpoint", value_name = "uri")]
    pub api_endpoint: Option<Uri>,

    /// Remote request timeout in milliseconds
    #[arg(
        env = "HUBLINK_REQUEST_TIMEOUT_MS",
        long = "request-timeout-ms",
        value_name = "ms",
        value_parser = parse_duration
    )]
    pub request_timeout: Option<Duration>,

    /// Time to wait between polls of an empty queue, in milliseconds
    #[arg(
        env = "HUBLINK_POLL_INTERVAL_MS",
        long = "poll-interval-ms",
        value_name = "ms",
        value_parser = parse_duration
    )]
    pub poll_interval: Option<Duration>,

    /// Lifetime of signed SAS tokens in seconds
    #[arg(
        env = "HUBLINK_TOKEN_TTL_SECS",
        long = "token-ttl-secs",
        value_name = "secs",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TOKEN_TTL_SECS)
    )]
    pub token_ttl_secs: Option<u64>,

    /// What to do with a message after it is printed
    #[arg(
        env = "HUBLINK_DISPOSITION",
        long = "disposition",
        value_enum,
        default_value_t = Disposition::Complete
    )]
    pub disposition: Disposition,

    /// Output format for received messages
    #[arg(
        env = "HUBLINK_FORMAT",
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text
    )]
    pub format: OutputFormat,

    /// Poll once and exit
    #[arg(long = "once")]
    pub once: bool,
}

impl Cli {
    /// Request settings from the command line, using defaults for anything
    /// not given.
    pub fn request_config(&self) -> RequestConfig {
        let defaults = RequestConfig::default();
        RequestConfig {
            timeout: self.request_timeout.unwrap_or(defaults.timeout),
            poll_interval: self.poll_interval.unwrap_or(defaults.poll_interval),
            token_ttl: self
                .token_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.token_ttl),
        }
    }
}

pub fn parse() -> Cli {
    Parser::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTION_STRING: &str = "HostName=h;DeviceId=d;SharedAccessKey=c2VjcmV0";

    #[test]
    fn test_uses_defaults() {
        let cli =
            Cli::try_parse_from(["hublink", "--connection-string", CONNECTION_STRING]).unwrap();
        let config = cli.request_config();

        assert_eq!(cli.disposition, Disposition::Complete);
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.once);
        assert!(cli.api_endpoint.is_none());
        assert_eq!(config.timeout, Duration::from_secs(59));
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.token_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_reads_request_settings() {
        let cli = Cli::try_parse_from([
            "hublink",
            "--connection-string",
            CONNECTION_STRING,
            "--request-timeout-ms",
            "1500",
            "--poll-interval-ms",
            "250",
            "--token-ttl-secs",
            "60",
            "--disposition",
            "abandon",
            "--format",
            "json",
            "--once",
        ])
        .unwrap();
        let config = cli.request_config();

        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.token_ttl, Duration::from_secs(60));
        assert_eq!(cli.disposition, Disposition::Abandon);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.once);
    }

    #[test]
    fn test_reads_api_endpoint() {
        let cli = Cli::try_parse_from([
            "hublink",
            "--connection-string",
            CONNECTION_STRING,
            "--api-endpoint",
            "http://localhost:8080",
        ])
        .unwrap();

        let endpoint = cli.api_endpoint.unwrap().to_string();
        assert!(endpoint.starts_with("http://localhost:8080"));
    }

    #[test]
    fn test_rejects_zero_token_ttl() {
        let result = Cli::try_parse_from([
            "hublink",
            "--connection-string",
            CONNECTION_STRING,
            "--token-ttl-secs",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_token_ttl_beyond_a_year() {
        let result = Cli::try_parse_from([
            "hublink",
            "--connection-string",
            CONNECTION_STRING,
            "--token-ttl-secs",
            "18446744073709551615",
        ]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "hublink",
            "--connection-string",
            CONNECTION_STRING,
            "--token-ttl-secs",
            "31536000",
        ])
        .unwrap();
        assert_eq!(cli.request_config().token_ttl, Duration::from_secs(31_536_000));
    }

    #[test]
    fn test_only_removing_dispositions_drain_the_queue() {
        assert!(Disposition::Complete.removes_message());
        assert!(Disposition::Reject.removes_message());
        assert!(!Disposition::Abandon.removes_message());
        assert!(!Disposition::Ignore.removes_message());
    }
}
