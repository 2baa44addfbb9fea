use std::time::Duration;

use crate::token::DEFAULT_TOKEN_TTL;

#[derive(Clone, Debug)]
pub struct RequestConfig {
    /// Maximum time to wait for a single HTTP request to complete.
    pub timeout: Duration,

    /// Time to wait between polls when no message is pending.
    pub poll_interval: Duration,

    /// Lifetime of newly signed SAS tokens.
    pub token_ttl: Duration,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(59_000),
            poll_interval: Duration::from_millis(10_000),
            token_ttl: DEFAULT_TOKEN_TTL,
        }
    }
}
