use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::{Span, debug, field, instrument};

use crate::credentials::CredentialStore;
use crate::util::clock::{Clock, SystemClock};
use crate::util::crypto::{SigningError, hmac_sha256_base64};

/// Default lifetime of a newly signed token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Any time before 2017-04-16T00:00:00Z means the clock has not been
/// synchronized yet.
const MIN_VALID_UNIX_TIME: u64 = 1_492_300_800;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("connection string is not initialized")]
    NotConfigured,

    #[error("system clock is not synchronized")]
    ClockInvalid,

    #[error("cannot sign token: {0}")]
    InvalidKey(#[from] SigningError),

    #[error("token lifetime of {0:?} is out of range")]
    InvalidTtl(Duration),
}

/// A signed token and the instant it stops being valid.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
    value: String,
    expires_at: u64,
    resource_uri: String,
}

impl CachedToken {
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Expiry in seconds since the Unix epoch, as embedded in the token.
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    fn is_valid_for(&self, resource_uri: &str, now: u64) -> bool {
        self.expires_at > now && self.resource_uri == resource_uri
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("resource_uri", &self.resource_uri)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Build a SAS token granting access to `resource_uri` until `expiry`.
///
/// The signature is the HMAC-SHA256 of `"{resource_uri}\n{expiry}"`, keyed
/// with the base64-decoded shared access key.
pub fn sas_token(
    shared_access_key: &str,
    resource_uri: &str,
    expiry: u64,
) -> Result<String, SigningError> {
    let signature = hmac_sha256_base64(shared_access_key, format!("{resource_uri}\n{expiry}"))?;
    Ok(format!(
        "SharedAccessSignature sr={resource_uri}&sig={}&se={expiry}",
        urlencoding::encode(&signature)
    ))
}

/// Issues SAS tokens for the identity in a [CredentialStore], reusing the
/// stored token until its expiry is reached.
#[derive(Debug, Clone)]
pub struct TokenIssuer<C = SystemClock> {
    clock: C,
    ttl: Duration,
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenIssuer {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> TokenIssuer<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            ttl: DEFAULT_TOKEN_TTL,
        }
    }

    /// Set the lifetime of newly signed tokens.
    pub fn ttl(self, ttl: Duration) -> Self {
        Self {
            clock: self.clock,
            ttl,
        }
    }

    /// Return a token that is valid right now, signing a new one only if the
    /// stored token has reached its expiry.
    #[instrument(level = "trace", skip_all, fields(cached = field::Empty, expires_at = field::Empty), err(level = "warn"))]
    pub fn ensure_valid_token(&self, store: &mut CredentialStore) -> Result<String, TokenError> {
        let identity = store.identity();
        if !identity.is_complete() {
            return Err(TokenError::NotConfigured);
        }

        let now = self
            .clock
            .unix_time()
            .filter(|now| *now >= MIN_VALID_UNIX_TIME)
            .ok_or(TokenError::ClockInvalid)?;

        let resource_uri = identity.resource_uri();
        if let Some(token) = store
            .cached_token()
            .filter(|token| token.is_valid_for(&resource_uri, now))
        {
            Span::current().record("cached", true);
            Span::current().record("expires_at", token.expires_at());
            return Ok(token.value().to_owned());
        }

        let expires_at = now
            .checked_add(self.ttl.as_secs())
            .ok_or(TokenError::InvalidTtl(self.ttl))?;
        let value = sas_token(identity.shared_access_key(), &resource_uri, expires_at)?;
        debug!(resource = %resource_uri, expires_at, "signed new token");

        Span::current().record("cached", false);
        Span::current().record("expires_at", expires_at);
        store.store_token(CachedToken {
            value: value.clone(),
            expires_at,
            resource_uri,
        });

        Ok(value)
    }
}
