use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::token::CachedToken;

const SEGMENT_SEPARATOR: char = ';';
const KEY_VALUE_SEPARATOR: char = '=';

const HOST_NAME: &str = "HostName";
const DEVICE_ID: &str = "DeviceId";
const SHARED_ACCESS_KEY: &str = "SharedAccessKey";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// A segment is not of the form `Key=Value`
    #[error("invalid connection string: expected 'Key=Value' segments separated by ';'")]
    InvalidFormat,

    #[error("invalid connection string property: {0}")]
    InvalidProperty(String),
}

/// Identity of the device on the remote, as given by its connection string.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionIdentity {
    host_name: String,
    device_id: String,
    shared_access_key: String,
}

impl ConnectionIdentity {
    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn shared_access_key(&self) -> &str {
        &self.shared_access_key
    }

    /// True if every field has been set.
    pub fn is_complete(&self) -> bool {
        !self.host_name.is_empty()
            && !self.device_id.is_empty()
            && !self.shared_access_key.is_empty()
    }

    /// The resource a SAS token for this device is scoped to.
    pub fn resource_uri(&self) -> String {
        format!("{}/devices/{}", self.host_name, self.device_id)
    }

    /// Apply the `Key=Value` segments of `descriptor` in order.
    ///
    /// Parsing stops at the first invalid segment. Fields set by earlier
    /// segments keep their new value.
    fn apply(&mut self, descriptor: &str) -> Result<(), ParseError> {
        for segment in descriptor.split(SEGMENT_SEPARATOR) {
            if segment.trim().is_empty() {
                continue;
            }

            // only the first separator counts, base64 keys end in '='
            let (key, value) = segment
                .split_once(KEY_VALUE_SEPARATOR)
                .ok_or(ParseError::InvalidFormat)?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                return Err(ParseError::InvalidFormat);
            }

            let field = match key {
                HOST_NAME => &mut self.host_name,
                DEVICE_ID => &mut self.device_id,
                SHARED_ACCESS_KEY => &mut self.shared_access_key,
                _ => return Err(ParseError::InvalidProperty(key.to_owned())),
            };
            *field = value.to_owned();
        }

        Ok(())
    }
}

impl fmt::Debug for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionIdentity")
            .field("host_name", &self.host_name)
            .field("device_id", &self.device_id)
            .field("shared_access_key", &"<redacted>")
            .finish()
    }
}

impl FromStr for ConnectionIdentity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut identity = Self::default();
        identity.apply(s)?;
        Ok(identity)
    }
}

/// Connection identity and the token currently cut for it.
#[derive(Debug, Default)]
pub struct CredentialStore {
    identity: ConnectionIdentity,
    token: Option<CachedToken>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `HostName=..;DeviceId=..;SharedAccessKey=..` descriptor into
    /// the stored identity.
    ///
    /// On error, the identity may be partially updated and must not be used
    /// for protocol operations.
    pub fn parse_connection_descriptor(&mut self, descriptor: &str) -> Result<(), ParseError> {
        self.identity.apply(descriptor)
    }

    pub fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    pub fn cached_token(&self) -> Option<&CachedToken> {
        self.token.as_ref()
    }

    pub(crate) fn store_token(&mut self, token: CachedToken) {
        self.token = Some(token);
    }
}
