/*
This crate is home to everything related to the cloud service that queues
messages for the device we're running on.

It keeps the device credentials parsed from a connection string, signs the
short-lived SAS tokens the service expects, and performs the message
operations: fetching the next pending message and completing it by its
version tag.
*/

mod client;
mod config;
mod credentials;
mod message;
mod token;

#[cfg(test)]
mod test_utils;

pub use client::{API_VERSION, DeviceClient};
pub use config::RequestConfig;
pub use credentials::{ConnectionIdentity, CredentialStore, ParseError};
pub use message::{CloudMessage, MessageError};
pub use token::{CachedToken, DEFAULT_TOKEN_TTL, TokenError, TokenIssuer, sas_token};

use hublink_util as util;
