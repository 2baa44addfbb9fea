use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::token::TokenError;
use crate::util::http::{ClientError, HeaderMap, InvalidUriError, Response, StatusCode, header};

const MESSAGE_ID_HEADER: &str = "iothub-messageid";
const DELIVERY_COUNT_HEADER: &str = "iothub-deliverycount";
const APP_PROPERTY_PREFIX: &str = "iothub-app-";

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("cannot authenticate with remote: {0}")]
    AuthFailed(#[from] TokenError),

    #[error("no response from remote: {0}")]
    TransportFailed(#[from] ClientError),

    #[error("invalid message tag")]
    InvalidTag,

    #[error("remote replied with status {0}")]
    RejectedByServer(StatusCode),

    #[error("remote returned a message without an ETag")]
    MissingTag,

    #[error("invalid remote endpoint: {0}")]
    InvalidEndpoint(#[from] InvalidUriError),
}

impl MessageError {
    /// True if the error comes from the device credentials, clock or
    /// endpoint rather than from the network or the remote service.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::AuthFailed(_) | Self::InvalidEndpoint(_))
    }
}

/// A message queued by the remote for this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudMessage {
    pub body: String,

    /// Version tag as received, needed to complete the message.
    pub etag: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_count: Option<u32>,

    /// Application properties set by the sender.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl CloudMessage {
    /// Read a message from a successful fetch response.
    ///
    /// Returns `None` if the response carries no body.
    pub(crate) fn from_response(response: Response) -> Result<Option<Self>, MessageError> {
        let Some(body) = response.body else {
            return Ok(None);
        };
        let headers = &response.headers;
        let etag =
            last_header_value(headers, header::ETAG.as_str()).ok_or(MessageError::MissingTag)?;

        let properties = headers
            .iter()
            .filter_map(|(name, value)| {
                let key = name.as_str().strip_prefix(APP_PROPERTY_PREFIX)?;
                let value = value.to_str().ok()?;
                Some((key.to_owned(), value.to_owned()))
            })
            .collect();

        Ok(Some(Self {
            body,
            etag,
            message_id: last_header_value(headers, MESSAGE_ID_HEADER),
            delivery_count: last_header_value(headers, DELIVERY_COUNT_HEADER)
                .and_then(|count| count.parse().ok()),
            properties,
        }))
    }
}

/// Value of the last `name` header received.
fn last_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(name)
        .iter()
        .last()
        .and_then(|value| value.to_str().ok())
        .map(String::from)
}

/// Remove the quotes the remote wraps version tags in.
///
/// Tags are expected quote-wrapped (`"abc"`). A tag without surrounding
/// quotes is used unchanged.
pub(crate) fn unquote_tag(tag: &str) -> Result<&str, MessageError> {
    if tag.chars().count() < 2 {
        return Err(MessageError::InvalidTag);
    }

    let tag = tag
        .strip_prefix('"')
        .and_then(|tag| tag.strip_suffix('"'))
        .unwrap_or(tag);

    if tag.is_empty() {
        return Err(MessageError::InvalidTag);
    }
    Ok(tag)
}
