use tracing::{Span, debug, field, instrument};
use urlencoding::encode;

use crate::config::RequestConfig;
use crate::credentials::{CredentialStore, ParseError};
use crate::message::{CloudMessage, MessageError, unquote_tag};
use crate::token::{TokenError, TokenIssuer};
use crate::util::clock::{Clock, SystemClock};
use crate::util::http::{Client, Headers, InvalidUriError, Method, Response, Transport, Uri};

/// Query string selecting the version of the device messaging API.
pub const API_VERSION: &str = "api-version=2016-11-14";

/// Cloud-to-device message client for a single device.
///
/// Every operation signs (or reuses) a SAS token and then performs exactly
/// one request through the transport. Nothing is retried.
pub struct DeviceClient<T = Client, C = SystemClock> {
    credentials: CredentialStore,
    issuer: TokenIssuer<C>,
    transport: T,
    endpoint: Option<Uri>,
}

impl DeviceClient {
    /// Create a client using an HTTP transport and the system clock.
    pub fn new(config: &RequestConfig) -> Self {
        Self::with_transport(
            Client::new(Some(config.timeout)),
            TokenIssuer::new().ttl(config.token_ttl),
        )
    }
}

impl<T: Transport, C: Clock> DeviceClient<T, C> {
    pub fn with_transport(transport: T, issuer: TokenIssuer<C>) -> Self {
        Self {
            credentials: CredentialStore::new(),
            issuer,
            transport,
            endpoint: None,
        }
    }

    /// Send requests to `endpoint` instead of `https://{HostName}`.
    ///
    /// Only the scheme and authority of the endpoint are used.
    pub fn endpoint(self, endpoint: Option<Uri>) -> Self {
        Self { endpoint, ..self }
    }

    /// Load the device identity from a connection string.
    pub fn parse_connection_descriptor(&mut self, descriptor: &str) -> Result<(), ParseError> {
        self.credentials.parse_connection_descriptor(descriptor)
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn ensure_valid_token(&mut self) -> Result<String, TokenError> {
        self.issuer.ensure_valid_token(&mut self.credentials)
    }

    /// Fetch the next message queued for this device.
    ///
    /// The remote locks the returned message until it is completed through
    /// its `etag`. Returns `None` if no message is pending.
    #[instrument(level = "debug", skip_all, fields(status = field::Empty), err(level = "warn"))]
    pub fn fetch_pending_message(&mut self) -> Result<Option<CloudMessage>, MessageError> {
        let token = self.ensure_valid_token()?;
        let uri = self.messages_uri(None, None, API_VERSION)?;
        let response = self.send(Method::GET, &uri, &token)?;

        if !response.status.is_success() {
            return Err(MessageError::RejectedByServer(response.status));
        }

        let message = CloudMessage::from_response(response)?;
        if message.is_none() {
            debug!("no pending messages");
        }
        Ok(message)
    }

    /// Delete a fetched message from the queue.
    ///
    /// A non-2xx reply usually means the message is no longer pending, e.g.
    /// its lock expired or it was already completed.
    #[instrument(level = "debug", skip_all, fields(status = field::Empty), err(level = "warn"))]
    pub fn acknowledge_message(&mut self, tag: &str) -> Result<(), MessageError> {
        self.complete(Method::DELETE, tag, None, API_VERSION)
    }

    /// Release the lock on a fetched message so it is delivered again.
    #[instrument(level = "debug", skip_all, fields(status = field::Empty), err(level = "warn"))]
    pub fn abandon_message(&mut self, tag: &str) -> Result<(), MessageError> {
        self.complete(Method::POST, tag, Some("abandon"), API_VERSION)
    }

    /// Move a fetched message to the dead-letter queue.
    #[instrument(level = "debug", skip_all, fields(status = field::Empty), err(level = "warn"))]
    pub fn reject_message(&mut self, tag: &str) -> Result<(), MessageError> {
        self.complete(Method::DELETE, tag, None, &format!("reject&{API_VERSION}"))
    }

    fn complete(
        &mut self,
        method: Method,
        tag: &str,
        action: Option<&str>,
        query: &str,
    ) -> Result<(), MessageError> {
        let tag = unquote_tag(tag)?;
        let token = self.ensure_valid_token()?;
        let uri = self.messages_uri(Some(tag), action, query)?;
        let response = self.send(method, &uri, &token)?;

        if response.status.is_success() {
            Ok(())
        } else {
            Err(MessageError::RejectedByServer(response.status))
        }
    }

    fn send(&self, method: Method, uri: &Uri, token: &str) -> Result<Response, MessageError> {
        let headers = Headers::from([
            ("Authorization".to_string(), token.to_string()),
            ("Accept".to_string(), "application/json".to_string()),
        ]);

        debug!(%method, %uri, "calling remote");
        let response = self.transport.send(method, uri, &headers)?;
        Span::current().record("status", field::display(response.status));

        Ok(response)
    }

    fn messages_uri(
        &self,
        tag: Option<&str>,
        action: Option<&str>,
        query: &str,
    ) -> Result<Uri, InvalidUriError> {
        let identity = self.credentials.identity();
        let mut path = format!(
            "/devices/{}/messages/deviceBound",
            encode(identity.device_id())
        );
        if let Some(tag) = tag {
            path = format!("{path}/{}", encode(tag));
        }
        if let Some(action) = action {
            path = format!("{path}/{action}");
        }

        let base_uri = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => Uri::from_string(format!("https://{}", identity.host_name()))?,
        };
        Uri::from_parts(base_uri, &path, Some(query))
    }
}
