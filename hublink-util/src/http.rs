pub use ::http::header;
pub use client::{Client, ClientError, HeaderMap, Headers, Method, Response, StatusCode, Transport};
pub use uri::{InvalidUriError, Uri};

mod uri {
    use std::fmt::Display;
    use std::str::FromStr;

    use thiserror::Error;

    #[derive(Debug, Error)]
    pub struct InvalidUriError(String);

    impl Display for InvalidUriError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }

    impl From<::http::uri::InvalidUri> for InvalidUriError {
        fn from(value: ::http::uri::InvalidUri) -> Self {
            InvalidUriError(value.to_string())
        }
    }

    impl From<::http::uri::InvalidUriParts> for InvalidUriError {
        fn from(value: ::http::uri::InvalidUriParts) -> Self {
            InvalidUriError(value.to_string())
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct Uri(::http::Uri);

    impl Uri {
        pub fn new(uri: ::http::Uri) -> Self {
            Self(uri)
        }

        pub fn from_string(src: String) -> Result<Self, InvalidUriError> {
            Ok(Self(::http::Uri::from_maybe_shared(src)?))
        }

        /// Replace the path and query of `base_uri`, keeping its scheme
        /// and authority.
        pub fn from_parts(
            base_uri: Uri,
            path: &str,
            query: Option<&str>,
        ) -> Result<Self, InvalidUriError> {
            let path_and_query = if let Some(qs) = query {
                ::http::uri::PathAndQuery::from_maybe_shared(format!("{path}?{qs}",))?
            } else {
                ::http::uri::PathAndQuery::from_str(path)?
            };
            let mut parts = base_uri.0.into_parts();
            parts.path_and_query = Some(path_and_query);

            Ok(::http::Uri::from_parts(parts).map(Self::new)?)
        }

        pub fn path(&self) -> &str {
            self.0.path()
        }

        pub fn query(&self) -> Option<&str> {
            self.0.query()
        }
    }

    impl Display for Uri {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }

    impl FromStr for Uri {
        type Err = InvalidUriError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            Ok(::http::Uri::from_str(s).map(Self::new)?)
        }
    }
}

mod client {
    use std::collections::HashMap;
    use std::convert::TryInto;
    use std::time::Duration;

    use super::uri::Uri;

    pub type Method = ::http::Method;
    pub type StatusCode = ::http::StatusCode;
    pub type HeaderMap = ::http::HeaderMap;
    pub type Headers = HashMap<String, String>;

    #[derive(Debug, thiserror::Error)]
    pub enum ClientError {
        #[error("failed to build request: {0}")]
        Request(String),

        #[error(transparent)]
        Client(reqwest::Error),

        #[error(transparent)]
        Server(reqwest::Error),
    }

    /// A response as seen by the protocol layer.
    ///
    /// Headers keep arrival order for repeated names. An empty body is
    /// reported as `None`.
    #[derive(Debug, Clone)]
    pub struct Response {
        pub status: StatusCode,
        pub headers: HeaderMap,
        pub body: Option<String>,
    }

    /// Single request/response exchange with a remote.
    ///
    /// Implementations return `Err` only when no response was received.
    /// Any status code, including errors, is a valid `Ok` response.
    pub trait Transport {
        fn send(
            &self,
            method: Method,
            uri: &Uri,
            headers: &Headers,
        ) -> Result<Response, ClientError>;
    }

    impl<T: Transport + ?Sized> Transport for &T {
        fn send(
            &self,
            method: Method,
            uri: &Uri,
            headers: &Headers,
        ) -> Result<Response, ClientError> {
            (**self).send(method, uri, headers)
        }
    }

    #[derive(Debug, Clone)]
    pub struct Client {
        client: reqwest::blocking::Client,
        timeout: Option<Duration>,
    }

    impl Default for Client {
        /// Default client with a timeout of 59 seconds.
        fn default() -> Self {
            Self::new(Some(Duration::from_secs(59)))
        }
    }

    impl Client {
        pub fn new(timeout: Option<Duration>) -> Self {
            Self {
                client: reqwest::blocking::Client::new(),
                timeout,
            }
        }

        pub fn timeout(self, timeout: Option<Duration>) -> Self {
            Self {
                client: self.client,
                timeout,
            }
        }
    }

    impl Transport for Client {
        fn send(
            &self,
            method: Method,
            uri: &Uri,
            headers: &Headers,
        ) -> Result<Response, ClientError> {
            let mut request = self
                .client
                .request(method, uri.to_string())
                .headers(into_header_map(headers)?);

            if let Some(timeout) = self.timeout {
                request = request.timeout(timeout);
            }

            let response = request.send().map_err(ClientError::Client)?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().map_err(ClientError::Server)?;

            Ok(Response {
                status,
                headers,
                body: (!body.is_empty()).then_some(body),
            })
        }
    }

    /// Convert headers into a [HeaderMap].
    ///
    /// This will return a [ClientError] for any non-ASCII keys or values.
    fn into_header_map(headers: &Headers) -> Result<HeaderMap, ClientError> {
        headers
            .try_into()
            .map_err(|err: ::http::Error| ClientError::Request(err.to_string()))
    }
}
