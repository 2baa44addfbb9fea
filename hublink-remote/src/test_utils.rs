use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::credentials::CredentialStore;
use crate::util::clock::Clock;
use crate::util::http::header::HeaderName;
use crate::util::http::{
    ClientError, HeaderMap, Headers, Method, Response, StatusCode, Transport, Uri,
};

pub const CONNECTION_STRING: &str = "HostName=myhub.azure-devices.net;DeviceId=dev-01;\
     SharedAccessKey=aHVibGluay1kZXZpY2Utc2VjcmV0LTAxMjM0NTY3ODk=";

pub fn configured_store() -> CredentialStore {
    let mut store = CredentialStore::new();
    store.parse_connection_descriptor(CONNECTION_STRING).unwrap();
    store
}

/// A clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct FrozenClock(Rc<Cell<u64>>);

impl FrozenClock {
    pub fn at(now: u64) -> Self {
        Self(Rc::new(Cell::new(now)))
    }

    pub fn advance(&self, secs: u64) {
        self.0.set(self.0.get() + secs);
    }
}

impl Clock for FrozenClock {
    fn unix_time(&self) -> Option<u64> {
        Some(self.0.get())
    }
}

pub struct UnreadableClock;

impl Clock for UnreadableClock {
    fn unix_time(&self) -> Option<u64> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct SentRequest {
    pub method: Method,
    pub uri: String,
    pub headers: Headers,
}

/// Replays queued responses and records every request it is given.
///
/// Once the queue is empty every request fails as if no response arrived.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    responses: RefCell<VecDeque<Response>>,
    requests: RefCell<Vec<SentRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, headers: &[(&str, &str)], body: Option<&str>) -> Self {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            header_map.append(
                name.parse::<HeaderName>().unwrap(),
                value.parse().unwrap(),
            );
        }
        self.responses.borrow_mut().push_back(Response {
            status: StatusCode::from_u16(status).unwrap(),
            headers: header_map,
            body: body.map(String::from),
        });
        self
    }

    pub fn requests(&self) -> Vec<SentRequest> {
        self.requests.borrow().clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, method: Method, uri: &Uri, headers: &Headers) -> Result<Response, ClientError> {
        self.requests.borrow_mut().push(SentRequest {
            method,
            uri: uri.to_string(),
            headers: headers.clone(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ClientError::Request("connection refused".to_string()))
    }
}
