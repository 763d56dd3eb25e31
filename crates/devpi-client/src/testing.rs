//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::client::Client;
use crate::error::{DevpiError, Result};
use crate::transport::{Credentials, Request, Response, Transport};

#[derive(Default)]
struct Shared {
    responses: VecDeque<Response>,
    requests: Vec<Request>,
    credentials: Vec<Option<Credentials>>,
}

/// Replays canned responses in order and records every request.
pub(crate) struct MockTransport {
    shared: Arc<Mutex<Shared>>,
}

/// Read side of a [`MockTransport`].
#[derive(Clone)]
pub(crate) struct MockLog {
    shared: Arc<Mutex<Shared>>,
}

impl MockTransport {
    pub(crate) fn new(responses: Vec<Response>) -> (Self, MockLog) {
        let shared = Arc::new(Mutex::new(Shared {
            responses: responses.into(),
            ..Default::default()
        }));
        (
            MockTransport {
                shared: Arc::clone(&shared),
            },
            MockLog { shared },
        )
    }

    /// A client rooted at `http://test.example.com` over a fresh mock.
    pub(crate) fn client(responses: Vec<Response>) -> (Client, MockLog) {
        let (transport, log) = MockTransport::new(responses);
        let client = Client::with_transport("http://test.example.com", Box::new(transport))
            .expect("static base url is valid");
        (client, log)
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &Request, credentials: Option<&Credentials>) -> Result<Response> {
        let mut shared = self.shared.lock().expect("mock lock poisoned");
        shared.requests.push(request.clone());
        shared.credentials.push(credentials.cloned());
        shared.responses.pop_front().ok_or_else(|| DevpiError::Network {
            message: "Request failed: no scripted response left".to_string(),
        })
    }
}

impl MockLog {
    pub(crate) fn requests(&self) -> Vec<Request> {
        self.shared.lock().expect("mock lock poisoned").requests.clone()
    }

    pub(crate) fn credentials(&self) -> Vec<Option<Credentials>> {
        self.shared
            .lock()
            .expect("mock lock poisoned")
            .credentials
            .clone()
    }
}
