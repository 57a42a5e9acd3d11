use std::cell::RefCell;
use std::collections::VecDeque;

use crate::adapters::http::{HttpReply, HttpRequest, HttpTransport, TransportError};

/// Replays canned replies in order and records every request it receives.
/// Running out of replies behaves like an unreachable server.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: RefCell<VecDeque<HttpReply>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<HttpReply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.borrow().len()
    }
}

impl HttpTransport for ScriptedTransport {
    fn post(&self, request: &HttpRequest) -> Result<HttpReply, TransportError> {
        self.requests.borrow_mut().push(request.clone());

        match self.replies.borrow_mut().pop_front() {
            Some(reply) => Ok(reply),
            None => Err(unreachable_server(&request.url)),
        }
    }
}

fn unreachable_server(url: &str) -> TransportError {
    // An unparsable URL fails inside reqwest before any socket is opened.
    let source = reqwest::blocking::Client::new()
        .post("http://")
        .send()
        .expect_err("empty host must not produce a response");
    TransportError::Request {
        url: url.to_string(),
        source,
    }
}

pub fn reply(status: u16, body: &str) -> HttpReply {
    reply_with_cookies(status, body, &[])
}

pub fn reply_with_cookies(status: u16, body: &str, cookies: &[(&str, &str)]) -> HttpReply {
    HttpReply {
        status,
        body: body.to_string(),
        set_cookies: cookies
            .iter()
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect(),
    }
}
