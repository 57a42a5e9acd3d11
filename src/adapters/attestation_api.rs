use serde_json::json;
use thiserror::Error;

use crate::adapters::http::{HttpReply, HttpRequest, HttpTransport, RequestBody, TransportError};
use crate::adapters::session_store::{SessionStore, SessionStoreError, SessionToken};
use crate::domain::history::{HistoryPage, HistoryPageSource};
use crate::domain::models::{Credentials, Device, HistoryEntry};

pub const DEFAULT_BASE_URL: &str = "https://attestation.app/api";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Account,
    Devices,
    History,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/login",
            Self::Account => "/account",
            Self::Devices => "/devices.json",
            Self::History => "/attestation-history.json",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("login rejected with status {status}: {body}")]
    LoginRejected { status: u16, body: String },
    #[error("device listing failed with status {status}: {body}")]
    DeviceListRejected { status: u16, body: String },
    #[error("unexpected response body from {endpoint:?}: {source}")]
    MalformedBody {
        endpoint: Endpoint,
        #[source]
        source: serde_json::Error,
    },
    #[error("session store failed: {0}")]
    SessionStore(#[from] SessionStoreError),
}

/// One authenticated conversation with the attestation service.
///
/// Cookies set by any response are folded into the token and sent on every
/// following request.
#[derive(Debug)]
pub struct AttestationSession<T> {
    transport: T,
    base_url: String,
    token: SessionToken,
}

impl<T> AttestationSession<T>
where
    T: HttpTransport,
{
    pub fn new(transport: T, base_url: &str) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: SessionToken::new(),
        }
    }

    pub fn with_token(mut self, token: SessionToken) -> Self {
        self.token = token;
        self
    }

    /// Returns a session that is logged in, reusing the stored token when the
    /// service still accepts it.
    pub fn ensure<S>(
        transport: T,
        base_url: &str,
        store: &S,
        credentials: &Credentials,
    ) -> Result<Self, ApiError>
    where
        S: SessionStore,
    {
        let mut session = Self::new(transport, base_url);

        match store.load() {
            Ok(Some(token)) if !token.is_empty() => {
                tracing::info!(cookies = token.len(), "restored stored session");
                session.token = token;
                if session.probe()? {
                    tracing::info!("stored session is still active");
                    return Ok(session);
                }
                tracing::warn!("stored session expired, logging in again");
                session.token = SessionToken::new();
            }
            Ok(_) => tracing::info!("no stored session"),
            Err(error) => {
                tracing::warn!(error = %error, "stored session unreadable, logging in again");
            }
        }

        session.login(credentials)?;
        session.persist(store)?;
        Ok(session)
    }

    pub fn probe(&mut self) -> Result<bool, ApiError> {
        let reply = self.post(Endpoint::Account, RequestBody::Empty)?;
        tracing::debug!(status = reply.status, "session probe answered");
        Ok(reply.is_success())
    }

    pub fn login(&mut self, credentials: &Credentials) -> Result<(), ApiError> {
        tracing::info!(username = %credentials.username, "logging in");
        let body = json!({
            "username": credentials.username,
            "password": credentials.password,
        });

        let reply = self.post(Endpoint::Login, RequestBody::Json(body))?;
        if !reply.is_success() {
            return Err(ApiError::LoginRejected {
                status: reply.status,
                body: reply.body,
            });
        }

        tracing::info!(cookies = self.token.len(), "login succeeded");
        Ok(())
    }

    pub fn persist<S>(&self, store: &S) -> Result<(), ApiError>
    where
        S: SessionStore,
    {
        store.save(&self.token)?;
        tracing::info!("session saved");
        Ok(())
    }

    pub fn list_devices(&mut self) -> Result<Vec<Device>, ApiError> {
        let reply = self.post(Endpoint::Devices, RequestBody::Empty)?;
        if !reply.is_success() {
            return Err(ApiError::DeviceListRejected {
                status: reply.status,
                body: reply.body,
            });
        }

        let devices: Vec<Device> =
            serde_json::from_str(&reply.body).map_err(|source| ApiError::MalformedBody {
                endpoint: Endpoint::Devices,
                source,
            })?;
        tracing::info!(count = devices.len(), "devices listed");
        Ok(devices)
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn post(&mut self, endpoint: Endpoint, body: RequestBody) -> Result<HttpReply, TransportError> {
        let request = HttpRequest {
            url: format!("{}{}", self.base_url, endpoint.path()),
            body,
            cookie_header: self.token.cookie_header(),
        };

        let reply = self.transport.post(&request)?;
        self.token.absorb(reply.set_cookies.iter().cloned());
        Ok(reply)
    }
}

impl<T> HistoryPageSource for AttestationSession<T>
where
    T: HttpTransport,
{
    type Error = TransportError;

    fn fetch_page(
        &mut self,
        fingerprint: &str,
        offset_id: i64,
    ) -> Result<HistoryPage, Self::Error> {
        let body = json!({ "fingerprint": fingerprint, "offsetId": offset_id });
        let reply = self.post(Endpoint::History, RequestBody::Json(body))?;

        if !reply.is_success() {
            return Ok(HistoryPage::Rejected {
                status: reply.status,
                body: reply.body,
            });
        }

        Ok(match serde_json::from_str::<Vec<HistoryEntry>>(&reply.body) {
            Ok(entries) => HistoryPage::Entries(entries),
            Err(error) => HistoryPage::Malformed {
                reason: error.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ApiError, AttestationSession};
    use crate::adapters::http::RequestBody;
    use crate::adapters::session_store::{MemorySessionStore, SessionStore, SessionToken};
    use crate::domain::history::{HistoryPage, HistoryPageSource};
    use crate::domain::models::Credentials;
    use crate::test_support::{ScriptedTransport, reply, reply_with_cookies};

    const BASE: &str = "https://attestation.test/api";

    fn credentials() -> Credentials {
        Credentials {
            username: "alice".to_string(),
            password: "secret".to_string(),
        }
    }

    #[test]
    fn reuses_stored_session_when_probe_succeeds() {
        let store = MemorySessionStore::with_token(SessionToken::from_pairs([("sid", "live")]));
        let transport = ScriptedTransport::new(vec![reply(200, "")]);

        let session = AttestationSession::ensure(transport, BASE, &store, &credentials())
            .expect("session should be ready");

        let requests = session.transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://attestation.test/api/account");
        assert_eq!(requests[0].body, RequestBody::Empty);
        assert_eq!(requests[0].cookie_header.as_deref(), Some("sid=live"));
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn logs_in_again_when_probe_fails() {
        let store = MemorySessionStore::with_token(SessionToken::from_pairs([("sid", "stale")]));
        let transport = ScriptedTransport::new(vec![
            reply(401, "unauthorized"),
            reply_with_cookies(200, "", &[("sid", "fresh")]),
        ]);

        let session = AttestationSession::ensure(transport, BASE, &store, &credentials())
            .expect("session should be ready");

        let requests = session.transport().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].url, "https://attestation.test/api/login");
        assert_eq!(requests[1].cookie_header, None);
        assert_eq!(
            requests[1].body,
            RequestBody::Json(json!({"username": "alice", "password": "secret"}))
        );
        assert_eq!(store.save_count(), 1);
        assert_eq!(
            store.current(),
            Some(SessionToken::from_pairs([("sid", "fresh")]))
        );
    }

    #[test]
    fn logs_in_directly_without_stored_session() {
        let store = MemorySessionStore::new();
        let transport =
            ScriptedTransport::new(vec![reply_with_cookies(200, "", &[("sid", "first")])]);

        let session = AttestationSession::ensure(transport, BASE, &store, &credentials())
            .expect("session should be ready");

        let requests = session.transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://attestation.test/api/login");
        assert_eq!(session.token().get("sid"), Some("first"));
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn empty_stored_token_is_treated_as_missing() {
        let store = MemorySessionStore::with_token(SessionToken::new());
        let transport = ScriptedTransport::new(vec![reply(200, "")]);

        let session = AttestationSession::ensure(transport, BASE, &store, &credentials())
            .expect("session should be ready");

        assert_eq!(
            session.transport().requests()[0].url,
            "https://attestation.test/api/login"
        );
    }

    #[test]
    fn unreadable_store_falls_back_to_login() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, "[1, 2]").expect("fixture should be written");
        let store = crate::adapters::session_store::FileSessionStore::new(&path);
        let transport = ScriptedTransport::new(vec![reply_with_cookies(200, "", &[("sid", "x")])]);

        AttestationSession::ensure(transport, BASE, &store, &credentials())
            .expect("session should be ready");

        let saved = store.load().expect("load").expect("token should be saved");
        assert_eq!(saved.get("sid"), Some("x"));
    }

    #[test]
    fn rejected_login_reports_status_and_body() {
        let store = MemorySessionStore::new();
        let transport = ScriptedTransport::new(vec![reply(403, "invalid credentials")]);

        let err = AttestationSession::ensure(transport, BASE, &store, &credentials())
            .expect_err("login must fail");

        match &err {
            ApiError::LoginRejected { status, body } => {
                assert_eq!(*status, 403);
                assert_eq!(body, "invalid credentials");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            err.to_string(),
            "login rejected with status 403: invalid credentials"
        );
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn transport_failure_during_probe_propagates() {
        let store = MemorySessionStore::with_token(SessionToken::from_pairs([("sid", "live")]));
        let transport = ScriptedTransport::new(Vec::new());

        let err = AttestationSession::ensure(transport, BASE, &store, &credentials())
            .expect_err("transport error must propagate");

        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn lists_devices_with_session_cookie() {
        let transport = ScriptedTransport::new(vec![reply(
            200,
            r#"[{"fingerprint":"abc","name":"Pixel","maxId":100},{"fingerprint":"def","minId":4}]"#,
        )]);
        let mut session = AttestationSession::new(transport, BASE)
            .with_token(SessionToken::from_pairs([("sid", "live")]));

        let devices = session.list_devices().expect("devices should list");

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name(), Some("Pixel"));
        assert_eq!(devices[1].start_cursor(), Some(4));
        let requests = session.transport().requests();
        assert_eq!(requests[0].url, "https://attestation.test/api/devices.json");
        assert_eq!(requests[0].cookie_header.as_deref(), Some("sid=live"));
    }

    #[test]
    fn device_listing_failure_is_an_error() {
        let transport = ScriptedTransport::new(vec![reply(500, "boom")]);
        let mut session = AttestationSession::new(transport, BASE);

        let err = session.list_devices().expect_err("listing must fail");

        assert!(matches!(err, ApiError::DeviceListRejected { status: 500, .. }));
    }

    #[test]
    fn device_listing_rejects_non_array_body() {
        let transport = ScriptedTransport::new(vec![reply(200, r#"{"error":"nope"}"#)]);
        let mut session = AttestationSession::new(transport, BASE);

        let err = session.list_devices().expect_err("object body must fail");

        assert!(matches!(err, ApiError::MalformedBody { .. }));
    }

    #[test]
    fn history_page_sends_fingerprint_and_offset() {
        let transport = ScriptedTransport::new(vec![reply(200, r#"[{"id":9},{"id":8}]"#)]);
        let mut session = AttestationSession::new(transport, BASE);

        let page = session.fetch_page("abc", 9).expect("page should fetch");

        match page {
            HistoryPage::Entries(entries) => assert_eq!(entries.len(), 2),
            other => panic!("unexpected page: {other:?}"),
        }
        let requests = session.transport().requests();
        assert_eq!(
            requests[0].url,
            "https://attestation.test/api/attestation-history.json"
        );
        assert_eq!(
            requests[0].body,
            RequestBody::Json(json!({"fingerprint": "abc", "offsetId": 9}))
        );
    }

    #[test]
    fn history_page_maps_failures_to_page_outcomes() {
        let transport = ScriptedTransport::new(vec![reply(429, "slow down"), reply(200, "<html>")]);
        let mut session = AttestationSession::new(transport, BASE);

        let rejected = session.fetch_page("abc", 9).expect("page should fetch");
        let malformed = session.fetch_page("abc", 9).expect("page should fetch");

        assert_eq!(
            rejected,
            HistoryPage::Rejected {
                status: 429,
                body: "slow down".to_string()
            }
        );
        assert!(matches!(malformed, HistoryPage::Malformed { .. }));
    }

    #[test]
    fn refreshed_cookies_are_sent_on_later_requests() {
        let transport = ScriptedTransport::new(vec![
            reply_with_cookies(200, "[]", &[("sid", "rotated")]),
            reply(200, "[]"),
        ]);
        let mut session = AttestationSession::new(transport, BASE)
            .with_token(SessionToken::from_pairs([("sid", "live")]));

        session.list_devices().expect("first listing");
        session.list_devices().expect("second listing");

        let requests = session.transport().requests();
        assert_eq!(requests[0].cookie_header.as_deref(), Some("sid=live"));
        assert_eq!(requests[1].cookie_header.as_deref(), Some("sid=rotated"));
    }
}
