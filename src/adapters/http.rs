use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub body: RequestBody,
    pub cookie_header: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
    /// `(name, value)` for every `Set-Cookie` header on the response.
    pub set_cookies: Vec<(String, String)>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: &'static str, reason: String },
    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait HttpTransport {
    fn post(&self, request: &HttpRequest) -> Result<HttpReply, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(origin: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .default_headers(browser_headers(origin)?)
            .timeout(timeout)
            .build()
            .map_err(TransportError::Build)?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post(&self, request: &HttpRequest) -> Result<HttpReply, TransportError> {
        let mut builder = self.client.post(&request.url);

        if let Some(cookie) = &request.cookie_header {
            builder = builder.header(header::COOKIE, cookie);
        }

        builder = match &request.body {
            RequestBody::Empty => builder.body(Vec::new()),
            RequestBody::Json(value) => builder.body(serde_json::to_vec(value)?),
        };

        let response = builder.send().map_err(|source| TransportError::Request {
            url: request.url.clone(),
            source,
        })?;

        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();
        let body = response.text().map_err(|source| TransportError::Request {
            url: request.url.clone(),
            source,
        })?;

        Ok(HttpReply {
            status,
            body,
            set_cookies,
        })
    }
}

/// The header set the attestation web UI sends; the service rejects requests
/// that look different.
pub fn browser_headers(origin: &str) -> Result<HeaderMap, TransportError> {
    let origin = origin.trim_end_matches('/');
    let referer = format!("{origin}/");

    let pairs: [(&'static str, &str); 11] = [
        ("user-agent", "Mozilla/5.0"),
        ("accept", "*/*"),
        ("accept-language", "en-US,en;q=0.5"),
        ("content-type", "application/json"),
        ("origin", origin),
        ("referer", &referer),
        ("connection", "keep-alive"),
        ("sec-fetch-dest", "empty"),
        ("sec-fetch-mode", "same-origin"),
        ("sec-fetch-site", "same-origin"),
        ("sec-gpc", "1"),
    ];

    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let value = HeaderValue::from_str(value).map_err(|err| TransportError::InvalidHeader {
            name,
            reason: err.to_string(),
        })?;
        headers.insert(HeaderName::from_static(name), value);
    }
    Ok(headers)
}

pub fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let pair = raw.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().trim_matches('"').to_string()))
}

#[cfg(test)]
mod tests {
    use super::{HttpReply, browser_headers, parse_set_cookie};

    #[test]
    fn parses_cookie_name_and_value_ignoring_attributes() {
        assert_eq!(
            parse_set_cookie("__Host-session=abc123; Path=/; Secure; HttpOnly; SameSite=Strict"),
            Some(("__Host-session".to_string(), "abc123".to_string()))
        );
        assert_eq!(
            parse_set_cookie("token=\"quoted\""),
            Some(("token".to_string(), "quoted".to_string()))
        );
    }

    #[test]
    fn rejects_cookie_without_name() {
        assert_eq!(parse_set_cookie("=value; Path=/"), None);
        assert_eq!(parse_set_cookie("no-equals-sign"), None);
    }

    #[test]
    fn builds_browser_header_set_from_origin() {
        let headers = browser_headers("https://attestation.app/").expect("headers should build");

        assert_eq!(headers.len(), 11);
        assert_eq!(headers["origin"], "https://attestation.app");
        assert_eq!(headers["referer"], "https://attestation.app/");
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["sec-gpc"], "1");
    }

    #[test]
    fn rejects_origin_with_control_characters() {
        assert!(browser_headers("https://bad\norigin").is_err());
    }

    #[test]
    fn success_range_is_2xx() {
        let reply = |status| HttpReply {
            status,
            body: String::new(),
            set_cookies: Vec::new(),
        };

        assert!(reply(200).is_success());
        assert!(reply(204).is_success());
        assert!(!reply(302).is_success());
        assert!(!reply(401).is_success());
    }
}
