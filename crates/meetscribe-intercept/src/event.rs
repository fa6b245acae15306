//! Network events delivered by the host browser

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl HttpHeader {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }
}

/// An outbound request about to leave the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingRequest {
    pub url: String,
    #[serde(default)]
    pub request_headers: Vec<HttpHeader>,
    #[serde(default)]
    pub tab_id: Option<i64>,
}

impl OutgoingRequest {
    pub fn new(url: &str, headers: Vec<HttpHeader>) -> Self {
        Self {
            url: url.to_string(),
            request_headers: headers,
            tab_id: None,
        }
    }

    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request_headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .and_then(|h| h.value.as_deref())
    }
}

/// Response headers as they arrive, before the page sees the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingResponse {
    pub url: String,
    pub status_code: u16,
    #[serde(default)]
    pub tab_id: Option<i64>,
}

impl IncomingResponse {
    pub fn new(url: &str, status_code: u16) -> Self {
        Self {
            url: url.to_string(),
            status_code,
            tab_id: None,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status_code, 401 | 403)
    }
}

#[derive(Debug, Clone)]
pub enum NetworkEvent {
    BeforeSendHeaders(OutgoingRequest),
    HeadersReceived(IncomingResponse),
}
