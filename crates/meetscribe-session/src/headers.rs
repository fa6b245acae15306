//! Auth header assembly for the protected media API

use uuid::Uuid;

use crate::error::SessionError;
use crate::store::SessionView;
use crate::Result;

/// Per-request correlation header expected by the media API.
pub const CORRELATION_HEADER: &str = "client-request-id";

const REDACTED_HEADERS: &[&str] = &["authorization", "cookie"];

/// Ready-to-send header set. Values of credential headers are redacted in `Debug`.
#[derive(Clone)]
pub struct AuthHeaders {
    headers: Vec<(String, String)>,
    request_id: Uuid,
}

impl AuthHeaders {
    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn into_vec(self) -> Vec<(String, String)> {
        self.headers
    }
}

impl std::fmt::Debug for AuthHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in &self.headers {
            if REDACTED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                map.entry(name, &"[redacted]");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}

/// Builds [`AuthHeaders`] from the current session. Pure read plus ID generation.
#[derive(Debug, Clone)]
pub struct AuthHeaderBuilder {
    view: SessionView,
    client_headers: Vec<(String, String)>,
}

impl AuthHeaderBuilder {
    pub fn new(view: SessionView) -> Self {
        Self {
            view,
            client_headers: Self::default_client_headers(),
        }
    }

    pub fn default_client_headers() -> Vec<(String, String)> {
        vec![
            (
                "Accept".to_string(),
                "application/json;odata=nometadata".to_string(),
            ),
            (
                "X-ClientService-ClientTag".to_string(),
                "MeetScribe".to_string(),
            ),
        ]
    }

    /// Replace the fixed client-identification headers.
    pub fn with_client_headers<I>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.client_headers = headers.into_iter().collect();
        self
    }

    pub fn build(&self) -> Result<AuthHeaders> {
        let state = self.view.snapshot();

        let token = match (state.is_valid, state.bearer_token.as_ref()) {
            (true, Some(token)) if !token.is_empty() => token,
            _ => return Err(SessionError::NoValidSession),
        };

        let request_id = Uuid::new_v4();
        let mut headers = Vec::with_capacity(self.client_headers.len() + 3);
        headers.push((
            "Authorization".to_string(),
            format!("Bearer {}", token.expose()),
        ));
        headers.push((CORRELATION_HEADER.to_string(), request_id.to_string()));
        headers.extend(self.client_headers.iter().cloned());

        if let Some(cookies) = state.cookies.as_ref() {
            headers.push(("Cookie".to_string(), cookies.expose().to_string()));
        }

        tracing::debug!(%request_id, header_count = headers.len(), "Built auth headers");

        Ok(AuthHeaders {
            headers,
            request_id,
        })
    }
}
