//! Cookie lookup and the auth-cookie heuristic

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

use crate::pattern::host_in_domain;
use crate::Result;

/// Name fragments that mark a cookie as authentication-relevant.
pub const DEFAULT_AUTH_COOKIE_TERMS: &[&str] = &[
    "auth",
    "session",
    "token",
    // Federated sign-in
    "fedauth",
    "rtfa",
    "estsauth",
    "spoidcrl",
];

/// A browser cookie as reported by the extension's cookie API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_path() -> String {
    "/".to_string()
}

impl Cookie {
    pub fn new(name: &str, value: &str, domain: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: domain.to_string(),
            path: default_path(),
        }
    }

    /// Whether the browser would send this cookie to `host`.
    pub fn applies_to(&self, host: &str) -> bool {
        host_in_domain(host, &self.domain)
    }
}

/// Source of the cookies currently held by the browser.
#[async_trait]
pub trait CookieSource: Send + Sync {
    async fn cookies_for(&self, url: &Url) -> Result<Vec<Cookie>>;
}

/// In-memory cookie store fed with snapshots from the extension.
///
/// Each snapshot replaces everything previously held for its domain.
#[derive(Default)]
pub struct CookieJar {
    by_domain: Arc<RwLock<HashMap<String, Vec<Cookie>>>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_domain(&self, domain: &str, cookies: Vec<Cookie>) {
        let domain = domain.trim_start_matches('.').to_lowercase();
        tracing::debug!(domain = %domain, count = cookies.len(), "Cookie snapshot received");
        self.by_domain.write().insert(domain, cookies);
    }

    pub fn clear(&self) {
        self.by_domain.write().clear();
    }

    pub fn len(&self) -> usize {
        self.by_domain.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for CookieJar {
    fn clone(&self) -> Self {
        Self {
            by_domain: Arc::clone(&self.by_domain),
        }
    }
}

#[async_trait]
impl CookieSource for CookieJar {
    async fn cookies_for(&self, url: &Url) -> Result<Vec<Cookie>> {
        let host = match url.host_str() {
            Some(host) => host.to_lowercase(),
            None => return Ok(Vec::new()),
        };

        let jar = self.by_domain.read();
        let mut cookies: Vec<Cookie> = jar
            .values()
            .flatten()
            .filter(|c| c.applies_to(&host))
            .cloned()
            .collect();
        cookies.sort_by(|a, b| a.name.cmp(&b.name));
        cookies.dedup_by(|a, b| a.name == b.name && a.domain == b.domain);

        Ok(cookies)
    }
}

/// Case-insensitive substring match against the vocabulary.
pub fn is_auth_cookie<S: AsRef<str>>(name: &str, terms: &[S]) -> bool {
    let name = name.to_lowercase();
    terms
        .iter()
        .any(|term| name.contains(&term.as_ref().to_lowercase()))
}

/// `name=value; name=value` in the given order.
pub fn serialize_cookies(cookies: &[Cookie]) -> String {
    cookies
        .iter()
        .map(|c| format!("{}={}", c.name, c.value))
        .collect::<Vec<_>>()
        .join("; ")
}
