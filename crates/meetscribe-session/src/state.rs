//! Session data structures

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A credential value that never prints itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[redacted]")
    }
}

/// Fields to merge into the session. `None` leaves the current value alone.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub bearer_token: Option<Secret>,
    pub cookies: Option<Secret>,
    pub cookie_domain: Option<String>,
}

impl SessionUpdate {
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(Secret::new(token)),
            ..Default::default()
        }
    }

    pub fn cookies(cookies: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            cookies: Some(Secret::new(cookies)),
            cookie_domain: Some(domain.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bearer_token.is_none() && self.cookies.is_none() && self.cookie_domain.is_none()
    }
}

/// The live credential record. Only the store mutates it.
#[derive(Debug, Clone, Default)]
pub(crate) struct SessionState {
    pub(crate) bearer_token: Option<Secret>,
    pub(crate) cookies: Option<Secret>,
    pub(crate) cookie_domain: Option<String>,
    pub(crate) last_updated: Option<DateTime<Utc>>,
    pub(crate) is_valid: bool,
    /// Bumped on every mutation
    pub(crate) version: u64,
    /// Bumped on every clear
    pub(crate) epoch: u64,
    /// Version at which the held cookies were stored
    pub(crate) cookies_version: u64,
}

impl SessionState {
    /// Merge an update. Empty strings are treated as absent.
    pub(crate) fn merge(&mut self, update: SessionUpdate) {
        if let Some(token) = update.bearer_token.filter(|t| !t.is_empty()) {
            self.bearer_token = Some(token);
        }
        let cookies_changed = match update.cookies.filter(|c| !c.is_empty()) {
            Some(cookies) => {
                self.cookies = Some(cookies);
                true
            }
            None => false,
        };
        if let Some(domain) = update.cookie_domain.filter(|d| !d.is_empty()) {
            self.cookie_domain = Some(domain);
        }

        self.touch();
        if cookies_changed {
            self.cookies_version = self.version;
        }
        self.is_valid = self.bearer_token.is_some();
    }

    /// Reset every credential field. Version and epoch keep counting.
    pub(crate) fn reset(&mut self) {
        let version = self.version + 1;
        let epoch = self.epoch + 1;
        *self = Self {
            version,
            epoch,
            ..Self::default()
        };
    }

    fn touch(&mut self) {
        let now = Utc::now();
        self.last_updated = Some(match self.last_updated {
            Some(previous) if previous > now => previous,
            _ => now,
        });
        self.version += 1;
    }

    pub(crate) fn status(&self) -> SessionStatus {
        SessionStatus {
            is_valid: self.is_valid,
            last_updated: self.last_updated,
            has_bearer_token: self.bearer_token.is_some(),
            has_cookies: self.cookies.is_some(),
        }
    }
}

/// What the UI layer may see: flags and a timestamp, no secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub is_valid: bool,
    pub last_updated: Option<DateTime<Utc>>,
    pub has_bearer_token: bool,
    pub has_cookies: bool,
}
