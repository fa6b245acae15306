//! Background configuration
//!
//! Patterns and header sets are data, not code, so a deployment on another
//! tenant only needs a different config file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use meetscribe_intercept::{MatchPattern, ObserverConfig, DEFAULT_AUTH_COOKIE_TERMS};
use meetscribe_session::AuthHeaderBuilder;

use crate::error::CoreError;
use crate::Result;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "MEETSCRIBE_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Match pattern for the protected media API
    pub api_pattern: String,
    /// Domain whose cookies may be captured
    pub site_domain: String,
    /// Match pattern for pages that host a meeting recording
    pub meeting_page_pattern: String,
    /// Authorization scheme carrying the token
    pub bearer_scheme: String,
    /// Cookie name fragments that trigger cookie capture
    pub auth_cookie_terms: Vec<String>,
    /// Fixed client-identification headers sent to the media API
    pub client_headers: BTreeMap<String, String>,
    /// Bound of the background event queue
    pub event_queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_pattern: "https://*.sharepoint.com/_api/*".to_string(),
            site_domain: "sharepoint.com".to_string(),
            meeting_page_pattern: "https://*.sharepoint.com/*stream.aspx*".to_string(),
            bearer_scheme: "Bearer".to_string(),
            auth_cookie_terms: DEFAULT_AUTH_COOKIE_TERMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            client_headers: AuthHeaderBuilder::default_client_headers()
                .into_iter()
                .collect(),
            event_queue_capacity: 256,
        }
    }
}

impl Config {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&json)?;
        config.validate()?;

        tracing::info!(path = %path.display(), "Loaded configuration");

        Ok(config)
    }

    /// Load from `MEETSCRIBE_CONFIG` if set, defaults otherwise.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.api_matcher()?;
        self.meeting_page()?;

        if self.site_domain.trim_start_matches('.').is_empty() {
            return Err(CoreError::Config("siteDomain cannot be empty".to_string()));
        }
        if self.bearer_scheme.trim().is_empty() || self.bearer_scheme.contains(char::is_whitespace)
        {
            return Err(CoreError::Config(format!(
                "bearerScheme must be a single token, got {:?}",
                self.bearer_scheme
            )));
        }
        if self.auth_cookie_terms.iter().any(|t| t.is_empty()) {
            return Err(CoreError::Config(
                "authCookieTerms cannot contain empty terms".to_string(),
            ));
        }
        if self.event_queue_capacity == 0 {
            return Err(CoreError::Config(
                "eventQueueCapacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn api_matcher(&self) -> Result<MatchPattern> {
        MatchPattern::parse(&self.api_pattern)
            .map_err(|e| CoreError::Config(format!("apiPattern: {}", e)))
    }

    pub fn meeting_page(&self) -> Result<MatchPattern> {
        MatchPattern::parse(&self.meeting_page_pattern)
            .map_err(|e| CoreError::Config(format!("meetingPagePattern: {}", e)))
    }

    pub fn observer_config(&self) -> Result<ObserverConfig> {
        let mut observer = ObserverConfig::new(self.api_matcher()?, &self.site_domain);
        observer.bearer_scheme = self.bearer_scheme.clone();
        observer.auth_cookie_terms = self.auth_cookie_terms.clone();
        Ok(observer)
    }

    pub fn client_header_pairs(&self) -> Vec<(String, String)> {
        self.client_headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
