//! URL match patterns
//!
//! Browser-style patterns: `<scheme>://<host><path>`, where scheme may be `*`
//! (http or https), host may be `*` or start with `*.` (domain and all
//! subdomains), and `*` in the path matches any run of characters.

use regex::Regex;
use url::Url;

use crate::error::CaptureError;
use crate::Result;

#[derive(Debug, Clone)]
pub struct MatchPattern {
    source: String,
    scheme: Option<String>,
    host: HostPattern,
    path: Regex,
}

#[derive(Debug, Clone)]
enum HostPattern {
    Any,
    /// `*.example.com`: the domain itself or any subdomain
    Domain(String),
    Exact(String),
}

impl MatchPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let invalid = || CaptureError::InvalidPattern(pattern.to_string());

        let (scheme, rest) = pattern.split_once("://").ok_or_else(invalid)?;
        let scheme = match scheme {
            "*" => None,
            "http" | "https" => Some(scheme.to_string()),
            _ => return Err(invalid()),
        };

        let (host, path) = match rest.find('/') {
            Some(index) => rest.split_at(index),
            None => return Err(invalid()),
        };

        let host = match host {
            "" => return Err(invalid()),
            "*" => HostPattern::Any,
            h if h.starts_with("*.") => {
                let domain = &h[2..];
                if domain.is_empty() || domain.contains('*') {
                    return Err(invalid());
                }
                HostPattern::Domain(domain.to_lowercase())
            }
            h if h.contains('*') => return Err(invalid()),
            h => HostPattern::Exact(h.to_lowercase()),
        };

        let glob = path
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let path = Regex::new(&format!("^{}$", glob)).map_err(|_| invalid())?;

        Ok(Self {
            source: pattern.to_string(),
            scheme,
            host,
            path,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, url: &Url) -> bool {
        let scheme_ok = match &self.scheme {
            Some(scheme) => url.scheme() == scheme,
            None => matches!(url.scheme(), "http" | "https"),
        };
        if !scheme_ok {
            return false;
        }

        let host = match url.host_str() {
            Some(host) => host.to_lowercase(),
            None => return false,
        };
        let host_ok = match &self.host {
            HostPattern::Any => true,
            HostPattern::Domain(domain) => host_in_domain(&host, domain),
            HostPattern::Exact(exact) => host == *exact,
        };
        if !host_ok {
            return false;
        }

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        self.path.is_match(&path)
    }

    /// Parse and match in one step; unparseable URLs never match.
    pub fn matches_str(&self, url: &str) -> bool {
        Url::parse(url).map(|u| self.matches(&u)).unwrap_or(false)
    }
}

impl std::fmt::Display for MatchPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for MatchPattern {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// True if `host` is `domain` or one of its subdomains.
pub fn host_in_domain(host: &str, domain: &str) -> bool {
    let host = host.trim_end_matches('.').to_lowercase();
    let domain = domain.trim_start_matches('.').to_lowercase();
    if domain.is_empty() {
        return false;
    }

    let parts: Vec<&str> = host.split('.').collect();
    (0..parts.len()).any(|i| parts[i..].join(".") == domain)
}
