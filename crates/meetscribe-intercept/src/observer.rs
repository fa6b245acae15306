//! Request Observer
//!
//! Derives credential and validity signals from traffic the page sends and
//! receives. Handlers take `&self`, may run concurrently, and return an
//! outcome describing what they did instead of an error.

use std::sync::Arc;
use url::Url;

use meetscribe_session::{SessionStore, SessionUpdate, TokenChange, WriteTicket};

use crate::cookies::{is_auth_cookie, serialize_cookies, CookieSource, DEFAULT_AUTH_COOKIE_TERMS};
use crate::error::CaptureError;
use crate::event::{IncomingResponse, NetworkEvent, OutgoingRequest};
use crate::pattern::{host_in_domain, MatchPattern};

#[derive(Debug, Clone)]
pub struct ObserverConfig {
    /// Requests to the protected media API
    pub api_pattern: MatchPattern,
    /// Site whose cookies may be harvested
    pub site_domain: String,
    /// Authorization scheme that carries the token
    pub bearer_scheme: String,
    /// Cookie name fragments that trigger cookie capture
    pub auth_cookie_terms: Vec<String>,
}

impl ObserverConfig {
    pub fn new(api_pattern: MatchPattern, site_domain: &str) -> Self {
        Self {
            api_pattern,
            site_domain: site_domain.trim_start_matches('.').to_lowercase(),
            bearer_scheme: "Bearer".to_string(),
            auth_cookie_terms: DEFAULT_AUTH_COOKIE_TERMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOutcome {
    /// URL outside the API pattern and site domain
    Ignored,
    /// No usable bearer credential on the request
    Absent,
    Seen(TokenChange),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieOutcome {
    /// Cookies already held and token unchanged
    Skipped,
    OffDomain,
    NoAuthCookies,
    Stored { total: usize, relevant: usize },
    /// The session was cleared, or newer cookies stored, while the lookup was in flight
    Discarded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeforeSendOutcome {
    pub token: TokenOutcome,
    pub cookies: CookieOutcome,
}

/// A cookie lookup still to be run, with the ticket it must commit against.
#[derive(Debug, Clone)]
pub struct CookieLookup {
    url: Url,
    ticket: WriteTicket,
}

impl CookieLookup {
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Result of [`RequestObserver::capture_token`].
#[derive(Debug, Clone)]
pub struct TokenCapture {
    pub token: TokenOutcome,
    /// Set when the cookies should be (re)read
    pub cookies: Option<CookieLookup>,
}

impl TokenCapture {
    fn ignored() -> Self {
        Self {
            token: TokenOutcome::Ignored,
            cookies: None,
        }
    }

    pub fn token_changed(&self) -> bool {
        matches!(
            self.token,
            TokenOutcome::Seen(TokenChange::Captured | TokenChange::Rotated)
        )
    }
}

/// A 401/403 from the media API. Expected behaviour, not a bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailureSignal {
    pub status_code: u16,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Ignored,
    AuthFailure(AuthFailureSignal),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkOutcome {
    BeforeSend(BeforeSendOutcome),
    Response(ResponseOutcome),
}

impl NetworkOutcome {
    /// Whether the session may look different to readers afterwards.
    pub fn session_changed(&self) -> bool {
        match self {
            NetworkOutcome::BeforeSend(outcome) => {
                matches!(
                    outcome.token,
                    TokenOutcome::Seen(TokenChange::Captured | TokenChange::Rotated)
                ) || matches!(outcome.cookies, CookieOutcome::Stored { .. })
            }
            NetworkOutcome::Response(outcome) => {
                matches!(outcome, ResponseOutcome::AuthFailure(_))
            }
        }
    }
}

/// Passive observer. Cloning shares the store, cookie source and config.
#[derive(Clone)]
pub struct RequestObserver {
    store: SessionStore,
    cookies: Arc<dyn CookieSource>,
    config: Arc<ObserverConfig>,
}

impl RequestObserver {
    pub fn new(store: SessionStore, cookies: Arc<dyn CookieSource>, config: ObserverConfig) -> Self {
        Self {
            store,
            cookies,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    pub async fn handle(&self, event: &NetworkEvent) -> NetworkOutcome {
        match event {
            NetworkEvent::BeforeSendHeaders(request) => {
                NetworkOutcome::BeforeSend(self.on_before_send(request).await)
            }
            NetworkEvent::HeadersReceived(response) => {
                NetworkOutcome::Response(self.on_headers_received(response))
            }
        }
    }

    pub async fn on_before_send(&self, request: &OutgoingRequest) -> BeforeSendOutcome {
        let capture = self.capture_token(request);
        let cookies = match capture.cookies {
            Some(lookup) => self.lookup_cookies(lookup).await,
            None => CookieOutcome::Skipped,
        };

        BeforeSendOutcome {
            token: capture.token,
            cookies,
        }
    }

    /// The synchronous half of `on_before_send`: URL checks and the token write.
    ///
    /// Callers that must keep arrival order run this inline and defer only the
    /// returned cookie lookup, whose ticket is taken here.
    pub fn capture_token(&self, request: &OutgoingRequest) -> TokenCapture {
        let url = match Url::parse(&request.url) {
            Ok(url) => url,
            Err(_) => {
                contain(CaptureError::InvalidUrl(request.url.clone()));
                return TokenCapture::ignored();
            }
        };

        if !self.config.api_pattern.matches(&url) && !self.is_site_url(&url) {
            return TokenCapture::ignored();
        }

        let token = match request
            .header("authorization")
            .and_then(|value| self.extract_token(value))
        {
            Some(token) => {
                let change = self.store.replace_token(token);
                if change == TokenChange::Unchanged {
                    tracing::trace!(host = ?url.host_str(), "Bearer token unchanged");
                }
                TokenOutcome::Seen(change)
            }
            None => TokenOutcome::Absent,
        };

        let token_changed = matches!(
            token,
            TokenOutcome::Seen(TokenChange::Captured | TokenChange::Rotated)
        );
        let cookies = if token_changed || !self.store.status().has_cookies {
            Some(CookieLookup {
                url,
                ticket: self.store.begin_write(),
            })
        } else {
            None
        };

        TokenCapture { token, cookies }
    }

    /// Capture the site's cookie set if it carries at least one auth cookie.
    ///
    /// The whole set is stored, not only the cookies that matched the
    /// vocabulary; the match decides whether to store at all.
    pub async fn extract_cookies(&self, url: &Url) -> CookieOutcome {
        let lookup = CookieLookup {
            url: url.clone(),
            ticket: self.store.begin_write(),
        };
        self.lookup_cookies(lookup).await
    }

    /// Run a deferred lookup. The write is dropped if the session was cleared
    /// or newer cookies were stored after the lookup was created.
    pub async fn lookup_cookies(&self, lookup: CookieLookup) -> CookieOutcome {
        let CookieLookup { url, ticket } = lookup;
        let host = match url.host_str() {
            Some(host) if host_in_domain(host, &self.config.site_domain) => host.to_lowercase(),
            _ => return CookieOutcome::OffDomain,
        };

        let cookies = match self.cookies.cookies_for(&url).await {
            Ok(cookies) => cookies,
            Err(e) => {
                contain(e);
                return CookieOutcome::Failed;
            }
        };

        let relevant = cookies
            .iter()
            .filter(|c| is_auth_cookie(&c.name, self.config.auth_cookie_terms.as_slice()))
            .count();
        if relevant == 0 {
            return CookieOutcome::NoAuthCookies;
        }

        let total = cookies.len();
        let update = SessionUpdate::cookies(serialize_cookies(&cookies), host.clone());

        match self.store.commit(ticket, update) {
            Ok(_) => {
                tracing::debug!(domain = %host, total, relevant, "Stored cookie set");
                CookieOutcome::Stored { total, relevant }
            }
            Err(e) => {
                tracing::debug!(domain = %host, error = %e, "Dropped cookie set");
                CookieOutcome::Discarded
            }
        }
    }

    pub fn on_headers_received(&self, response: &IncomingResponse) -> ResponseOutcome {
        if !response.is_auth_failure() {
            return ResponseOutcome::Ignored;
        }

        let url = match Url::parse(&response.url) {
            Ok(url) => url,
            Err(_) => {
                contain(CaptureError::InvalidUrl(response.url.clone()));
                return ResponseOutcome::Ignored;
            }
        };

        if !self.config.api_pattern.matches(&url) {
            return ResponseOutcome::Ignored;
        }

        self.store.clear();

        tracing::warn!(
            status = response.status_code,
            host = ?url.host_str(),
            path = %url.path(),
            "Media API rejected credentials; session cleared"
        );

        ResponseOutcome::AuthFailure(AuthFailureSignal {
            status_code: response.status_code,
            url: response.url.clone(),
        })
    }

    fn is_site_url(&self, url: &Url) -> bool {
        url.host_str()
            .map(|host| host_in_domain(host, &self.config.site_domain))
            .unwrap_or(false)
    }

    fn extract_token<'a>(&self, value: &'a str) -> Option<&'a str> {
        let (scheme, rest) = value.trim().split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case(&self.config.bearer_scheme) {
            return None;
        }

        let token = rest.trim();
        if token.is_empty() {
            None
        } else {
            Some(token)
        }
    }
}

fn contain(error: CaptureError) {
    tracing::warn!(error = %error, "Capture failed");
}
