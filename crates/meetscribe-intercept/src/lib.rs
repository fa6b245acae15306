//! MeetScribe Request Interception
//!
//! Rides on credentials the host page already negotiates:
//! - Bearer tokens are read from outbound `Authorization` headers
//! - Session cookies are read for the site domain once an auth cookie is seen
//! - 401/403 from the media API clears the session
//!
//! Observation never modifies a request or response, and never fails back
//! into the caller: every problem is logged and swallowed.

mod cookies;
mod error;
mod event;
mod observer;
mod pattern;

pub use cookies::{
    is_auth_cookie, serialize_cookies, Cookie, CookieJar, CookieSource, DEFAULT_AUTH_COOKIE_TERMS,
};
pub use error::CaptureError;
pub use event::{HttpHeader, IncomingResponse, NetworkEvent, OutgoingRequest};
pub use observer::{
    AuthFailureSignal, BeforeSendOutcome, CookieLookup, CookieOutcome, NetworkOutcome,
    ObserverConfig, RequestObserver, ResponseOutcome, TokenCapture, TokenOutcome,
};
pub use pattern::{host_in_domain, MatchPattern};

pub type Result<T> = std::result::Result<T, CaptureError>;
