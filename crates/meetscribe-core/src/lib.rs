//! MeetScribe Core
//!
//! Background coordination for the transcript extension.
//! The background process owns the session and meeting state; every other
//! surface talks to it through messages and sees no raw credentials.

mod background;
mod config;
mod error;
mod router;

pub use background::{Background, BackgroundEvent, InstallReason, LifecycleEvent};
pub use config::Config;
pub use error::CoreError;
pub use router::{CommandResult, ExtensionMessageRouter, HandlerError, MessageSender, Request};

// Re-export core components
pub use meetscribe_intercept::{
    CaptureError, Cookie, CookieJar, CookieSource, HttpHeader, IncomingResponse, MatchPattern,
    NetworkEvent, NetworkOutcome, OutgoingRequest, RequestObserver,
};
pub use meetscribe_meeting::{
    Badge, BadgeSink, MeetingDetails, MeetingError, MeetingInfo, MeetingLifecycleTracker,
    MeetingState, TabId,
};
pub use meetscribe_session::{
    AuthHeaderBuilder, AuthHeaders, SessionError, SessionStatus, SessionStore, SessionView,
};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
///
/// Logs go to stderr; stdout is reserved for the host protocol.
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
