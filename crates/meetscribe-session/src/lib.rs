//! MeetScribe Session State
//!
//! Holds the credentials harvested from the host page:
//! - Bearer token and session cookies live in memory only
//! - Dropped on every restart, install and update
//! - One writer handle ([`SessionStore`]), any number of read-only views
//! - Raw secrets leave this crate only inside [`AuthHeaders`]

mod error;
mod headers;
mod state;
mod store;

pub use error::SessionError;
pub use headers::{AuthHeaderBuilder, AuthHeaders, CORRELATION_HEADER};
pub use state::{Secret, SessionStatus, SessionUpdate};
pub use store::{SessionStore, SessionView, TokenChange, WriteTicket};

pub type Result<T> = std::result::Result<T, SessionError>;
