//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Session error: {0}")]
    Session(#[from] meetscribe_session::SessionError),

    #[error("Capture error: {0}")]
    Capture(#[from] meetscribe_intercept::CaptureError),

    #[error("Meeting error: {0}")]
    Meeting(#[from] meetscribe_meeting::MeetingError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
