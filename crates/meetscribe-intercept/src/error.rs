//! Capture error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid match pattern: {0}")]
    InvalidPattern(String),

    #[error("Cookie lookup failed: {0}")]
    CookieSource(String),
}
