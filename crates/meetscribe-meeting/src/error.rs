//! Meeting error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeetingError {
    #[error("Invalid tab id: {0}")]
    InvalidTab(i64),
}
